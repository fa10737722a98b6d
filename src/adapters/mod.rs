//! Storage adapters implementing the ports in `crate::ports`.

pub mod memory;
pub mod postgres;

pub use memory::InMemoryStore;
pub use postgres::PostgresStore;
