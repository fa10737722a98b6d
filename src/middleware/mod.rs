pub mod auth;
pub mod request_logger;

pub use auth::AdminSession;
