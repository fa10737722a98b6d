//! Admin session extractor.
//!
//! Sessions are issued by the auth platform as
//! `Bearer {userId}.{hex(HMAC-SHA256(SESSION_SECRET, userId))}`. A missing or
//! forged token is 401; a valid token for a user without an admin profile
//! is 403.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::config::Secret;
use crate::domain::AdminProfile;
use crate::error::AppError;
use crate::providers::hmac_sha256_hex;
use crate::AppState;

/// Authenticated operator, resolved against the admin profile store.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub user_id: Uuid,
    pub profile: AdminProfile,
}

pub fn issue_session_token(secret: &Secret, user_id: Uuid) -> anyhow::Result<String> {
    let subject = user_id.to_string();
    let signature = hmac_sha256_hex(secret.as_bytes(), subject.as_bytes())
        .map_err(|e| anyhow::anyhow!("invalid session secret: {}", e))?;
    Ok(format!("{}.{}", subject, signature))
}

/// Returns the user id of a correctly signed token.
pub fn verify_session_token(secret: &Secret, token: &str) -> Option<Uuid> {
    let (subject, signature) = token.split_once('.')?;
    let user_id = Uuid::parse_str(subject).ok()?;
    let signature = hex::decode(signature).ok()?;

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(subject.as_bytes());
    mac.verify_slice(&signature).ok()?;
    Some(user_id)
}

#[async_trait]
impl FromRequestParts<AppState> for AdminSession {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .map(str::trim)
            .ok_or_else(|| AppError::Unauthorized("Missing admin session".to_string()))?;

        let user_id = verify_session_token(&state.session_secret, token)
            .ok_or_else(|| AppError::Unauthorized("Invalid admin session".to_string()))?;

        let profile = state.repos.admins.find_admin(user_id).await?.ok_or_else(|| {
            tracing::warn!(user_id = %user_id, "Non-admin session on admin route");
            AppError::Forbidden("Admin access required".to_string())
        })?;

        Ok(AdminSession { user_id, profile })
    }
}
