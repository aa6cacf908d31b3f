use super::LoginError;
use crate::AppState;
use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};
use base64::{Engine, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Issue an admin bearer token: `base64(username:issued_at):signature`.
pub fn issue_token(
    secret: &str,
    username: &str,
    issued_at: DateTime<Utc>,
) -> Result<String, LoginError> {
    let payload = general_purpose::URL_SAFE_NO_PAD
        .encode(format!("{}:{}", username, issued_at.timestamp()));
    let signature = sign(secret, &payload)?;
    Ok(format!("{}:{}", payload, signature))
}

/// Check a token's signature and age, returning the username it was
/// issued to.
pub fn verify_token(
    secret: &str,
    token: &str,
    ttl: Duration,
    now: DateTime<Utc>,
) -> Result<String, LoginError> {
    let (payload, signature_b64) = token.split_once(':').ok_or(LoginError::TokenInvalid)?;
    let signature = general_purpose::URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| LoginError::TokenInvalid)?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| LoginError::InternalError("Invalid secret key".to_string()))?;
    mac.update(payload.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| LoginError::TokenInvalid)?;

    let decoded = general_purpose::URL_SAFE_NO_PAD
        .decode(payload)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(LoginError::TokenInvalid)?;
    let (username, issued) = decoded.rsplit_once(':').ok_or(LoginError::TokenInvalid)?;
    let issued_at = issued
        .parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .ok_or(LoginError::TokenInvalid)?;

    if now.signed_duration_since(issued_at) > ttl {
        return Err(LoginError::TokenExpired);
    }

    Ok(username.to_string())
}

fn sign(secret: &str, value: &str) -> Result<String, LoginError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| LoginError::InternalError("Invalid secret key".to_string()))?;
    mac.update(value.as_bytes());
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Admin identity taken from the `Authorization: Bearer <token>` header.
///
/// Add this as a handler parameter to require a valid admin token; the
/// request is rejected before the handler body runs.
#[derive(Debug, Clone)]
pub struct AdminSession {
    pub username: String,
}

impl FromRequestParts<AppState> for AdminSession {
    type Rejection = LoginError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(LoginError::TokenMissing)?;

        let admin = &state.config.admin;
        let ttl = Duration::hours(admin.token_ttl_hours as i64);

        match verify_token(&admin.token_secret, token.trim(), ttl, Utc::now()) {
            Ok(username) => Ok(AdminSession { username }),
            Err(e) => {
                warn!(path = %parts.uri.path(), "Rejected admin token: {}", e);
                Err(e)
            }
        }
    }
}
