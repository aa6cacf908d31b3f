use axum::{Json, extract::State};
use chrono::Utc;
use tracing::{info, warn};

use crate::AppState;

use super::{LoginError, LoginRequest, LoginResponse, issue_token};

pub async fn login_handler(
    State(app_state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, LoginError> {
    let admin = &app_state.config.admin;

    if request.username != admin.username || request.password != admin.password {
        warn!("Admin login failed - invalid credentials");
        return Err(LoginError::InvalidCredentials);
    }

    let token = issue_token(&admin.token_secret, &request.username, Utc::now())?;
    info!(user = %request.username, "Admin login successful");

    Ok(Json(LoginResponse {
        success: true,
        token,
        message: "Login successful".to_string(),
    }))
}
