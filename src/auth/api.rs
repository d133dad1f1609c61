//! Authentication API Endpoints
//! Mission: Exchange e-mail and password for a signed access token

use crate::auth::{
    errors::LoginError,
    jwt::JwtHandler,
    middleware::AuthContext,
    models::{Claims, LoginRequest, LoginResponse},
    user_store::UserStore,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(user_store: Arc<UserStore>, jwt_handler: Arc<JwtHandler>) -> Self {
        Self {
            user_store,
            jwt_handler,
        }
    }

    /// Look up, check the password, then sign. No lockout or rate limiting.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, LoginError> {
        let user = self
            .user_store
            .find_user_by_email(email)
            .await
            .map_err(|e| LoginError::InternalError(e.to_string()))?
            .ok_or_else(|| {
                warn!("❌ Login for unknown e-mail: {}", email);
                LoginError::UserNotFound
            })?;

        let matched = self
            .user_store
            .validate_password(password, &user.password_hash)
            .await
            .map_err(|e| LoginError::InternalError(e.to_string()))?;

        if !matched {
            warn!("❌ Failed login attempt: {}", email);
            return Err(LoginError::InvalidCredentials);
        }

        let token = self
            .jwt_handler
            .generate_token(&user)
            .map_err(|e| LoginError::InternalError(e.to_string()))?;

        info!("✅ Login successful: {} ({})", user.email, user.role);
        Ok(token)
    }
}

/// Login endpoint - POST /users/login
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, LoginError> {
    let Json(payload) = payload?;
    let token = state.login(&payload.email, &payload.password).await?;

    Ok(Json(LoginResponse {
        success: true,
        message: "Login realizado com sucesso!".to_string(),
        token,
    }))
}

#[derive(Debug, Serialize)]
pub struct CurrentUserResponse {
    pub success: bool,
    pub payload: Claims,
}

/// Get current identity - GET /users/me
/// Built from the verified token, no database lookup
pub async fn get_current_user(context: AuthContext) -> Json<CurrentUserResponse> {
    Json(CurrentUserResponse {
        success: true,
        payload: context.claims().clone(),
    })
}
