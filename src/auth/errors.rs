//! Auth Error Taxonomy
//! Mission: Map every gate and login failure to one status and one JSON envelope

use crate::auth::models::Role;
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Body of every gate rejection
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Failures of the authentication and authorization gates
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingCredential,
    #[error("authorization header malformed")]
    MalformedCredential,
    #[error("token invalid or expired")]
    InvalidOrExpiredCredential,
    #[error("no authenticated identity on request")]
    Unauthenticated,
    #[error("role {role} not in allow-list [{}]", join_roles(.allowed))]
    Forbidden { role: Role, allowed: Vec<Role> },
    #[error("internal authentication error: {0}")]
    InternalAuthError(String),
}

fn join_roles(roles: &[Role]) -> String {
    roles
        .iter()
        .map(Role::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredential
            | AuthError::MalformedCredential
            | AuthError::InvalidOrExpiredCredential
            | AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AuthError::InternalAuthError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredential => "MISSING_CREDENTIAL",
            AuthError::MalformedCredential => "MALFORMED_CREDENTIAL",
            AuthError::InvalidOrExpiredCredential => "INVALID_OR_EXPIRED_CREDENTIAL",
            AuthError::Unauthenticated => "UNAUTHENTICATED",
            AuthError::Forbidden { .. } => "FORBIDDEN",
            AuthError::InternalAuthError(_) => "INTERNAL_AUTH_ERROR",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code().to_string();

        let (error, message) = match &self {
            AuthError::MissingCredential => (
                "Token não fornecido no cabeçalho Authorization.".to_string(),
                None,
            ),
            AuthError::MalformedCredential => (
                "Formato do cabeçalho Authorization inválido. Token ausente.".to_string(),
                None,
            ),
            AuthError::InvalidOrExpiredCredential => {
                ("Token inválido ou expirado.".to_string(), None)
            }
            AuthError::Unauthenticated => (
                "Usuário não autenticado. Realize o login novamente.".to_string(),
                None,
            ),
            AuthError::Forbidden { role, allowed } => (
                "Acesso negado.".to_string(),
                Some(format!(
                    "Seu perfil ({}) não tem permissão para acessar esta rota. Requerido: {}",
                    role,
                    join_roles(allowed)
                )),
            ),
            AuthError::InternalAuthError(detail) => {
                error!("Authentication failed internally: {}", detail);
                (
                    "Erro interno ao processar a autenticação.".to_string(),
                    None,
                )
            }
        };

        (
            status,
            Json(ErrorResponse {
                error,
                code,
                message,
            }),
        )
            .into_response()
    }
}

/// Body of login and CRUD failures
#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Failures of the login flow
#[derive(Debug, Error)]
pub enum LoginError {
    #[error("no user registered with that e-mail")]
    UserNotFound,
    #[error("password does not match")]
    InvalidCredentials,
    #[error("unreadable login body: {0}")]
    InvalidBody(#[from] JsonRejection),
    #[error("login failed: {0}")]
    InternalError(String),
}

impl IntoResponse for LoginError {
    fn into_response(self) -> Response {
        let (status, message, error) = match &self {
            LoginError::UserNotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado", None),
            LoginError::InvalidCredentials => (StatusCode::BAD_REQUEST, "Senha incorreta", None),
            LoginError::InvalidBody(rejection) => (
                rejection.status(),
                "Erro ao realizar login",
                Some(rejection.body_text()),
            ),
            LoginError::InternalError(detail) => {
                error!("Login failed internally: {}", detail);
                (StatusCode::INTERNAL_SERVER_ERROR, "Erro ao realizar login", None)
            }
        };

        (
            status,
            Json(MessageResponse {
                message: message.to_string(),
                error,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_statuses() {
        assert_eq!(
            AuthError::MissingCredential.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::MalformedCredential.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidOrExpiredCredential.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Unauthenticated.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InternalAuthError("boom".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_forbidden_names_role_and_allow_list() {
        let err = AuthError::Forbidden {
            role: Role::Manager,
            allowed: vec![Role::Admin],
        };
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.to_string(), "role Manager not in allow-list [Admin]");
    }

    #[test]
    fn test_login_error_statuses() {
        assert_eq!(
            LoginError::UserNotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            LoginError::InvalidCredentials.into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            LoginError::InternalError("db down".to_string())
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
