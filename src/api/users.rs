//! User CRUD handlers for `/users`

use crate::auth::{
    errors::MessageResponse,
    models::{CreateUserRequest, UpdateUserRequest, User},
    user_store::{StoreError, UserStore},
};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;

/// Success envelope shared by every `/users` route
#[derive(Debug, Serialize, Deserialize)]
pub struct Payload<T> {
    pub success: bool,
    pub payload: T,
}

impl<T> Payload<T> {
    fn ok(payload: T) -> Json<Self> {
        Json(Self {
            success: true,
            payload,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    List,
    Fetch,
    Create,
    Update,
    Delete,
}

impl UserAction {
    fn failure_message(self) -> &'static str {
        match self {
            UserAction::List => "Erro ao listar usuários",
            UserAction::Fetch => "Erro ao buscar usuário",
            UserAction::Create => "Erro ao criar usuário",
            UserAction::Update => "Erro ao atualizar usuário",
            UserAction::Delete => "Erro ao deletar usuário",
        }
    }
}

impl fmt::Display for UserAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verb = match self {
            UserAction::List => "list users",
            UserAction::Fetch => "fetch user",
            UserAction::Create => "create user",
            UserAction::Update => "update user",
            UserAction::Delete => "delete user",
        };
        f.write_str(verb)
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("user not found")]
    NotFound,
    #[error("unreadable body to {action}: {rejection}")]
    InvalidBody {
        action: UserAction,
        rejection: JsonRejection,
    },
    #[error("failed to {action}: {source}")]
    Store {
        action: UserAction,
        #[source]
        source: StoreError,
    },
}

impl ApiError {
    fn store(action: UserAction) -> impl FnOnce(StoreError) -> ApiError {
        move |source| ApiError::Store { action, source }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error) = match &self {
            ApiError::NotFound => (StatusCode::NOT_FOUND, "Usuário não encontrado", None),
            ApiError::InvalidBody { action, rejection } => (
                rejection.status(),
                action.failure_message(),
                Some(rejection.body_text()),
            ),
            ApiError::Store {
                action,
                source: StoreError::EmailTaken(_),
            } => (
                StatusCode::CONFLICT,
                action.failure_message(),
                Some("E-mail já cadastrado".to_string()),
            ),
            ApiError::Store { action, source } => {
                error!("Failed to {}: {}", action, source);
                let error = (*action == UserAction::Create)
                    .then(|| "Falha ao salvar o usuário".to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, action.failure_message(), error)
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

/// Unparseable ids cannot match a stored user.
fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound)
}

fn read_body<T>(
    action: UserAction,
    body: Result<Json<T>, JsonRejection>,
) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::InvalidBody { action, rejection })
}

/// GET /users
pub async fn list_users(
    State(store): State<Arc<UserStore>>,
) -> Result<Json<Payload<Vec<User>>>, ApiError> {
    let users = store
        .find_all_users()
        .await
        .map_err(ApiError::store(UserAction::List))?;
    Ok(Payload::ok(users))
}

/// GET /users/:id
pub async fn get_user(
    State(store): State<Arc<UserStore>>,
    Path(id): Path<String>,
) -> Result<Json<Payload<User>>, ApiError> {
    let id = parse_id(&id)?;
    store
        .find_user_by_id(id)
        .await
        .map_err(ApiError::store(UserAction::Fetch))?
        .map(Payload::ok)
        .ok_or(ApiError::NotFound)
}

/// POST /users
pub async fn create_user(
    State(store): State<Arc<UserStore>>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Payload<User>>), ApiError> {
    let payload = read_body(UserAction::Create, body)?;
    let user = store
        .create_user(payload)
        .await
        .map_err(ApiError::store(UserAction::Create))?;
    Ok((StatusCode::CREATED, Payload::ok(user)))
}

/// PUT /users/:id
pub async fn update_user(
    State(store): State<Arc<UserStore>>,
    Path(id): Path<String>,
    body: Result<Json<UpdateUserRequest>, JsonRejection>,
) -> Result<Json<Payload<User>>, ApiError> {
    let id = parse_id(&id)?;
    let payload = read_body(UserAction::Update, body)?;
    store
        .update_user(id, payload)
        .await
        .map_err(ApiError::store(UserAction::Update))?
        .map(Payload::ok)
        .ok_or(ApiError::NotFound)
}

/// DELETE /users/:id
pub async fn delete_user(
    State(store): State<Arc<UserStore>>,
    Path(id): Path<String>,
) -> Result<Json<Payload<User>>, ApiError> {
    let id = parse_id(&id)?;
    store
        .delete_user(id)
        .await
        .map_err(ApiError::store(UserAction::Delete))?
        .map(Payload::ok)
        .ok_or(ApiError::NotFound)
}
