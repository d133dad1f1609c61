//! Router assembly: public routes, the authentication gate, and per-route allow-lists

use crate::{
    api::users,
    auth::{
        api as auth_api, authenticate, authorize, models::Role, AuthState, UserStore,
    },
    middleware::request_logging,
};
use axum::{
    extract::FromRef,
    middleware,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Roles admitted to each protected area. Flat lists: a role is admitted
/// only where it is named.
pub const ADMIN_AREA: &[Role] = &[Role::Admin];
pub const MANAGER_AREA: &[Role] = &[Role::Manager, Role::Admin];
pub const USER_WRITERS: &[Role] = &[Role::Admin, Role::Manager];
pub const USER_DELETERS: &[Role] = &[Role::Admin];

impl FromRef<AuthState> for Arc<UserStore> {
    fn from_ref(state: &AuthState) -> Self {
        state.user_store.clone()
    }
}

/// Create the API router
pub fn create_router(state: AuthState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/users/login", post(auth_api::login))
        .route("/users", get(users::list_users))
        .route("/users/:id", get(users::get_user));

    let admin_routes = Router::new()
        .route("/admin", get(admin_area))
        .route_layer(middleware::from_fn(authorize(ADMIN_AREA)));

    let manager_routes = Router::new()
        .route("/manager", get(manager_area))
        .route_layer(middleware::from_fn(authorize(MANAGER_AREA)));

    let user_writes = Router::new()
        .route("/users", post(users::create_user))
        .route("/users/:id", put(users::update_user))
        .route_layer(middleware::from_fn(authorize(USER_WRITERS)));

    let user_deletes = Router::new()
        .route("/users/:id", delete(users::delete_user))
        .route_layer(middleware::from_fn(authorize(USER_DELETERS)));

    // Any authenticated role
    let identity_routes = Router::new().route("/users/me", get(auth_api::get_current_user));

    let protected_routes = Router::new()
        .merge(admin_routes)
        .merge(manager_routes)
        .merge(user_writes)
        .merge(user_deletes)
        .merge(identity_routes)
        .route_layer(middleware::from_fn_with_state(
            state.jwt_handler.clone(),
            authenticate,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn admin_area() -> Json<Value> {
    Json(json!({ "message": "Bem-vindo, Administrador!" }))
}

async fn manager_area() -> Json<Value> {
    Json(json!({ "message": "Bem-vindo, Gerente!" }))
}
