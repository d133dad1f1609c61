//! Request logging middleware.
//!
//! One line per request: method, path, status, latency and, on protected
//! routes, the caller the authentication gate accepted. Tokens and the
//! `Authorization` header never reach the log.

use crate::auth::AuthContext;
use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::Instant;
use tracing::{info, warn};

pub async fn request_logging(request: Request<Body>, next: Next) -> Response {
    // Probes hit this every few seconds
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = started.elapsed().as_millis();
    let caller = response.extensions().get::<AuthContext>();
    let subject = caller.map_or("-", AuthContext::subject);
    let role = caller.map_or("-", |c| c.role().as_str());

    if status.is_server_error() {
        warn!(%method, %path, status = status.as_u16(), latency_ms, subject, role, "request failed");
    } else {
        info!(%method, %path, status = status.as_u16(), latency_ms, subject, role, "request served");
    }

    response
}
