//! UserHub Backend Library
//!
//! User accounts over SQLite with role-gated bearer tokens. The binary in
//! main.rs only loads configuration and serves [`api::create_router`].

pub mod api;
pub mod auth;
pub mod config;
pub mod middleware;

pub use api::create_router;
pub use config::{AppConfig, ConfigError};
