//! UserHub - user accounts with role-based access
//! Mission: Serve the account API behind signed, time-bound bearer tokens

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use userhub_backend::{
    auth::{AuthState, JwtHandler, UserStore},
    create_router, AppConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    let _ = dotenv();
    init_tracing();

    let config = AppConfig::parse();
    let secret = config
        .validate()
        .context("Invalid configuration, refusing to start")?;

    info!("🚀 UserHub starting");

    let jwt_handler = Arc::new(
        JwtHandler::new(secret)
            .with_ttl_hours(config.token_ttl_hours)
            .context("Invalid token lifetime")?,
    );

    let user_store = Arc::new(
        UserStore::new(&config.db_path, config.bcrypt_cost).with_context(|| {
            format!("Failed to open user database at {}", config.db_path.display())
        })?,
    );
    match config.admin_credentials() {
        Some((email, password)) => {
            if user_store
                .ensure_admin(email, password)
                .context("Failed to seed admin user")?
            {
                info!("👤 Seeded admin account {}", email);
            }
        }
        None => warn!("⚠️  ADMIN_PASSWORD not set; skipping admin bootstrap"),
    }

    info!("🔐 Authentication initialized at: {}", config.db_path.display());

    let app = create_router(AuthState::new(user_store, jwt_handler));

    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "userhub=debug,userhub_backend=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
