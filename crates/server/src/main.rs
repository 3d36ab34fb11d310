#![forbid(unsafe_code)]

use anyhow::Context;
use monitore_core::{bootstrap, db};
use server::{build_router, AppState};
use std::env;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn env_str(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_required(name: &str) -> anyhow::Result<String> {
    env::var(name).with_context(|| format!("{name} must be set"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = env_str("MONITORE_DB_PATH", "monitore.db");
    let bind_addr = env_str("MONITORE_BIND_ADDR", "127.0.0.1:8080");
    let service_key = env_required("MONITORE_SERVICE_KEY")?;

    let mut conn = db::open(&db_path).with_context(|| format!("opening database {db_path}"))?;

    // Idempotent admin provisioning on every start, as the original app
    // triggers on load.
    match bootstrap::ensure_admin(&mut conn) {
        Ok(outcome) => info!(user_exists = outcome.user_exists, "admin bootstrap complete"),
        Err(err) => {
            error!(error = %err, "admin bootstrap failed");
            return Err(err.into());
        }
    }

    let state = AppState::new(conn, service_key);
    let app = build_router(state);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {bind_addr}"))?;
    info!(addr = %bind_addr, db = %db_path, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
    }
}
