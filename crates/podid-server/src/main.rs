//! podid — application entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use podid_auth::{SessionManager, TokenManager};
use podid_db::repository::{
    SurrealAuditLogRepository, SurrealRevocationRepository, SurrealSessionRepository,
};
use podid_db::DbManager;
use podid_server::{ServerArgs, spawn_sweeper};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("podid=info".parse()?))
        .json()
        .init();

    let args = ServerArgs::parse();
    let auth_config = args.auth_config()?;

    tracing::info!("Starting podid...");

    let db = DbManager::connect(&args.db_config())
        .await
        .context("failed to prepare SurrealDB")?;

    let tokens = TokenManager::new(&auth_config)
        .context("failed to load signing keys")?
        .with_revocation_store(SurrealRevocationRepository::new(db.client().clone()))
        .with_audit_sink(SurrealAuditLogRepository::new(db.client().clone()));
    let sessions = Arc::new(SessionManager::new(
        SurrealSessionRepository::new(db.client().clone()),
        tokens,
        &auth_config,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = spawn_sweeper(
        Arc::clone(&sessions),
        Duration::from_secs(auth_config.cleanup_interval_secs),
        shutdown_rx,
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown requested");

    // Fails only if the sweeper already exited.
    let _ = shutdown_tx.send(true);
    sweeper.await.context("cleanup sweeper panicked")?;

    tracing::info!("podid stopped.");
    Ok(())
}
