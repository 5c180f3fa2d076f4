// src/main.rs

use casting_guard::client::JwksClient;
use casting_guard::config::ServerSettings;
use casting_guard::guard::AuthorizationGuard;
use casting_guard::server::store::MemoryStore;
use casting_guard::server::{router, AppState};
use casting_guard::validator::Validator;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = ServerSettings::load()?;
    let config = settings.auth.into_config()?;
    info!(
        issuer = %config.issuer,
        jwks_uri = %config.key_set.jwks_uri,
        "Authorization configured"
    );

    let keys = JwksClient::new(&config.key_set)?;
    let refresh_task = keys.spawn_background_refresh();

    let guard = AuthorizationGuard::new(Validator::new(config, Arc::new(keys)));
    let app = router(AppState::new(guard, MemoryStore::default()));

    let listener = TcpListener::bind(&settings.listen_addr).await?;
    info!(addr = %listener.local_addr()?, "Casting agency API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    refresh_task.abort();
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
