//! Quota manager
//!
//! Serves the HTTP API through which quota managers read and change the
//! resource quotas of projects on the registered clusters.

use std::sync::Arc;

use anyhow::Result;
use qm_quota_manager::{
    api,
    cluster::HttpClusterApi,
    config::Config,
    reconciler::QuotaReconciler,
    registry::Registry,
    state::AppState,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Prefer RUST_LOG, fall back to QM_LOG_LEVEL.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting quota manager");
    info!(
        listen_addr = %config.listen_addr,
        config_dir = %config.config_dir.display(),
        managed_label = %config.managed_label.name,
        group = %config.quota_managers_group,
        "Configuration loaded"
    );

    let registry = match Registry::load_dir(&config.config_dir) {
        Ok(registry) => Arc::new(registry),
        Err(e) => {
            error!(error = %e, "Failed to load clusters and quota schemes");
            return Err(e.into());
        }
    };
    info!(
        clusters = registry.cluster_count(),
        schemes = registry.scheme_count(),
        "Registry loaded"
    );

    let cluster_api = match HttpClusterApi::new(&registry, config.cluster_timeout) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            error!(error = %e, "Failed to build cluster API clients");
            return Err(e.into());
        }
    };

    let reconciler = QuotaReconciler::new(
        cluster_api.clone(),
        config.managed_label.clone(),
        config.username_format.clone(),
    );
    let state = AppState::new(
        registry,
        cluster_api,
        reconciler,
        config.quota_managers_group.clone(),
    );
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
            info!("Received shutdown signal");
        })
        .await?;

    info!("Quota manager shutdown complete");
    Ok(())
}
