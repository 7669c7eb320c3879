//! iSHARE PEP server: an enforcing reverse proxy in front of an NGSI data service.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod logging;
pub mod proxy;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use ishare_pep::{PepGwLocalClient, Service};
use ishare_pep_sdk::PepGatewayClient;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::proxy::ProxyState;

/// Build the decision engine and the proxy router from configuration.
///
/// # Errors
///
/// Returns an error if the PEP or backend configuration is invalid.
pub fn build(cfg: &AppConfig) -> anyhow::Result<(axum::Router, Arc<Service>)> {
    let svc = Arc::new(Service::from_config(&cfg.pep).context("invalid pep configuration")?);
    let pep: Arc<dyn PepGatewayClient> = Arc::new(PepGwLocalClient::new(Arc::clone(&svc)));
    let state = ProxyState::new(pep, &cfg.backend, cfg.max_body_bytes)
        .context("invalid backend configuration")?;
    Ok((proxy::router(Arc::new(state)), svc))
}

/// Serve until Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration is invalid or the listener cannot be bound.
pub async fn run(cfg: AppConfig) -> anyhow::Result<()> {
    let (app, svc) = build(&cfg)?;

    let ttl = cfg.pep.cache_ttl();
    if !ttl.is_zero() {
        tokio::spawn(purge_expired_periodically(Arc::clone(&svc), ttl));
    }

    let listener = TcpListener::bind(cfg.listen)
        .await
        .with_context(|| format!("failed to bind {}", cfg.listen))?;
    tracing::info!(
        listen = %cfg.listen,
        backend = %cfg.backend.host,
        registry = cfg.pep.registry.is_some(),
        "ishare-pep-server started"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("ishare-pep-server stopped");
    Ok(())
}

async fn purge_expired_periodically(svc: Arc<Service>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    loop {
        ticker.tick().await;
        svc.cache().purge_expired();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
