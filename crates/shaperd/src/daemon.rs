//! Assembles the controller, its collaborators, and the status server.

use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

use shaper_api::{StatusState, status_router};
use shaper_controller::{Controller, ControllerHandle, ControllerStatus};
use shaper_core::ResourceId;
use shaper_estimator::Estimator;
use shaper_metrics::HttpMetricsSource;

use crate::applier::build_applier;
use crate::config::ShaperConfig;

/// Build the metrics source from `[metrics]`.
pub fn build_source(config: &ShaperConfig) -> anyhow::Result<HttpMetricsSource> {
    let endpoint = config.metrics.endpoint.trim();
    if endpoint.is_empty() {
        warn!("metrics.endpoint not set; every tick will report an uninitialized client");
        return Ok(HttpMetricsSource::uninitialized());
    }
    HttpMetricsSource::new(endpoint).context("metrics.endpoint")
}

/// Run the controller and serve `/status` on `listener` until `shutdown`
/// resolves. Returns once the loop has published `Stopped`.
pub async fn serve<F>(config: ShaperConfig, listener: TcpListener, shutdown: F) -> anyhow::Result<ControllerHandle>
where
    F: Future<Output = ()> + Send + 'static,
{
    config.validate()?;

    let resource = ResourceId::new(config.controller.resource_id.trim());
    let controller = Controller::new(
        resource.clone(),
        build_source(&config)?,
        Estimator::new(config.estimator.clone()).context("[estimator]")?,
        build_applier(&config.applier)?,
        config.controller_config()?,
    )?;
    let handle = controller.handle();
    info!(%resource, applier = ?config.applier.kind, "controller initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_handle = tokio::spawn(controller.run(shutdown_rx));

    // ── Status server ──────────────────────────────────────────

    let router = status_router(StatusState::new(Arc::new(handle.clone())));
    let addr = listener.local_addr()?;
    info!(%addr, "status server starting");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown.await;
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    loop_handle.await.context("controller task")?;
    info!(state = %handle.state(), "cpushaper daemon stopped");
    Ok(handle)
}
