//! job-radar binary entrypoint.
//! Loads config, opens the dedup store, starts the cycle timers and serves the
//! admin/metrics HTTP surface.

use std::sync::Arc;

use anyhow::Context;
use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use job_radar::api::{self, AppState};
use job_radar::{app, config, notify};

/// Compact local logs. Shuttle installs its own subscriber in deployments,
/// so this only takes effect when JOB_RADAR_DEV_LOG=1.
fn enable_dev_tracing() {
    let dev_flag = std::env::var("JOB_RADAR_DEV_LOG")
        .ok()
        .is_some_and(|v| v == "1");
    if !dev_flag {
        return;
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("job_radar=info,warn"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    enable_dev_tracing();

    let cfg = config::load_config_default().context("loading job-radar config")?;

    let (metrics, store) = app::open_store_with_metrics(&cfg.store.path)?;

    let sink = notify::notifier_from_env();
    let scheduler = Arc::new(
        app::build_scheduler(&cfg, Arc::clone(&store), sink).context("building scheduler")?,
    );
    scheduler.spawn();

    let router = api::router(AppState { scheduler, store }).merge(metrics.router());

    Ok(router.into())
}
