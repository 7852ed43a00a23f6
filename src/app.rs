// src/app.rs
//! Wires configuration into pipelines and the scheduler.

use std::path::Path;
use std::sync::Arc;

use crate::config::{AppConfig, SourcesConfig};
use crate::delivery::DeliveryController;
use crate::error::SchedulerError;
use crate::filter::FilterEngine;
use crate::ingest::providers::{
    careers::CareersPageAdapter, greenhouse::GreenhouseAdapter, lever::LeverAdapter,
    mailbox::MailboxAdapter, rss::RssFeedAdapter,
};
use crate::ingest::types::SourceAdapter;
use crate::ingest::Pipeline;
use crate::metrics::Metrics;
use crate::notify::Notifier;
use crate::scheduler::{CycleScheduler, TimerName};
use crate::store::{LoadStatus, SeenStore};

/// Boards, careers pages and feeds: the periodic job check.
pub fn job_check_adapters(sources: &SourcesConfig) -> Vec<Box<dyn SourceAdapter>> {
    vec![
        Box::new(GreenhouseAdapter::new(sources.greenhouse.clone())),
        Box::new(LeverAdapter::new(sources.lever.clone())),
        Box::new(CareersPageAdapter::new(sources.careers.clone())),
        Box::new(RssFeedAdapter::new(sources.rss.clone())),
    ]
}

/// Job-alert mailbox: the alert-source check.
pub fn alert_check_adapters(sources: &SourcesConfig) -> Vec<Box<dyn SourceAdapter>> {
    vec![Box::new(MailboxAdapter::new(sources.mailbox.clone()))]
}

/// Register both timers. Their pipelines share one store and one sink.
pub fn build_scheduler_with(
    cfg: &AppConfig,
    job_adapters: Vec<Box<dyn SourceAdapter>>,
    alert_adapters: Vec<Box<dyn SourceAdapter>>,
    store: Arc<SeenStore>,
    sink: Arc<dyn Notifier>,
) -> Result<CycleScheduler, SchedulerError> {
    let pipeline = |adapters| {
        Arc::new(Pipeline::new(
            adapters,
            FilterEngine::new(&cfg.filters),
            Arc::clone(&store),
            DeliveryController::new(cfg.delivery),
            Arc::clone(&sink),
        ))
    };

    let mut scheduler = CycleScheduler::new();
    scheduler.register(
        TimerName::JobCheck,
        cfg.schedule.job_check(),
        pipeline(job_adapters),
    )?;
    scheduler.register(
        TimerName::AlertCheck,
        cfg.schedule.alert_check(),
        pipeline(alert_adapters),
    )?;
    Ok(scheduler)
}

pub fn build_scheduler(
    cfg: &AppConfig,
    store: Arc<SeenStore>,
    sink: Arc<dyn Notifier>,
) -> Result<CycleScheduler, SchedulerError> {
    build_scheduler_with(
        cfg,
        job_check_adapters(&cfg.sources),
        alert_check_adapters(&cfg.sources),
        store,
        sink,
    )
}

/// Install the Prometheus recorder, then open the dedup store so its load
/// counters and record gauge land on `/metrics`.
pub fn open_store_with_metrics(path: &Path) -> anyhow::Result<(Metrics, Arc<SeenStore>)> {
    let metrics = Metrics::init()?;
    let store = Arc::new(SeenStore::open(path));
    match store.load_status() {
        LoadStatus::Recovered { reason } => {
            tracing::error!(%reason, "dedup store recovered empty; expect re-deliveries")
        }
        status => tracing::info!(?status, records = store.len(), "dedup store ready"),
    }
    Ok((metrics, store))
}
