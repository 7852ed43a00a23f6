// src/ingest/mod.rs
pub mod providers;
pub mod types;

use std::collections::HashSet;
use std::sync::Arc;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::delivery::{DeliveryController, DeliveryReport};
use crate::error::RunError;
use crate::filter::FilterEngine;
use crate::ingest::types::SourceAdapter;
use crate::notify::Notifier;
use crate::posting::Posting;
use crate::store::SeenStore;

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("radar_fetched_total", "Postings fetched, by source.");
        describe_counter!("radar_target_errors_total", "Single-target fetch failures.");
        describe_counter!("radar_source_errors_total", "Adapters excluded from a cycle.");
        describe_counter!("radar_filtered_total", "Postings rejected by the keyword filter.");
        describe_counter!("radar_already_seen_total", "Postings dropped as already delivered.");
        describe_counter!("radar_new_total", "Postings claimed for delivery.");
        describe_counter!("radar_delivered_total", "Postings sent to the sink.");
        describe_counter!("radar_delivery_errors_total", "Failed sends.");
        describe_counter!("radar_deferred_total", "Postings over the batch cap.");
        describe_counter!("radar_scheduler_skips_total", "Firings skipped due to overlap.");
        describe_counter!("radar_store_load_errors_total", "Dedup store unreadable at startup.");
        describe_gauge!("radar_store_records", "Records in the dedup store.");
        describe_gauge!("radar_cycle_last_run_ts", "Unix ts when a cycle last finished.");
    });
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceFailure {
    pub source: &'static str,
    pub error: String,
}

/// Fetch from every adapter concurrently. A failing adapter is recorded and
/// left out; it never affects its siblings.
pub async fn collect(adapters: &[Box<dyn SourceAdapter>]) -> (Vec<Posting>, Vec<SourceFailure>) {
    let results = futures::future::join_all(adapters.iter().map(|a| a.fetch())).await;

    let mut batch = Vec::new();
    let mut failures = Vec::new();
    for (adapter, res) in adapters.iter().zip(results) {
        match res {
            Ok(mut postings) => batch.append(&mut postings),
            Err(e) => {
                tracing::warn!(error = %e, source = adapter.name(), stage = "fetch", "source excluded from cycle");
                counter!("radar_source_errors_total", "source" => adapter.name()).increment(1);
                failures.push(SourceFailure {
                    source: adapter.name(),
                    error: e.to_string(),
                });
            }
        }
    }
    (batch, failures)
}

#[derive(Debug, Default)]
pub struct Selection {
    pub new: Vec<Posting>,
    pub filtered_out: usize,
    pub already_seen: usize,
}

/// Filter the batch, then drop everything the store has already seen.
/// Repeats of one id inside the batch count as already seen.
pub fn select_new(batch: Vec<Posting>, filter: &FilterEngine, store: &SeenStore) -> Selection {
    let mut sel = Selection::default();
    let mut in_batch = HashSet::new();
    for p in batch {
        if !filter.matches(&p) {
            sel.filtered_out += 1;
            continue;
        }
        if store.has_seen(&p.id) || !in_batch.insert(p.id.clone()) {
            sel.already_seen += 1;
            continue;
        }
        sel.new.push(p);
    }
    sel
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CycleReport {
    pub fetched: usize,
    pub failed_sources: Vec<SourceFailure>,
    pub filtered_out: usize,
    pub already_seen: usize,
    pub new: usize,
    pub delivery: DeliveryReport,
}

/// Everything one kind of cycle needs: its adapters plus the shared store and sink.
pub struct Pipeline {
    adapters: Vec<Box<dyn SourceAdapter>>,
    filter: FilterEngine,
    store: Arc<SeenStore>,
    delivery: DeliveryController,
    sink: Arc<dyn Notifier>,
}

impl Pipeline {
    pub fn new(
        adapters: Vec<Box<dyn SourceAdapter>>,
        filter: FilterEngine,
        store: Arc<SeenStore>,
        delivery: DeliveryController,
        sink: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            adapters,
            filter,
            store,
            delivery,
            sink,
        }
    }

    pub fn adapters(&self) -> &[Box<dyn SourceAdapter>] {
        &self.adapters
    }

    /// One full cycle: fetch, filter, dedup, claim, deliver.
    ///
    /// Every new posting is marked seen before any is sent, so a crash or a
    /// failed send loses a posting rather than duplicating it.
    pub async fn run_cycle(&self) -> Result<CycleReport, RunError> {
        ensure_metrics_described();

        let (batch, failed_sources) = collect(&self.adapters).await;
        let fetched = batch.len();
        let sel = select_new(batch, &self.filter, &self.store);
        counter!("radar_filtered_total").increment(sel.filtered_out as u64);
        counter!("radar_already_seen_total").increment(sel.already_seen as u64);

        let mut claimed = Vec::with_capacity(sel.new.len());
        let mut store_err = None;
        for p in sel.new {
            match self.store.mark_seen(&p) {
                Ok(_) => claimed.push(p),
                Err(e) => {
                    tracing::error!(error = %e, posting_id = %p.id, stage = "mark", "dedup store write failed; aborting cycle");
                    store_err = Some(e);
                    break;
                }
            }
        }
        counter!("radar_new_total").increment(claimed.len() as u64);
        let new = claimed.len();

        // Claimed postings are never offered again, so they go out even when
        // the cycle is aborting.
        let delivery = self.delivery.deliver(self.sink.as_ref(), claimed).await;
        gauge!("radar_cycle_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        if let Some(source) = store_err {
            return Err(RunError::Store {
                claimed: new,
                source,
            });
        }

        let report = CycleReport {
            fetched,
            failed_sources,
            filtered_out: sel.filtered_out,
            already_seen: sel.already_seen,
            new,
            delivery,
        };
        tracing::info!(
            target: "ingest",
            fetched = report.fetched,
            failed_sources = report.failed_sources.len(),
            filtered = report.filtered_out,
            seen = report.already_seen,
            new = report.new,
            sent = report.delivery.sent.len(),
            "cycle finished"
        );
        Ok(report)
    }
}
