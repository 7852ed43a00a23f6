// src/delivery.rs
//! Rate-limited dispatch of approved postings to the sink.

use std::time::Duration;

use metrics::counter;
use serde::{Deserialize, Serialize};

use crate::notify::Notifier;
use crate::posting::Posting;

fn default_max_batch_size() -> usize {
    20
}
fn default_send_delay_ms() -> u64 {
    1_500
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    #[serde(default = "default_send_delay_ms")]
    pub send_delay_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            max_batch_size: default_max_batch_size(),
            send_delay_ms: default_send_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub sent: Vec<String>,
    /// `(posting id, error)` for every failed send.
    pub failed: Vec<(String, String)>,
    /// Ids over the batch cap. Already marked seen, so never offered again.
    pub deferred: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DeliveryController {
    max_batch_size: usize,
    send_delay: Duration,
}

impl DeliveryController {
    pub fn new(cfg: DeliveryConfig) -> Self {
        Self {
            max_batch_size: cfg.max_batch_size.max(1),
            send_delay: Duration::from_millis(cfg.send_delay_ms),
        }
    }

    /// Send up to `max_batch_size` postings in order, pausing `send_delay`
    /// between consecutive sends. A failed send is logged and skipped; there
    /// are no retries at this level.
    pub async fn deliver(&self, sink: &dyn Notifier, postings: Vec<Posting>) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut batch = postings;
        if batch.len() > self.max_batch_size {
            let overflow = batch.split_off(self.max_batch_size);
            report.deferred = overflow.into_iter().map(|p| p.id).collect();
            tracing::warn!(
                sink = sink.name(),
                cap = self.max_batch_size,
                deferred = report.deferred.len(),
                ids = ?report.deferred,
                stage = "deliver",
                "batch cap reached; overflow dropped"
            );
            counter!("radar_deferred_total").increment(report.deferred.len() as u64);
        }

        for (i, posting) in batch.iter().enumerate() {
            if i > 0 && !self.send_delay.is_zero() {
                tokio::time::sleep(self.send_delay).await;
            }
            match sink.send(posting).await {
                Ok(()) => {
                    counter!("radar_delivered_total", "source" => posting.source.as_str()).increment(1);
                    report.sent.push(posting.id.clone());
                }
                Err(e) => {
                    tracing::warn!(
                        sink = sink.name(),
                        posting_id = %posting.id,
                        source = %posting.source,
                        error = %e,
                        stage = "deliver",
                        "delivery failed; posting dropped"
                    );
                    counter!("radar_delivery_errors_total").increment(1);
                    report.failed.push((posting.id.clone(), e.to_string()));
                }
            }
        }
        report
    }
}
