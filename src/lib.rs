// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod app;
pub mod config;
pub mod delivery;
pub mod error;
pub mod filter;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod posting;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::filter::{matches, FilterRules};
pub use crate::ingest::{CycleReport, Pipeline};
pub use crate::posting::{Posting, Source, UNSPECIFIED};
pub use crate::scheduler::{CycleScheduler, TimerName, TriggerOutcome};
pub use crate::store::{SeenRecord, SeenStore};
