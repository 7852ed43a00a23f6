// src/scheduler.rs
//! Cycle scheduler: named cron timers with a per-timer non-overlap guard.
//!
//! Each timer is idle (no schedule or loop not started), scheduled (loop
//! waiting for the next fire time) or running. A firing, scheduled or manual,
//! that finds its own timer running is skipped and counted, never queued.

use std::collections::BTreeMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cron::Schedule;
use futures::FutureExt as _;
use metrics::counter;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::error::SchedulerError;
use crate::ingest::{CycleReport, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimerName {
    JobCheck,
    AlertCheck,
}

impl TimerName {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimerName::JobCheck => "job-check",
            TimerName::AlertCheck => "alert-check",
        }
    }
}

impl fmt::Display for TimerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimerName {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "job-check" => Ok(TimerName::JobCheck),
            "alert-check" => Ok(TimerName::AlertCheck),
            _ => Err(SchedulerError::UnknownTimer(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerState {
    Idle,
    Scheduled,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone)]
pub enum TriggerOutcome {
    Completed(CycleReport),
    Failed(String),
    /// The same timer was already running.
    Skipped,
}

/// Work a timer runs when it fires.
#[async_trait]
pub trait CycleHandler: Send + Sync {
    async fn run(&self) -> anyhow::Result<CycleReport>;
}

#[async_trait]
impl CycleHandler for Pipeline {
    async fn run(&self) -> anyhow::Result<CycleReport> {
        Ok(self.run_cycle().await?)
    }
}

/// Accepts 5-field cron (seconds prepended) or the 6/7-field form the `cron` crate expects.
pub fn parse_cron(expr: &str) -> Result<Schedule, cron::error::Error> {
    let expr = expr.trim();
    if expr.split_whitespace().count() == 5 {
        Schedule::from_str(&format!("0 {expr}"))
    } else {
        Schedule::from_str(expr)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TimerStatus {
    pub name: TimerName,
    pub state: TimerState,
    pub schedule: Option<String>,
    pub next_run: Option<DateTime<Utc>>,
    pub skips: u64,
}

struct Timer {
    name: TimerName,
    expr: Option<String>,
    schedule: Option<Schedule>,
    handler: Arc<dyn CycleHandler>,
    running: AtomicBool,
    armed: AtomicBool,
    skips: AtomicU64,
}

/// Clears the running flag when the run ends, panics included.
struct RunningGuard<'a>(&'a AtomicBool);

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Timer {
    fn state(&self) -> TimerState {
        if self.running.load(Ordering::Acquire) {
            TimerState::Running
        } else if self.armed.load(Ordering::Acquire) {
            TimerState::Scheduled
        } else {
            TimerState::Idle
        }
    }

    async fn fire(&self, kind: TriggerKind) -> TriggerOutcome {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!(timer = %self.name, trigger = ?kind, "previous run still in progress; skipping");
            counter!("radar_scheduler_skips_total", "timer" => self.name.as_str()).increment(1);
            self.skips.fetch_add(1, Ordering::Relaxed);
            return TriggerOutcome::Skipped;
        }
        let _guard = RunningGuard(&self.running);

        tracing::info!(timer = %self.name, trigger = ?kind, "cycle starting");
        match AssertUnwindSafe(self.handler.run()).catch_unwind().await {
            Ok(Ok(report)) => TriggerOutcome::Completed(report),
            Ok(Err(e)) => {
                tracing::error!(timer = %self.name, error = %format!("{e:#}"), "cycle failed");
                TriggerOutcome::Failed(format!("{e:#}"))
            }
            Err(_) => {
                tracing::error!(timer = %self.name, "cycle panicked");
                TriggerOutcome::Failed("cycle panicked".to_string())
            }
        }
    }

    async fn run_loop(self: Arc<Self>, schedule: Schedule) {
        self.armed.store(true, Ordering::Release);
        let mut after = Utc::now();
        loop {
            let from = after.max(Utc::now());
            let Some(next) = schedule.after(&from).next() else {
                tracing::warn!(timer = %self.name, "schedule has no upcoming fire time; timer stopped");
                break;
            };
            let wait = (next - Utc::now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;
            after = next;

            let timer = Arc::clone(&self);
            tokio::spawn(async move {
                timer.fire(TriggerKind::Scheduled).await;
            });
        }
        self.armed.store(false, Ordering::Release);
    }
}

#[derive(Default)]
pub struct CycleScheduler {
    timers: BTreeMap<TimerName, Arc<Timer>>,
}

impl CycleScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a timer. `cron = None` leaves it manual-only.
    pub fn register(
        &mut self,
        name: TimerName,
        cron: Option<&str>,
        handler: Arc<dyn CycleHandler>,
    ) -> Result<(), SchedulerError> {
        let schedule = cron
            .map(|expr| {
                parse_cron(expr).map_err(|e| SchedulerError::InvalidCron {
                    timer: name.to_string(),
                    expr: expr.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;
        self.timers.insert(
            name,
            Arc::new(Timer {
                name,
                expr: cron.map(str::to_string),
                schedule,
                handler,
                running: AtomicBool::new(false),
                armed: AtomicBool::new(false),
                skips: AtomicU64::new(0),
            }),
        );
        Ok(())
    }

    /// Start a loop per scheduled timer. Handler failures are logged by the
    /// firing and never stop the loop.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        self.timers
            .values()
            .filter_map(|t| {
                let schedule = t.schedule.clone()?;
                tracing::info!(timer = %t.name, cron = ?t.expr, "timer scheduled");
                Some(tokio::spawn(Arc::clone(t).run_loop(schedule)))
            })
            .collect()
    }

    /// Operator-invoked run, subject to the same non-overlap rule.
    pub async fn trigger(&self, name: TimerName) -> Result<TriggerOutcome, SchedulerError> {
        let timer = self
            .timers
            .get(&name)
            .ok_or_else(|| SchedulerError::UnknownTimer(name.to_string()))?;
        Ok(timer.fire(TriggerKind::Manual).await)
    }

    pub fn state(&self, name: TimerName) -> Option<TimerState> {
        self.timers.get(&name).map(|t| t.state())
    }

    pub fn timers(&self) -> Vec<TimerStatus> {
        self.timers
            .values()
            .map(|t| TimerStatus {
                name: t.name,
                state: t.state(),
                schedule: t.expr.clone(),
                next_run: t.schedule.as_ref().and_then(|s| s.upcoming(Utc).next()),
                skips: t.skips.load(Ordering::Relaxed),
            })
            .collect()
    }
}
