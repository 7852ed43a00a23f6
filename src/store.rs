// src/store.rs
//! Dedup store: the persisted set of postings already delivered.
//!
//! The backing file is a pretty-printed JSON object keyed by posting id, so an
//! operator can read it or delete entries by hand to force a re-delivery.
//! Every mutation is written to a sibling temp file, fsynced and renamed over
//! the store file before the call returns.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use metrics::{counter, gauge};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::posting::{Posting, Source};

/// Records older than this (by `first_seen`) are evicted.
pub const RETENTION_DAYS: i64 = 30;

pub const DEFAULT_STORE_PATH: &str = "state/seen_jobs.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub id: String,
    pub title: String,
    pub company: String,
    pub url: String,
    pub source: Source,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
}

impl SeenRecord {
    fn from_posting(p: &Posting, now: DateTime<Utc>) -> Self {
        Self {
            id: p.id.clone(),
            title: p.title.clone(),
            company: p.company.clone(),
            url: p.url.clone(),
            source: p.source,
            first_seen: now,
            last_seen: now,
        }
    }
}

/// What `mark_seen` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    Created,
    Refreshed,
}

/// How the store came up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadStatus {
    /// No file yet.
    Fresh,
    Loaded { records: usize, evicted: usize },
    /// The file existed but could not be read; started empty.
    Recovered { reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub total: usize,
    pub by_source: BTreeMap<Source, usize>,
}

#[derive(Debug)]
pub struct SeenStore {
    path: PathBuf,
    records: RwLock<BTreeMap<String, SeenRecord>>,
    load_status: LoadStatus,
}

impl SeenStore {
    /// Open the store at `path`, evicting expired records.
    ///
    /// Never fails: an unreadable or corrupt file is moved aside, reported, and
    /// the store starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self::open_at(path, Utc::now())
    }

    pub fn open_at(path: impl Into<PathBuf>, now: DateTime<Utc>) -> Self {
        let path = path.into();
        let (records, status) = match read_records(&path) {
            Ok(Some(records)) => {
                let n = records.len();
                (records, LoadStatus::Loaded { records: n, evicted: 0 })
            }
            Ok(None) => (BTreeMap::new(), LoadStatus::Fresh),
            Err(reason) => {
                tracing::error!(
                    path = %path.display(),
                    %reason,
                    stage = "store-load",
                    "dedup store unreadable; starting empty, duplicates possible"
                );
                counter!("radar_store_load_errors_total").increment(1);
                quarantine(&path, now);
                (BTreeMap::new(), LoadStatus::Recovered { reason })
            }
        };

        let mut store = Self {
            path,
            records: RwLock::new(records),
            load_status: status,
        };

        match store.evict_expired(now) {
            Ok(evicted) => {
                if let LoadStatus::Loaded { evicted: e, .. } = &mut store.load_status {
                    *e = evicted;
                }
            }
            Err(e) => tracing::warn!(error = %e, stage = "store-evict", "initial eviction not persisted"),
        }
        gauge!("radar_store_records").set(store.len() as f64);
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_status(&self) -> &LoadStatus {
        &self.load_status
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn has_seen(&self, id: &str) -> bool {
        self.records.read().contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<SeenRecord> {
        self.records.read().get(id).cloned()
    }

    pub fn mark_seen(&self, posting: &Posting) -> Result<MarkOutcome, StoreError> {
        self.mark_seen_at(posting, Utc::now())
    }

    /// Idempotent upsert. A new record gets `first_seen = last_seen = now`;
    /// an existing one only has `last_seen` moved. The write lock is held
    /// through persistence, so readers never see an unpersisted record.
    pub fn mark_seen_at(
        &self,
        posting: &Posting,
        now: DateTime<Utc>,
    ) -> Result<MarkOutcome, StoreError> {
        let mut records = self.records.write();
        let previous = records.get(&posting.id).cloned();
        let outcome = match records.entry(posting.id.clone()) {
            Entry::Occupied(mut rec) => {
                rec.get_mut().last_seen = now;
                MarkOutcome::Refreshed
            }
            Entry::Vacant(slot) => {
                slot.insert(SeenRecord::from_posting(posting, now));
                MarkOutcome::Created
            }
        };

        if let Err(e) = persist(&self.path, &records) {
            // Keep memory in step with disk.
            match previous {
                Some(prev) => records.insert(posting.id.clone(), prev),
                None => records.remove(&posting.id),
            };
            return Err(e);
        }
        gauge!("radar_store_records").set(records.len() as f64);
        Ok(outcome)
    }

    /// Drop every record first seen more than [`RETENTION_DAYS`] before `now`,
    /// however recently it was re-observed. Returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let horizon = now - ChronoDuration::days(RETENTION_DAYS);
        let mut records = self.records.write();
        let expired: Vec<(String, SeenRecord)> = records
            .iter()
            .filter(|(_, r)| r.first_seen < horizon)
            .map(|(k, r)| (k.clone(), r.clone()))
            .collect();
        if expired.is_empty() {
            return Ok(0);
        }
        for (id, _) in &expired {
            records.remove(id);
        }
        if let Err(e) = persist(&self.path, &records) {
            records.extend(expired);
            return Err(e);
        }
        gauge!("radar_store_records").set(records.len() as f64);
        tracing::info!(evicted = expired.len(), stage = "store-evict", "evicted expired records");
        Ok(expired.len())
    }

    pub fn stats(&self) -> StoreStats {
        let records = self.records.read();
        let mut by_source = BTreeMap::new();
        for r in records.values() {
            *by_source.entry(r.source).or_insert(0) += 1;
        }
        StoreStats {
            total: records.len(),
            by_source,
        }
    }
}

fn read_records(path: &Path) -> Result<Option<BTreeMap<String, SeenRecord>>, String> {
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.to_string()),
    };
    if raw.trim().is_empty() {
        return Ok(Some(BTreeMap::new()));
    }
    let mut records: BTreeMap<String, SeenRecord> =
        serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    // The key is authoritative for hand-edited files.
    for (key, rec) in records.iter_mut() {
        if rec.id != *key {
            rec.id = key.clone();
        }
    }
    Ok(Some(records))
}

fn quarantine(path: &Path, now: DateTime<Utc>) {
    if !path.exists() {
        return;
    }
    let aside = path.with_extension(format!("corrupt-{}", now.timestamp()));
    if let Err(e) = fs::rename(path, &aside) {
        tracing::warn!(error = %e, path = %path.display(), "could not move unreadable store aside");
    } else {
        tracing::warn!(moved_to = %aside.display(), "unreadable store moved aside");
    }
}

fn persist(path: &Path, records: &BTreeMap<String, SeenRecord>) -> Result<(), StoreError> {
    let body = serde_json::to_vec_pretty(records)?;
    let unavailable = |source| StoreError::Unavailable {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(unavailable)?;
    }
    let tmp = path.with_extension("json.tmp");
    let mut file = fs::File::create(&tmp).map_err(unavailable)?;
    file.write_all(&body).map_err(unavailable)?;
    file.sync_all().map_err(unavailable)?;
    drop(file);
    fs::rename(&tmp, path).map_err(unavailable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn posting(id: &str) -> Posting {
        Posting::new(Source::Greenhouse, id, "Engineer", "https://x.test/j", Utc::now()).unwrap()
    }

    #[test]
    fn missing_file_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let store = SeenStore::open(dir.path().join("seen.json"));
        assert_eq!(store.load_status(), &LoadStatus::Fresh);
        assert!(store.is_empty());
    }

    #[test]
    fn failed_persist_rolls_back_memory() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes the rename fail.
        let path = dir.path().join("seen.json");
        fs::create_dir_all(path.join("occupied")).unwrap();
        let store = SeenStore {
            path: path.clone(),
            records: RwLock::new(BTreeMap::new()),
            load_status: LoadStatus::Fresh,
        };
        let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        assert!(store.mark_seen_at(&posting("1"), t).is_err());
        assert!(!store.has_seen("greenhouse-1"));
    }
}
