// tests/dedup_store.rs
use chrono::{Duration, TimeZone, Utc};
use job_radar::store::{LoadStatus, MarkOutcome, SeenStore};
use job_radar::{Posting, Source};
use std::fs;

fn posting(source: Source, local: &str) -> Posting {
    Posting::new(source, local, "Sales Engineer", "https://jobs.test/1", Utc::now())
        .unwrap()
        .with_company(Some("Acme"))
}

#[test]
fn mark_seen_twice_keeps_first_seen_and_moves_last_seen() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeenStore::open(dir.path().join("seen.json"));
    let p = posting(Source::Greenhouse, "1");
    let t1 = Utc::now() - Duration::hours(2);
    let t2 = Utc::now();

    assert_eq!(store.mark_seen_at(&p, t1).unwrap(), MarkOutcome::Created);
    assert_eq!(store.mark_seen_at(&p, t2).unwrap(), MarkOutcome::Refreshed);

    assert_eq!(store.len(), 1);
    let rec = store.get("greenhouse-1").unwrap();
    assert_eq!(rec.first_seen, t1);
    assert_eq!(rec.last_seen, t2);
    assert_eq!(rec.company, "Acme");
}

#[test]
fn marks_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/state/seen.json");
    {
        let store = SeenStore::open(&path);
        store.mark_seen(&posting(Source::Lever, "abc")).unwrap();
    }
    let reopened = SeenStore::open(&path);
    assert!(reopened.has_seen("lever-abc"));
    assert!(matches!(
        reopened.load_status(),
        LoadStatus::Loaded { records: 1, evicted: 0 }
    ));
}

#[test]
fn eviction_uses_first_seen_and_a_thirty_day_horizon() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeenStore::open(dir.path().join("seen.json"));
    let now = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();

    let old = posting(Source::Rss, "old");
    let young = posting(Source::Rss, "young");
    store.mark_seen_at(&old, now - Duration::days(31)).unwrap();
    // Re-observed yesterday: still evicted, retention ignores last_seen.
    store.mark_seen_at(&old, now - Duration::days(1)).unwrap();
    store.mark_seen_at(&young, now - Duration::days(29)).unwrap();

    assert_eq!(store.evict_expired(now).unwrap(), 1);
    assert!(!store.has_seen("rss-old"));
    assert!(store.has_seen("rss-young"));
    // Redundant calls are harmless.
    assert_eq!(store.evict_expired(now).unwrap(), 0);
}

#[test]
fn open_evicts_expired_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    let now = Utc::now();
    {
        let store = SeenStore::open(&path);
        store
            .mark_seen_at(&posting(Source::Careers, "stale"), now - Duration::days(45))
            .unwrap();
        store.mark_seen_at(&posting(Source::Careers, "fresh"), now).unwrap();
    }
    let store = SeenStore::open_at(&path, now);
    assert_eq!(store.len(), 1);
    assert_eq!(
        store.load_status(),
        &LoadStatus::Loaded {
            records: 2,
            evicted: 1
        }
    );
}

#[test]
fn corrupt_file_fails_open_and_is_moved_aside() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    fs::write(&path, "{ this is not json").unwrap();

    let store = SeenStore::open(&path);
    assert!(store.is_empty());
    assert!(matches!(store.load_status(), LoadStatus::Recovered { .. }));

    let aside = fs::read_dir(dir.path())
        .unwrap()
        .flatten()
        .any(|e| e.file_name().to_string_lossy().starts_with("seen.corrupt-"));
    assert!(aside, "corrupt file should be kept for inspection");

    // The store keeps working afterwards.
    store.mark_seen(&posting(Source::Mailbox, "1")).unwrap();
    assert!(SeenStore::open(&path).has_seen("mailbox-1"));
}

#[test]
fn file_is_plain_json_keyed_by_id_and_hand_editable() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    let store = SeenStore::open(&path);
    store.mark_seen(&posting(Source::Greenhouse, "1")).unwrap();
    store.mark_seen(&posting(Source::Greenhouse, "2")).unwrap();
    drop(store);

    let mut doc: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    let rec = &doc["greenhouse-1"];
    for field in ["id", "title", "company", "url", "source", "first_seen", "last_seen"] {
        assert!(rec.get(field).is_some(), "missing {field}");
    }
    assert_eq!(rec["source"], "greenhouse");

    // Operator deletes one entry to force a re-delivery.
    doc.as_object_mut().unwrap().remove("greenhouse-2");
    fs::write(&path, serde_json::to_string_pretty(&doc).unwrap()).unwrap();

    let store = SeenStore::open(&path);
    assert!(store.has_seen("greenhouse-1"));
    assert!(!store.has_seen("greenhouse-2"));
}

#[test]
fn stats_count_by_source() {
    let dir = tempfile::tempdir().unwrap();
    let store = SeenStore::open(dir.path().join("seen.json"));
    store.mark_seen(&posting(Source::Greenhouse, "1")).unwrap();
    store.mark_seen(&posting(Source::Greenhouse, "2")).unwrap();
    store.mark_seen(&posting(Source::Mailbox, "9")).unwrap();

    let stats = store.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.by_source[&Source::Greenhouse], 2);
    assert_eq!(stats.by_source[&Source::Mailbox], 1);
    assert!(!stats.by_source.contains_key(&Source::Lever));
}
