// tests/aggregation_run.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use job_radar::delivery::{DeliveryConfig, DeliveryController};
use job_radar::error::{DeliveryError, FetchError, RunError};
use job_radar::filter::FilterEngine;
use job_radar::ingest::types::SourceAdapter;
use job_radar::ingest::{collect, Pipeline};
use job_radar::notify::Notifier;
use job_radar::{FilterRules, Posting, SeenStore, Source};

struct MockAdapter {
    source: Source,
    titles: Vec<(&'static str, &'static str)>,
    fail: bool,
}

impl MockAdapter {
    fn ok(source: Source, titles: &[(&'static str, &'static str)]) -> Box<dyn SourceAdapter> {
        Box::new(Self {
            source,
            titles: titles.to_vec(),
            fail: false,
        })
    }

    fn failing(source: Source) -> Box<dyn SourceAdapter> {
        Box::new(Self {
            source,
            titles: vec![],
            fail: true,
        })
    }
}

#[async_trait]
impl SourceAdapter for MockAdapter {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError> {
        if self.fail {
            return Err(FetchError::Status {
                url: "https://down.test".into(),
                status: 503,
            });
        }
        Ok(self
            .titles
            .iter()
            .filter_map(|(id, title)| {
                Posting::new(self.source, id, title, &format!("https://jobs.test/{id}"), Utc::now())
            })
            .collect())
    }

    fn source(&self) -> Source {
        self.source
    }
}

#[derive(Default)]
struct RecordingSink {
    sent: Mutex<Vec<String>>,
    reject: HashSet<String>,
}

#[async_trait]
impl Notifier for RecordingSink {
    async fn send(&self, posting: &Posting) -> Result<(), DeliveryError> {
        if self.reject.contains(&posting.id) {
            return Err(DeliveryError::Rejected {
                sink: "recording",
                status: 400,
            });
        }
        self.sent.lock().unwrap().push(posting.id.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

fn sales_rules() -> FilterEngine {
    FilterEngine::new(&FilterRules {
        roles: vec!["sales engineer".into()],
        exclude: vec!["intern".into()],
        ..Default::default()
    })
}

fn pipeline(
    adapters: Vec<Box<dyn SourceAdapter>>,
    store: Arc<SeenStore>,
    sink: Arc<RecordingSink>,
    max_batch_size: usize,
) -> Pipeline {
    Pipeline::new(
        adapters,
        sales_rules(),
        store,
        DeliveryController::new(DeliveryConfig {
            max_batch_size,
            send_delay_ms: 0,
        }),
        sink,
    )
}

#[tokio::test]
async fn failing_adapter_is_excluded_without_aborting_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SeenStore::open(dir.path().join("seen.json")));
    let sink = Arc::new(RecordingSink::default());
    let p = pipeline(
        vec![
            MockAdapter::ok(Source::Greenhouse, &[("a1", "Sales Engineer"), ("a2", "Designer")]),
            MockAdapter::failing(Source::Lever),
            MockAdapter::ok(Source::Rss, &[("c1", "Senior Sales Engineer")]),
        ],
        store,
        sink.clone(),
        10,
    );

    let report = p.run_cycle().await.expect("cycle should survive one failed source");
    assert_eq!(report.fetched, 3);
    assert_eq!(report.failed_sources.len(), 1);
    assert_eq!(report.failed_sources[0].source, "lever");
    assert_eq!(report.filtered_out, 1);

    let mut sent = sink.sent.lock().unwrap().clone();
    sent.sort();
    assert_eq!(sent, vec!["greenhouse-a1".to_string(), "rss-c1".to_string()]);
}

#[tokio::test]
async fn collect_keeps_successful_sources() {
    let adapters = vec![
        MockAdapter::ok(Source::Greenhouse, &[("1", "Sales Engineer")]),
        MockAdapter::failing(Source::Careers),
        MockAdapter::ok(Source::Mailbox, &[("2", "Sales Engineer")]),
    ];
    let (batch, failures) = collect(&adapters).await;
    let ids: HashSet<_> = batch.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, HashSet::from(["greenhouse-1", "mailbox-2"]));
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].source, "careers");
}

#[tokio::test]
async fn second_cycle_does_not_redeliver() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SeenStore::open(dir.path().join("seen.json")));
    let sink = Arc::new(RecordingSink::default());
    let p = pipeline(
        vec![MockAdapter::ok(Source::Lever, &[("x", "Sales Engineer"), ("y", "Sales Engineer II")])],
        store.clone(),
        sink.clone(),
        10,
    );

    let first = p.run_cycle().await.unwrap();
    assert_eq!(first.new, 2);
    let second = p.run_cycle().await.unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(second.already_seen, 2);
    assert_eq!(sink.sent.lock().unwrap().len(), 2);
    assert!(store.has_seen("lever-x"));
}

#[tokio::test]
async fn batch_cap_sends_two_and_never_retries_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SeenStore::open(dir.path().join("seen.json")));
    let sink = Arc::new(RecordingSink::default());
    let five = [
        ("1", "Sales Engineer"),
        ("2", "Sales Engineer"),
        ("3", "Sales Engineer"),
        ("4", "Sales Engineer"),
        ("5", "Sales Engineer"),
    ];
    let p = pipeline(vec![MockAdapter::ok(Source::Rss, &five)], store.clone(), sink.clone(), 2);

    let first = p.run_cycle().await.unwrap();
    assert_eq!(first.new, 5);
    assert_eq!(first.delivery.sent.len(), 2);
    assert_eq!(first.delivery.deferred.len(), 3);
    assert_eq!(store.len(), 5, "all five are claimed before delivery");

    let second = p.run_cycle().await.unwrap();
    assert_eq!(second.new, 0);
    assert_eq!(sink.sent.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn failed_send_is_still_marked_seen() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SeenStore::open(dir.path().join("seen.json")));
    let sink = Arc::new(RecordingSink {
        reject: HashSet::from(["greenhouse-bad".to_string()]),
        ..Default::default()
    });
    let p = pipeline(
        vec![MockAdapter::ok(
            Source::Greenhouse,
            &[("bad", "Sales Engineer"), ("good", "Sales Engineer")],
        )],
        store.clone(),
        sink.clone(),
        10,
    );

    let report = p.run_cycle().await.unwrap();
    assert_eq!(report.delivery.failed.len(), 1);
    assert_eq!(report.delivery.sent, vec!["greenhouse-good".to_string()]);
    assert!(store.has_seen("greenhouse-bad"));

    let again = p.run_cycle().await.unwrap();
    assert_eq!(again.new, 0);
}

#[tokio::test]
async fn duplicate_ids_within_one_batch_are_sent_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SeenStore::open(dir.path().join("seen.json")));
    let sink = Arc::new(RecordingSink::default());
    let p = pipeline(
        vec![
            MockAdapter::ok(Source::Greenhouse, &[("7", "Sales Engineer")]),
            MockAdapter::ok(Source::Greenhouse, &[("7", "Sales Engineer (updated)")]),
        ],
        store,
        sink.clone(),
        10,
    );

    let report = p.run_cycle().await.unwrap();
    assert_eq!(report.new, 1);
    assert_eq!(report.already_seen, 1);
    assert_eq!(*sink.sent.lock().unwrap(), vec!["greenhouse-7".to_string()]);
}

#[tokio::test]
async fn unwritable_store_aborts_the_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("seen.json");
    let store = Arc::new(SeenStore::open(&path));
    // Block the rename target so every persist fails.
    std::fs::create_dir_all(path.join("blocker")).unwrap();
    let sink = Arc::new(RecordingSink::default());
    let p = pipeline(
        vec![MockAdapter::ok(Source::Lever, &[("1", "Sales Engineer")])],
        store.clone(),
        sink.clone(),
        10,
    );

    let err = p.run_cycle().await.unwrap_err();
    assert!(matches!(err, RunError::Store { claimed: 0, .. }));
    assert!(sink.sent.lock().unwrap().is_empty());
    assert!(!store.has_seen("lever-1"), "unpersisted marks must not linger");
}
