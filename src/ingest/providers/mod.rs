// src/ingest/providers/mod.rs
pub mod careers;
pub mod greenhouse;
pub mod lever;
pub mod mailbox;
pub mod rss;

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use sha2::{Digest, Sha256};

use crate::error::FetchError;
use crate::posting::Posting;

const USER_AGENT: &str = concat!("job-radar/", env!("CARGO_PKG_VERSION"));

/// Where adapters get their response bodies from.
#[derive(Clone)]
pub enum Transport {
    Http(reqwest::Client),
    /// Canned bodies keyed by URL. Unknown URLs fail like a 404.
    Fixture(HashMap<String, String>),
}

impl Transport {
    pub fn http() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Transport::Http(client)
    }

    pub fn fixtures<I, K, V>(bodies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Transport::Fixture(
            bodies
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        match self {
            Transport::Fixture(bodies) => bodies
                .get(url)
                .cloned()
                .ok_or_else(|| FetchError::MissingFixture(url.to_string())),
            Transport::Http(client) => {
                let resp = client
                    .get(url)
                    .send()
                    .await
                    .map_err(|source| FetchError::Http {
                        url: url.to_string(),
                        source,
                    })?;
                let status = resp.status();
                if !status.is_success() {
                    return Err(FetchError::Status {
                        url: url.to_string(),
                        status: status.as_u16(),
                    });
                }
                resp.text().await.map_err(|source| FetchError::Http {
                    url: url.to_string(),
                    source,
                })
            }
        }
    }
}

/// Short, stable hex digest used as a local id when a source has no id of its own.
pub fn stable_hash(input: &str) -> String {
    let digest = Sha256::digest(input.trim().as_bytes());
    let mut out = String::with_capacity(16);
    for b in digest.iter().take(8) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Run `fetch_one` for every target concurrently. Failed targets are logged and
/// skipped; the adapter only fails when it had targets and all of them failed.
pub(crate) async fn fetch_targets<'a, T, F, Fut>(
    adapter: &'static str,
    targets: &'a [T],
    fetch_one: F,
) -> Result<Vec<Posting>, FetchError>
where
    T: std::fmt::Display,
    F: Fn(&'a T) -> Fut,
    Fut: Future<Output = Result<Vec<Posting>, FetchError>>,
{
    if targets.is_empty() {
        return Ok(Vec::new());
    }
    let results = futures::future::join_all(targets.iter().map(&fetch_one)).await;

    let mut out = Vec::new();
    let mut failed = 0usize;
    for (target, res) in targets.iter().zip(results) {
        match res {
            Ok(mut postings) => {
                counter!("radar_fetched_total", "source" => adapter).increment(postings.len() as u64);
                out.append(&mut postings);
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(error = %e, source = adapter, %target, stage = "fetch", "target failed");
                counter!("radar_target_errors_total", "source" => adapter).increment(1);
            }
        }
    }
    if failed == targets.len() {
        return Err(FetchError::AllTargetsFailed { adapter, failed });
    }
    Ok(out)
}
