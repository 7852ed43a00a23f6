// src/ingest/providers/greenhouse.rs
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{fetch_targets, Transport};
use crate::error::FetchError;
use crate::ingest::types::SourceAdapter;
use crate::posting::{Posting, Source};

#[derive(Debug, Deserialize)]
struct Board {
    #[serde(default)]
    jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
struct Job {
    id: u64,
    title: Option<String>,
    absolute_url: Option<String>,
    location: Option<Named>,
    #[serde(default)]
    departments: Vec<Named>,
    #[serde(default)]
    offices: Vec<Named>,
}

#[derive(Debug, Deserialize)]
struct Named {
    name: Option<String>,
}

pub fn board_url(board: &str) -> String {
    format!("https://boards-api.greenhouse.io/v1/boards/{board}/jobs")
}

/// Greenhouse job board API. One target per board token.
pub struct GreenhouseAdapter {
    boards: Vec<String>,
    transport: Transport,
}

impl GreenhouseAdapter {
    pub fn new(boards: Vec<String>) -> Self {
        Self::with_transport(boards, Transport::http())
    }

    pub fn with_transport(boards: Vec<String>, transport: Transport) -> Self {
        Self { boards, transport }
    }

    pub fn parse_board(board: &str, body: &str) -> Result<Vec<Posting>, FetchError> {
        let parsed: Board = serde_json::from_str(body)
            .map_err(|e| FetchError::parse(format!("greenhouse board {board}"), e))?;
        let now = Utc::now();

        let out = parsed
            .jobs
            .into_iter()
            .filter_map(|job| {
                let title = job.title.as_deref()?;
                let url = job.absolute_url.as_deref()?;
                let p = Posting::new(Source::Greenhouse, &job.id.to_string(), title, url, now)?
                    .with_company(Some(board))
                    .with_location(job.location.as_ref().and_then(|l| l.name.as_deref()))
                    .with_attribute(
                        "department",
                        job.departments.first().and_then(|d| d.name.as_deref()),
                    )
                    .with_attribute("office", job.offices.first().and_then(|o| o.name.as_deref()));
                Some(p)
            })
            .collect();
        Ok(out)
    }

    async fn fetch_board(&self, board: &String) -> Result<Vec<Posting>, FetchError> {
        let body = self.transport.get_text(&board_url(board)).await?;
        Self::parse_board(board, &body)
    }
}

#[async_trait]
impl SourceAdapter for GreenhouseAdapter {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError> {
        fetch_targets(self.name(), &self.boards, |b| self.fetch_board(b)).await
    }

    fn source(&self) -> Source {
        Source::Greenhouse
    }
}
