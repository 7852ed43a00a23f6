// src/ingest/providers/lever.rs
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use super::{fetch_targets, Transport};
use crate::error::FetchError;
use crate::ingest::types::SourceAdapter;
use crate::posting::{Posting, Source};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeverPosting {
    id: String,
    text: Option<String>,
    hosted_url: Option<String>,
    #[serde(default)]
    categories: Categories,
    salary_range: Option<SalaryRange>,
}

#[derive(Debug, Default, Deserialize)]
struct Categories {
    location: Option<String>,
    team: Option<String>,
    department: Option<String>,
    commitment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SalaryRange {
    min: Option<f64>,
    max: Option<f64>,
    currency: Option<String>,
}

impl SalaryRange {
    fn render(&self) -> Option<String> {
        let (min, max) = (self.min?, self.max?);
        let currency = self.currency.as_deref().unwrap_or_default();
        Some(format!("{min:.0}-{max:.0} {currency}").trim().to_string())
    }
}

pub fn postings_url(company: &str) -> String {
    format!("https://api.lever.co/v0/postings/{company}?mode=json")
}

/// Lever postings API. One target per company slug.
pub struct LeverAdapter {
    companies: Vec<String>,
    transport: Transport,
}

impl LeverAdapter {
    pub fn new(companies: Vec<String>) -> Self {
        Self::with_transport(companies, Transport::http())
    }

    pub fn with_transport(companies: Vec<String>, transport: Transport) -> Self {
        Self {
            companies,
            transport,
        }
    }

    pub fn parse_postings(company: &str, body: &str) -> Result<Vec<Posting>, FetchError> {
        let parsed: Vec<LeverPosting> = serde_json::from_str(body)
            .map_err(|e| FetchError::parse(format!("lever postings {company}"), e))?;
        let now = Utc::now();

        let out = parsed
            .into_iter()
            .filter_map(|lp| {
                let salary = lp.salary_range.as_ref().and_then(SalaryRange::render);
                let c = &lp.categories;
                let p = Posting::new(
                    Source::Lever,
                    &lp.id,
                    lp.text.as_deref()?,
                    lp.hosted_url.as_deref()?,
                    now,
                )?
                .with_company(Some(company))
                .with_location(c.location.as_deref())
                .with_attribute("team", c.team.as_deref())
                .with_attribute("department", c.department.as_deref())
                .with_attribute("commitment", c.commitment.as_deref())
                .with_attribute("salary", salary.as_deref());
                Some(p)
            })
            .collect();
        Ok(out)
    }

    async fn fetch_company(&self, company: &String) -> Result<Vec<Posting>, FetchError> {
        let body = self.transport.get_text(&postings_url(company)).await?;
        Self::parse_postings(company, &body)
    }
}

#[async_trait]
impl SourceAdapter for LeverAdapter {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError> {
        fetch_targets(self.name(), &self.companies, |c| self.fetch_company(c)).await
    }

    fn source(&self) -> Source {
        Source::Lever
    }
}
