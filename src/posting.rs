// src/posting.rs
//! Canonical posting model every source adapter normalizes into.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Stand-in for company/location when the source does not provide one.
pub const UNSPECIFIED: &str = "unspecified";

const MAX_FIELD_CHARS: usize = 300;

/// Origin of a posting. The string form is the id prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Greenhouse,
    Lever,
    Careers,
    Rss,
    Mailbox,
}

/// How an adapter reaches its source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdapterKind {
    ApiFetch,
    MarkupScrape,
    MailboxParse,
}

impl Source {
    pub const ALL: [Source; 5] = [
        Source::Greenhouse,
        Source::Lever,
        Source::Careers,
        Source::Rss,
        Source::Mailbox,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Greenhouse => "greenhouse",
            Source::Lever => "lever",
            Source::Careers => "careers",
            Source::Rss => "rss",
            Source::Mailbox => "mailbox",
        }
    }

    pub fn kind(&self) -> AdapterKind {
        match self {
            Source::Greenhouse | Source::Lever => AdapterKind::ApiFetch,
            Source::Careers | Source::Rss => AdapterKind::MarkupScrape,
            Source::Mailbox => AdapterKind::MailboxParse,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Source::ALL
            .into_iter()
            .find(|src| src.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown source `{s}`"))
    }
}

/// One normalized job opportunity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    /// `<source>-<source-local-id>`, stable across fetches.
    pub id: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub url: String,
    pub source: Source,
    /// Source-specific extras (team, department, salary, ...). Never required downstream.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    pub observed_at: DateTime<Utc>,
}

impl Posting {
    /// Build a posting, or `None` when the title normalizes to nothing or the
    /// url is not absolute.
    pub fn new(
        source: Source,
        local_id: &str,
        title: &str,
        url: &str,
        observed_at: DateTime<Utc>,
    ) -> Option<Self> {
        let title = normalize_text(title);
        let url = url.trim();
        let local_id = local_id.trim();
        if title.is_empty() || local_id.is_empty() || Url::parse(url).is_err() {
            return None;
        }
        Some(Self {
            id: format!("{}-{}", source.as_str(), local_id),
            title,
            company: UNSPECIFIED.to_string(),
            location: UNSPECIFIED.to_string(),
            url: url.to_string(),
            source,
            attributes: BTreeMap::new(),
            observed_at,
        })
    }

    pub fn with_company(mut self, company: Option<&str>) -> Self {
        if let Some(c) = company.map(normalize_text).filter(|c| !c.is_empty()) {
            self.company = c;
        }
        self
    }

    pub fn with_location(mut self, location: Option<&str>) -> Self {
        if let Some(l) = location.map(normalize_text).filter(|l| !l.is_empty()) {
            self.location = l;
        }
        self
    }

    /// Blank values are not recorded.
    pub fn with_attribute(mut self, key: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(normalize_text).filter(|v| !v.is_empty()) {
            self.attributes.insert(key.to_string(), v);
        }
        self
    }
}

/// Normalize scraped text: decode entities, strip tags, unify quotes, collapse whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[a-z][^>]*>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace('\u{00A0}', " ");

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_FIELD_CHARS {
        out = out.chars().take(MAX_FIELD_CHARS).collect();
    }
    out
}
