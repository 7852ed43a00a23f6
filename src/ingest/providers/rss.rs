// src/ingest/providers/rss.rs
use async_trait::async_trait;
use chrono::Utc;
use quick_xml::de::from_str;
use serde::Deserialize;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::{OffsetDateTime, UtcOffset};

use super::{fetch_targets, stable_hash, Transport};
use crate::error::FetchError;
use crate::ingest::types::SourceAdapter;
use crate::posting::{Posting, Source};

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<Guid>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: Option<String>,
}

fn rfc2822_to_rfc3339(ts: &str) -> Option<String> {
    OffsetDateTime::parse(ts.trim(), &Rfc2822)
        .ok()
        .map(|dt| dt.to_offset(UtcOffset::UTC))
        .and_then(|dt| dt.format(&Rfc3339).ok())
}

/// Feeds commonly title items "Company: Role".
fn split_company(title: &str) -> (Option<&str>, &str) {
    match title.split_once(": ") {
        Some((company, role)) if !company.trim().is_empty() && !role.trim().is_empty() => {
            (Some(company), role)
        }
        _ => (None, title),
    }
}

/// Job feeds in RSS 2.0.
pub struct RssFeedAdapter {
    feeds: Vec<String>,
    transport: Transport,
}

impl RssFeedAdapter {
    pub fn new(feeds: Vec<String>) -> Self {
        Self::with_transport(feeds, Transport::http())
    }

    pub fn with_transport(feeds: Vec<String>, transport: Transport) -> Self {
        Self { feeds, transport }
    }

    pub fn parse_feed(feed: &str, xml: &str) -> Result<Vec<Posting>, FetchError> {
        let xml_clean = scrub_html_entities_for_xml(xml);
        let rss: Rss =
            from_str(&xml_clean).map_err(|e| FetchError::parse(format!("rss {feed}"), e))?;
        let now = Utc::now();

        let mut out = Vec::with_capacity(rss.channel.item.len());
        for it in rss.channel.item {
            let (Some(title), Some(link)) = (it.title.as_deref(), it.link.as_deref()) else {
                continue;
            };
            let key = it
                .guid
                .as_ref()
                .and_then(|g| g.value.as_deref())
                .filter(|g| !g.trim().is_empty())
                .unwrap_or(link);
            let (company, role) = split_company(title);
            let published = it.pub_date.as_deref().and_then(rfc2822_to_rfc3339);

            if let Some(p) = Posting::new(Source::Rss, &stable_hash(key), role, link, now) {
                out.push(
                    p.with_company(company)
                        .with_location(it.region.as_deref())
                        .with_attribute("published", published.as_deref()),
                );
            }
        }
        Ok(out)
    }

    async fn fetch_feed(&self, feed: &String) -> Result<Vec<Posting>, FetchError> {
        let body = self.transport.get_text(feed).await?;
        Self::parse_feed(feed, &body)
    }
}

#[async_trait]
impl SourceAdapter for RssFeedAdapter {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError> {
        fetch_targets(self.name(), &self.feeds, |f| self.fetch_feed(f)).await
    }

    fn source(&self) -> Source {
        Source::Rss
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
