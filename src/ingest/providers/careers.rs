// src/ingest/providers/careers.rs
//! Company careers pages scraped with per-page CSS selectors.

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use super::{fetch_targets, stable_hash, Transport};
use crate::error::FetchError;
use crate::ingest::types::SourceAdapter;
use crate::posting::{Posting, Source};

fn default_link() -> String {
    "a".to_string()
}

/// One scraped page. `item` selects a posting block; the other selectors are
/// evaluated inside that block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareersPage {
    pub name: String,
    pub url: String,
    pub item: String,
    pub title: String,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    /// attribute name -> selector, e.g. `salary = ".comp"`.
    #[serde(default)]
    pub extras: BTreeMap<String, String>,
}

impl fmt::Display for CareersPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.url)
    }
}

fn selector(page: &str, css: &str) -> Result<Selector, FetchError> {
    Selector::parse(css)
        .map_err(|e| FetchError::parse(format!("selector `{css}` of {page}"), format!("{e:?}")))
}

fn text_of(scope: ElementRef<'_>, sel: &Selector) -> Option<String> {
    scope
        .select(sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

struct Compiled {
    item: Selector,
    title: Selector,
    link: Selector,
    location: Option<Selector>,
    extras: Vec<(String, Selector)>,
}

impl Compiled {
    fn new(page: &CareersPage) -> Result<Self, FetchError> {
        let name = page.name.as_str();
        Ok(Self {
            item: selector(name, &page.item)?,
            title: selector(name, &page.title)?,
            link: selector(name, &page.link)?,
            location: page
                .location
                .as_deref()
                .map(|css| selector(name, css))
                .transpose()?,
            extras: page
                .extras
                .iter()
                .map(|(k, css)| selector(name, css).map(|s| (k.clone(), s)))
                .collect::<Result<_, _>>()?,
        })
    }
}

/// Parse a fetched careers page. Entries whose link cannot be resolved to an
/// absolute URL are dropped.
pub fn parse_page(page: &CareersPage, html: &str) -> Result<Vec<Posting>, FetchError> {
    let base = Url::parse(&page.url)
        .map_err(|e| FetchError::parse(format!("url of {}", page.name), e))?;
    let sel = Compiled::new(page)?;
    let doc = Html::parse_document(html);
    let now = Utc::now();
    let page_slug = slug(&page.name);
    let company = page.company.as_deref().unwrap_or(&page.name);

    let mut out = Vec::new();
    for item in doc.select(&sel.item) {
        let Some(title) = text_of(item, &sel.title) else {
            continue;
        };
        let href = item
            .select(&sel.link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .or_else(|| item.value().attr("href"));
        let Some(abs) = href.and_then(|h| base.join(h.trim()).ok()) else {
            tracing::debug!(page = %page.name, %title, "careers entry without resolvable link");
            continue;
        };
        let abs = abs.to_string();
        let local_id = format!("{page_slug}-{}", stable_hash(&abs));

        let Some(mut p) = Posting::new(Source::Careers, &local_id, &title, &abs, now) else {
            continue;
        };
        p = p
            .with_company(Some(company))
            .with_location(sel.location.as_ref().and_then(|s| text_of(item, s)).as_deref());
        for (key, s) in &sel.extras {
            p = p.with_attribute(key, text_of(item, s).as_deref());
        }
        out.push(p);
    }
    Ok(out)
}

pub struct CareersPageAdapter {
    pages: Vec<CareersPage>,
    transport: Transport,
}

impl CareersPageAdapter {
    pub fn new(pages: Vec<CareersPage>) -> Self {
        Self::with_transport(pages, Transport::http())
    }

    pub fn with_transport(pages: Vec<CareersPage>, transport: Transport) -> Self {
        Self { pages, transport }
    }

    async fn fetch_page(&self, page: &CareersPage) -> Result<Vec<Posting>, FetchError> {
        let body = self.transport.get_text(&page.url).await?;
        parse_page(page, &body)
    }
}

#[async_trait]
impl SourceAdapter for CareersPageAdapter {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError> {
        fetch_targets(self.name(), &self.pages, |p| self.fetch_page(p)).await
    }

    fn source(&self) -> Source {
        Source::Careers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slug("  Acme, Inc. "), "acme-inc");
        assert_eq!(slug("Initech"), "initech");
    }
}
