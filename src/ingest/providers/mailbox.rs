// src/ingest/providers/mailbox.rs
//! Job-alert emails read from a local maildir. Fetching mail into that
//! directory is left to an external agent (fetchmail, mbsync, ...); this
//! adapter only reads, it never moves or flags messages.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::stable_hash;
use crate::error::FetchError;
use crate::ingest::types::SourceAdapter;
use crate::posting::{Posting, Source};

fn job_path_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?i)/(jobs?|careers?|positions?|openings?|viewjob)(/|$)").unwrap())
}

fn job_id_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)(?:/jobs?/view/|currentJobId=|[?&]jk=)([0-9a-z]+)").unwrap()
    })
}

fn url_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s<>"]+"#).unwrap())
}

/// Job links are recognised by path (or a board job-id parameter), never by host.
fn is_job_link(link: &str) -> bool {
    Url::parse(link).is_ok_and(|u| {
        matches!(u.scheme(), "http" | "https")
            && (job_path_re().is_match(u.path()) || job_id_re().is_match(link))
    })
}

/// Local id: the board's own job id when the link carries one, else a hash
/// of the link without its tracking query.
fn local_id_for(link: &str) -> String {
    if let Some(id) = job_id_re().captures(link).and_then(|c| c.get(1)) {
        return id.as_str().to_ascii_lowercase();
    }
    let bare = link.split(['?', '#']).next().unwrap_or(link);
    stable_hash(bare)
}

struct Part {
    content_type: String,
    body: String,
}

fn split_head_body(raw: &str) -> (&str, &str) {
    for sep in ["\r\n\r\n", "\n\n"] {
        if let Some(i) = raw.find(sep) {
            return (&raw[..i], &raw[i + sep.len()..]);
        }
    }
    (raw, "")
}

/// Unfolded `(lowercase name, value)` pairs.
fn parse_headers(head: &str) -> Vec<(String, String)> {
    let mut out: Vec<(String, String)> = Vec::new();
    for line in head.lines() {
        if line.starts_with([' ', '\t']) {
            if let Some((_, v)) = out.last_mut() {
                v.push(' ');
                v.push_str(line.trim());
            }
            continue;
        }
        if let Some((k, v)) = line.split_once(':') {
            out.push((k.trim().to_ascii_lowercase(), v.trim().to_string()));
        }
    }
    out
}

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
}

fn boundary_of(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|param| {
        let (k, v) = param.trim().split_once('=')?;
        k.eq_ignore_ascii_case("boundary")
            .then(|| v.trim().trim_matches('"').to_string())
    })
}

pub fn decode_quoted_printable(s: &str) -> String {
    let joined = s.replace("=\r\n", "").replace("=\n", "");
    let bytes = joined.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'=' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Flatten a message into its leaf text parts, decoded.
fn leaf_parts(raw: &str, depth: usize, out: &mut Vec<Part>) {
    let (head, body) = split_head_body(raw);
    let headers = parse_headers(head);
    let content_type = header(&headers, "content-type")
        .unwrap_or("text/plain")
        .to_string();
    let ct_lower = content_type.to_ascii_lowercase();

    if ct_lower.starts_with("multipart/") && depth < 4 {
        if let Some(boundary) = boundary_of(&content_type) {
            let delim = format!("--{boundary}");
            for chunk in body.split(delim.as_str()).skip(1) {
                if chunk.starts_with("--") {
                    break;
                }
                leaf_parts(chunk.trim_start_matches(['\r', '\n']), depth + 1, out);
            }
            return;
        }
    }

    let encoding = header(&headers, "content-transfer-encoding")
        .unwrap_or("7bit")
        .to_ascii_lowercase();
    let body = match encoding.as_str() {
        "quoted-printable" => decode_quoted_printable(body),
        "base64" => {
            let compact: String = body.split_whitespace().collect();
            match STANDARD.decode(compact) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
                Err(e) => {
                    tracing::warn!(error = %e, content_type = %ct_lower, source = "mailbox", "undecodable base64 mail part");
                    return;
                }
            }
        }
        _ => body.to_string(),
    };
    out.push(Part {
        content_type: ct_lower,
        body,
    });
}

fn postings_from_html(html: &str, subject: Option<&str>) -> Vec<Posting> {
    let doc = Html::parse_document(html);
    let Ok(anchors) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for a in doc.select(&anchors) {
        let Some(href) = a.value().attr("href").map(str::trim) else {
            continue;
        };
        if !is_job_link(href) {
            continue;
        }
        let text = a.text().collect::<Vec<_>>().join(" ");
        let local_id = local_id_for(href);
        if seen.contains(&local_id) {
            continue;
        }
        // Image-only anchors come first in many alert layouts; wait for the titled one.
        if let Some(p) = Posting::new(Source::Mailbox, &local_id, &text, href, now) {
            seen.insert(local_id);
            out.push(p.with_attribute("alert", subject));
        }
    }
    out
}

fn postings_from_text(text: &str, subject: Option<&str>) -> Vec<Posting> {
    let now = Utc::now();
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    // Non-empty, non-URL lines since the last URL.
    let mut block: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        let Some(m) = url_re().find(line) else {
            block.push(line);
            continue;
        };
        let link = m.as_str().trim_end_matches(['.', ',', ')', '>']);
        let context = std::mem::take(&mut block);
        if !is_job_link(link) {
            continue;
        }
        let local_id = local_id_for(link);
        if seen.contains(&local_id) {
            continue;
        }
        // Block layout: title, then optionally "Company · Location".
        let tail = &context[context.len().saturating_sub(2)..];
        let (title, meta) = match tail {
            [title, meta] if meta.contains(" · ") => (*title, Some(*meta)),
            [.., title] => (*title, None),
            [] => continue,
        };
        let (company, location) = match meta.and_then(|m| m.split_once(" · ")) {
            Some((c, l)) => (Some(c), Some(l)),
            None => (None, None),
        };
        if let Some(p) = Posting::new(Source::Mailbox, &local_id, title, link, now) {
            seen.insert(local_id);
            out.push(
                p.with_company(company)
                    .with_location(location)
                    .with_attribute("alert", subject),
            );
        }
    }
    out
}

/// Extract job postings from one raw RFC 822 message. HTML parts win over
/// plain text when both are present.
pub fn parse_message(raw: &str) -> Vec<Posting> {
    let (head, _) = split_head_body(raw);
    let headers = parse_headers(head);
    let subject = header(&headers, "subject");

    let mut parts = Vec::new();
    leaf_parts(raw, 0, &mut parts);

    if let Some(html) = parts.iter().find(|p| p.content_type.starts_with("text/html")) {
        let found = postings_from_html(&html.body, subject);
        if !found.is_empty() {
            return found;
        }
    }
    parts
        .iter()
        .filter(|p| p.content_type.starts_with("text/plain"))
        .flat_map(|p| postings_from_text(&p.body, subject))
        .collect()
}

pub struct MailboxAdapter {
    dir: Option<PathBuf>,
}

impl MailboxAdapter {
    /// `None` means no mailbox configured; fetch yields nothing.
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    async fn message_files(dir: &Path) -> Result<Vec<PathBuf>, FetchError> {
        let io_err = |source| FetchError::Io {
            path: dir.to_path_buf(),
            source,
        };
        let mut roots: Vec<PathBuf> = ["new", "cur"]
            .iter()
            .map(|sub| dir.join(sub))
            .filter(|p| p.is_dir())
            .collect();
        if roots.is_empty() {
            roots.push(dir.to_path_buf());
        }

        let mut files = Vec::new();
        for root in roots {
            let mut entries = tokio::fs::read_dir(&root).await.map_err(io_err)?;
            while let Some(entry) = entries.next_entry().await.map_err(io_err)? {
                let path = entry.path();
                let hidden = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with('.'));
                if !hidden && path.is_file() {
                    files.push(path);
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl SourceAdapter for MailboxAdapter {
    async fn fetch(&self) -> Result<Vec<Posting>, FetchError> {
        let Some(dir) = &self.dir else {
            return Ok(Vec::new());
        };
        let mut out = Vec::new();
        for path in Self::message_files(dir).await? {
            match tokio::fs::read(&path).await {
                Ok(bytes) => {
                    let raw = String::from_utf8_lossy(&bytes);
                    out.extend(parse_message(&raw));
                }
                Err(e) => {
                    tracing::warn!(error = %e, path = %path.display(), source = "mailbox", "unreadable message");
                }
            }
        }
        Ok(out)
    }

    fn source(&self) -> Source {
        Source::Mailbox
    }
}
