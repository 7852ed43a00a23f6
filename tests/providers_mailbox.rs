// tests/providers_mailbox.rs
use std::fs;

use job_radar::ingest::providers::mailbox::{parse_message, MailboxAdapter};
use job_radar::ingest::types::SourceAdapter;
use job_radar::posting::AdapterKind;
use job_radar::UNSPECIFIED;

const HTML_ALERT: &str = include_str!("fixtures/alert_html.eml");
const TEXT_ALERT: &str = include_str!("fixtures/alert_text.eml");
const BASE64_ALERT: &str = include_str!("fixtures/alert_base64.eml");

#[test]
fn html_alert_yields_titled_job_links_once() {
    let out = parse_message(HTML_ALERT);
    let ids: Vec<_> = out.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["mailbox-3812345678", "mailbox-3899999999"]);
    assert_eq!(out[0].title, "Sales Engineer");
    assert_eq!(out[1].title, "Senior Sales Engineer");
    assert_eq!(out[0].attributes["alert"], "\"sales engineer\": 2 new jobs");
}

#[test]
fn text_alert_uses_preceding_lines_for_title_and_byline() {
    let out = parse_message(TEXT_ALERT);
    assert_eq!(out.len(), 2);

    assert_eq!(out[0].id, "mailbox-9f8e7d6c");
    assert_eq!(out[0].title, "Sales Engineer");
    assert_eq!(out[0].company, "Umbrella Corp");
    assert_eq!(out[0].location, "Remote");

    assert_eq!(out[1].id, "mailbox-1a2b3c4d");
    assert_eq!(out[1].title, "Field Sales Engineer");
    assert_eq!(out[1].company, UNSPECIFIED);
}

#[test]
fn base64_html_part_is_decoded() {
    let out = parse_message(BASE64_ALERT);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "mailbox-77");
    assert_eq!(out[0].title, "Sales Engineer");
    assert_eq!(out[0].url, "https://acme.test/jobs/view/77?trk=alert");
}

#[test]
fn single_part_base64_message_is_decoded() {
    let raw = "Subject: alert\r\n\
Content-Type: text/html; charset=UTF-8\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
PGEgaHJlZj0iaHR0cHM6Ly9hY21lLnRlc3Qvam9icy92aWV3Lzc3Ij5TYWxlcyBFbmdpbmVlcjwv\r\n\
YT4=\r\n";
    let out = parse_message(raw);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id, "mailbox-77");
}

#[tokio::test]
async fn maildir_is_read_without_modification() {
    let dir = tempfile::tempdir().unwrap();
    let new = dir.path().join("new");
    let cur = dir.path().join("cur");
    fs::create_dir_all(&new).unwrap();
    fs::create_dir_all(&cur).unwrap();
    fs::write(new.join("1700000000.1.host"), HTML_ALERT).unwrap();
    fs::write(cur.join("1700000001.2.host:2,S"), TEXT_ALERT).unwrap();
    fs::write(new.join(".hidden"), "junk").unwrap();

    let adapter = MailboxAdapter::new(Some(dir.path().to_path_buf()));
    assert_eq!(adapter.kind(), AdapterKind::MailboxParse);
    let out = adapter.fetch().await.unwrap();
    assert_eq!(out.len(), 4);

    // Messages stay where they were.
    assert!(new.join("1700000000.1.host").exists());
    assert!(cur.join("1700000001.2.host:2,S").exists());
}

#[tokio::test]
async fn unconfigured_mailbox_is_empty_and_missing_dir_is_an_error() {
    assert!(MailboxAdapter::new(None).fetch().await.unwrap().is_empty());

    let dir = tempfile::tempdir().unwrap();
    let missing = MailboxAdapter::new(Some(dir.path().join("nope")));
    assert!(missing.fetch().await.is_err());
}
