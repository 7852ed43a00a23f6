use async_trait::async_trait;
use reqwest::Client;

use super::{attribute_lines, byline, Notifier};
use crate::error::DeliveryError;
use crate::posting::Posting;

const SINK: &str = "slack";

pub struct SlackNotifier {
    webhook_url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn from_env() -> Option<Self> {
        std::env::var("SLACK_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .map(Self::new)
    }

    pub fn new(url: String) -> Self {
        Self {
            webhook_url: url,
            client: Client::new(),
        }
    }

    fn text(p: &Posting) -> String {
        let mut text = format!("*<{}|{}>*", p.url, p.title);
        let by = byline(p);
        if !by.is_empty() {
            text.push('\n');
            text.push_str(&by);
        }
        for line in attribute_lines(p) {
            text.push_str("\n• ");
            text.push_str(&line);
        }
        text
    }
}

#[async_trait]
impl Notifier for SlackNotifier {
    async fn send(&self, posting: &Posting) -> Result<(), DeliveryError> {
        let body = serde_json::json!({ "text": Self::text(posting) });

        let rsp = self
            .client
            .post(&self.webhook_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport {
                sink: SINK,
                reason: e.to_string(),
            })?;
        if !rsp.status().is_success() {
            return Err(DeliveryError::Rejected {
                sink: SINK,
                status: rsp.status().as_u16(),
            });
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        SINK
    }
}
