use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use super::{attribute_lines, byline, Notifier};
use crate::error::DeliveryError;
use crate::posting::Posting;

const SINK: &str = "discord";

#[derive(Clone)]
pub struct DiscordNotifier {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl DiscordNotifier {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(5),
            max_retries: 3,
        }
    }

    pub fn from_env() -> Option<Self> {
        std::env::var("DISCORD_WEBHOOK_URL")
            .ok()
            .filter(|u| !u.trim().is_empty())
            .map(Self::new)
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    fn payload(p: &Posting) -> DiscordWebhookPayload {
        let mut description = byline(p);
        for line in attribute_lines(p) {
            if !description.is_empty() {
                description.push('\n');
            }
            description.push_str(&line);
        }
        DiscordWebhookPayload {
            content: None,
            embeds: vec![DiscordEmbed {
                title: p.title.clone(),
                url: p.url.clone(),
                description,
                footer: DiscordFooter {
                    text: p.source.to_string(),
                },
            }],
        }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    /// Transport-level retries with exponential backoff on request errors,
    /// 429 and 5xx. Other statuses fail straight away.
    async fn send(&self, posting: &Posting) -> Result<(), DeliveryError> {
        let payload = Self::payload(posting);

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            let res = self
                .client
                .post(&self.webhook)
                .timeout(self.timeout)
                .json(&payload)
                .send()
                .await;

            let err = match res {
                Ok(rsp) if rsp.status().is_success() => return Ok(()),
                Ok(rsp) => {
                    let status = rsp.status();
                    if !(status.as_u16() == 429 || status.is_server_error()) {
                        return Err(DeliveryError::Rejected {
                            sink: SINK,
                            status: status.as_u16(),
                        });
                    }
                    DeliveryError::Rejected {
                        sink: SINK,
                        status: status.as_u16(),
                    }
                }
                Err(e) => DeliveryError::Transport {
                    sink: SINK,
                    reason: e.to_string(),
                },
            };

            if attempt >= self.max_retries {
                return Err(err);
            }
            tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
        }
    }

    fn name(&self) -> &'static str {
        SINK
    }
}

#[derive(Serialize)]
struct DiscordFooter {
    text: String,
}

#[derive(Serialize)]
struct DiscordEmbed {
    title: String,
    url: String,
    description: String,
    footer: DiscordFooter,
}

#[derive(Serialize)]
struct DiscordWebhookPayload {
    content: Option<String>,
    embeds: Vec<DiscordEmbed>,
}
