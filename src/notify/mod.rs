// src/notify/mod.rs
pub mod discord;
pub mod slack;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::DeliveryError;
use crate::posting::{Posting, UNSPECIFIED};

/// Downstream sink for approved postings.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, posting: &Posting) -> Result<(), DeliveryError>;
    fn name(&self) -> &'static str;
}

/// Pick the sink from env: Discord, then Slack, else log-only.
pub fn notifier_from_env() -> Arc<dyn Notifier> {
    if let Some(d) = discord::DiscordNotifier::from_env() {
        return Arc::new(d);
    }
    if let Some(s) = slack::SlackNotifier::from_env() {
        return Arc::new(s);
    }
    tracing::warn!("no DISCORD_WEBHOOK_URL or SLACK_WEBHOOK_URL; postings will only be logged");
    Arc::new(DryRunNotifier)
}

/// Logs postings instead of sending them.
pub struct DryRunNotifier;

#[async_trait]
impl Notifier for DryRunNotifier {
    async fn send(&self, posting: &Posting) -> Result<(), DeliveryError> {
        tracing::info!(
            target: "delivery",
            posting_id = %posting.id,
            title = %posting.title,
            url = %posting.url,
            "dry-run delivery"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "dry-run"
    }
}

/// "Company · Location" with unspecified parts left out.
pub(crate) fn byline(p: &Posting) -> String {
    [p.company.as_str(), p.location.as_str()]
        .into_iter()
        .filter(|s| *s != UNSPECIFIED)
        .collect::<Vec<_>>()
        .join(" · ")
}

/// Attributes rendered as "key: value" lines.
pub(crate) fn attribute_lines(p: &Posting) -> Vec<String> {
    p.attributes
        .iter()
        .map(|(k, v)| format!("{k}: {v}"))
        .collect()
}
