use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::RunSummary;
use crate::templates::TemplateId;

/// Payload describing a finished run, delivered best-effort
#[derive(Debug, Clone, Serialize)]
pub struct RunNotification {
    pub templates: Vec<TemplateId>,
    pub max_posts: usize,
    pub total_posters: usize,
    pub summary: RunSummary,
}

impl From<&RunSummary> for RunNotification {
    fn from(summary: &RunSummary) -> Self {
        Self {
            templates: summary.templates.clone(),
            max_posts: summary.max_posts,
            total_posters: summary.total_posters,
            summary: summary.clone(),
        }
    }
}

impl RunNotification {
    /// Human-readable digest used for chat webhooks.
    pub fn text(&self) -> String {
        let templates: Vec<&str> = self.templates.iter().map(TemplateId::as_str).collect();
        let quality = self
            .summary
            .average_quality
            .map(|q| format!("{:.2}", q))
            .unwrap_or_else(|| "n/a".to_string());

        let mut lines = vec![
            "\u{2705} Poster batch completed".to_string(),
            format!("\u{2022} Posters: {}", self.total_posters),
            format!("\u{2022} Templates: {}", templates.join(", ")),
            format!("\u{2022} Avg quality: {}", quality),
        ];

        if !self.summary.top_headlines.is_empty() {
            let headlines: Vec<String> = self
                .summary
                .top_headlines
                .iter()
                .map(|h| {
                    if h.source.is_empty() {
                        h.title.clone()
                    } else {
                        format!("{} ({})", h.title, h.source)
                    }
                })
                .collect();
            lines.push(format!("\u{2022} Top headlines: {}", headlines.join(" | ")));
        }

        lines.join("\n")
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &RunNotification) -> Result<()>;
}

/// Posts run summaries to a Slack incoming webhook and/or a generic JSON webhook.
pub struct WebhookNotifier {
    client: Client,
    slack_url: Option<String>,
    webhook_url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(slack_url: Option<String>, webhook_url: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            slack_url,
            webhook_url,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.slack_url.is_some() || self.webhook_url.is_some()
    }

    async fn post_json(&self, url: &str, body: &serde_json::Value) -> Result<()> {
        self.client
            .post(url)
            .json(body)
            .send()
            .await
            .context("webhook post")?
            .error_for_status()
            .context("webhook non-2xx")?;
        Ok(())
    }

    async fn send_slack(&self, text: &str) -> Result<()> {
        let Some(url) = &self.slack_url else {
            return Ok(());
        };
        let body = json!({
            "text": text,
            "blocks": [
                { "type": "section", "text": { "type": "mrkdwn", "text": text } }
            ],
        });
        self.post_json(url, &body).await.context("slack")
    }

    async fn send_generic(&self, text: &str, payload: &RunNotification) -> Result<()> {
        let Some(url) = &self.webhook_url else {
            return Ok(());
        };
        let body = json!({
            "text": text,
            "data": {
                "templates": payload.templates,
                "maxPosts": payload.max_posts,
                "totalPosters": payload.total_posters,
                "summary": payload.summary,
            },
        });
        self.post_json(url, &body).await.context("generic webhook")
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &RunNotification) -> Result<()> {
        if !self.is_enabled() {
            debug!("Notifications disabled (no webhook configured)");
            return Ok(());
        }

        let text = payload.text();
        let (slack, generic) = futures::join!(
            self.send_slack(&text),
            self.send_generic(&text, payload)
        );

        let mut failures = 0;
        for result in [slack, generic] {
            if let Err(e) = result {
                warn!(error = format!("{:#}", e), "webhook delivery failed");
                failures += 1;
            }
        }
        if failures > 0 {
            anyhow::bail!("{} webhook deliveries failed", failures);
        }
        Ok(())
    }
}
