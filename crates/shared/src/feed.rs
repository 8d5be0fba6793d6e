use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::models::FeedEntry;
use crate::text::{html_to_text, sanitize};

pub const USER_AGENT: &str = "tech-poster-rs/0.1 (+https://github.com/machander-byte/AI-Automation)";

/// Anything that can turn a feed URL into entries.
///
/// Implementations never fail: a broken feed yields an empty list.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_entries(&self, feed_url: &str) -> Vec<FeedEntry>;
}

pub struct HttpFeedSource {
    client: Client,
}

impl HttpFeedSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn try_fetch(&self, feed_url: &str) -> Result<Vec<FeedEntry>> {
        let response = self
            .client
            .get(feed_url)
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error: {}", status);
        }

        let body = response.bytes().await.context("Failed to read response body")?;
        parse_feed(&body, Utc::now())
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_entries(&self, feed_url: &str) -> Vec<FeedEntry> {
        match self.try_fetch(feed_url).await {
            Ok(entries) => {
                debug!(feed = %feed_url, entries = entries.len(), "fetched feed");
                entries
            }
            Err(e) => {
                warn!(feed = %feed_url, error = %e, "Failed to fetch feed");
                Vec::new()
            }
        }
    }
}

/// Parse RSS or Atom bytes into entries.
///
/// Entries without a parsable date are stamped with `fetched_at`.
pub fn parse_feed(body: &[u8], fetched_at: DateTime<Utc>) -> Result<Vec<FeedEntry>> {
    let feed = feed_rs::parser::parse(body).context("Failed to parse feed")?;
    let source = feed
        .title
        .map(|t| sanitize(&t.content))
        .unwrap_or_default();

    let entries = feed
        .entries
        .into_iter()
        .map(|entry| {
            let url = entry
                .links
                .first()
                .map(|link| link.href.trim().to_string())
                .filter(|href| !href.is_empty())
                .or_else(|| {
                    let id = entry.id.trim();
                    (id.starts_with("http://") || id.starts_with("https://"))
                        .then(|| id.to_string())
                })
                .unwrap_or_default();

            let snippet = entry
                .summary
                .map(|s| s.content)
                .filter(|s| !s.trim().is_empty())
                .or_else(|| entry.content.and_then(|c| c.body))
                .map(|s| html_to_text(&s))
                .unwrap_or_default();

            FeedEntry {
                title: entry.title.map(|t| sanitize(&t.content)).unwrap_or_default(),
                url,
                source: source.clone(),
                published_at: entry.published.or(entry.updated).unwrap_or(fetched_at),
                snippet,
            }
        })
        .collect();

    Ok(entries)
}

/// Fetch every feed concurrently and concatenate the results in feed order.
pub async fn fetch_all(source: &dyn FeedSource, feed_urls: &[String]) -> Vec<FeedEntry> {
    let results = join_all(feed_urls.iter().map(|url| source.fetch_entries(url))).await;
    results.into_iter().flatten().collect()
}
