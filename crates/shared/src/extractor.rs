use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::feed::USER_AGENT;
use crate::scoring::{TextTier, MAX_BULLETS};
use crate::text::{sanitize, split_sentences};

pub const DEFAULT_BULLET: &str = "Fresh insights coming soon.";

const MAX_BULLET_CHARS: usize = 180;
const TRUNCATED_BULLET_CHARS: usize = 177;

const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form",
];

/// Best-effort main-body text for an article URL.
///
/// Implementations swallow every failure and return an empty string.
#[async_trait]
pub trait ArticleSource: Send + Sync {
    async fn article_text(&self, url: &str) -> String;
}

pub struct ContentExtractor {
    client: Client,
}

impl ContentExtractor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    async fn try_fetch_article(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await
            .context("Failed to send HTTP request")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("HTTP error: {}", status);
        }

        let page_url = response.url().clone();
        let html = response.text().await.context("Failed to read response body")?;
        Ok(extract_main_text(&html, &page_url))
    }
}

#[async_trait]
impl ArticleSource for ContentExtractor {
    async fn article_text(&self, url: &str) -> String {
        match self.try_fetch_article(url).await {
            Ok(text) => {
                debug!(url = %url, chars = text.chars().count(), "extracted article text");
                text
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Failed to fetch article text");
                String::new()
            }
        }
    }
}

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// Text of every visible text node under `root`, skipping chrome such as nav and scripts.
fn visible_text(root: ElementRef) -> String {
    let mut parts = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| SKIPPED_TAGS.contains(&e.name()))
        });
        if !hidden {
            parts.push(&**text);
        }
    }
    sanitize(&parts.join(" "))
}

/// Main text of an article page.
///
/// Readability picks the content node; when it finds nothing usable the
/// visible body text is used instead.
pub fn extract_main_text(html: &str, page_url: &Url) -> String {
    match readability::extractor::extract(&mut html.as_bytes(), page_url) {
        Ok(product) => {
            let text = sanitize(&product.text);
            if !text.is_empty() {
                return text;
            }
            debug!(url = %page_url, "readability found no content, using body text");
        }
        Err(e) => {
            debug!(url = %page_url, error = ?e, "readability failed, using body text");
        }
    }

    let document = Html::parse_document(html);
    document
        .select(&selector("body"))
        .next()
        .map(visible_text)
        .unwrap_or_default()
}

/// Three-tier fallback: article text, then feed snippet, then title.
pub fn choose_text<'a>(article: &'a str, snippet: &'a str, title: &'a str) -> (&'a str, TextTier) {
    if !article.trim().is_empty() {
        (article, TextTier::Article)
    } else if !snippet.trim().is_empty() {
        (snippet, TextTier::Snippet)
    } else {
        (title, TextTier::Title)
    }
}

/// Turn text into 1..=4 short bullets, never returning an empty list.
pub fn build_bullets(text: &str) -> Vec<String> {
    let bullets: Vec<String> = split_sentences(text)
        .into_iter()
        .filter(|s| !s.is_empty())
        .take(MAX_BULLETS)
        .map(|sentence| {
            if sentence.chars().count() > MAX_BULLET_CHARS {
                let cut: String = sentence.chars().take(TRUNCATED_BULLET_CHARS).collect();
                format!("{}...", cut.trim())
            } else {
                sentence
            }
        })
        .collect();

    if bullets.is_empty() {
        vec![DEFAULT_BULLET.to_string()]
    } else {
        bullets
    }
}
