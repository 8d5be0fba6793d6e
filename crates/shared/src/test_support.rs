//! In-crate fakes for the network collaborators.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::extractor::ArticleSource;
use crate::feed::FeedSource;
use crate::models::FeedEntry;
use crate::seen::SeenStore;

/// Serves canned entries per feed URL; unknown feeds behave like failed fetches.
#[derive(Default)]
pub struct FixtureFeeds {
    feeds: Vec<(String, Vec<FeedEntry>)>,
}

impl FixtureFeeds {
    pub fn with_feed(mut self, url: &str, entries: Vec<FeedEntry>) -> Self {
        self.feeds.push((url.to_string(), entries));
        self
    }

    pub fn urls(&self) -> Vec<String> {
        self.feeds.iter().map(|(url, _)| url.clone()).collect()
    }
}

#[async_trait]
impl FeedSource for FixtureFeeds {
    async fn fetch_entries(&self, feed_url: &str) -> Vec<FeedEntry> {
        self.feeds
            .iter()
            .find(|(url, _)| url == feed_url)
            .map(|(_, entries)| entries.clone())
            .unwrap_or_default()
    }
}

/// Serves canned article text; unknown URLs behave like failed extractions.
#[derive(Clone, Default)]
pub struct FixtureArticles {
    texts: HashMap<String, String>,
    observed: Option<Arc<SeenStore>>,
    seen_counts: Arc<Mutex<Vec<usize>>>,
}

impl FixtureArticles {
    pub fn with_text(mut self, url: &str, text: &str) -> Self {
        self.texts.insert(url.to_string(), text.to_string());
        self
    }

    /// Record the seen-store size at every extraction call.
    pub fn observing(mut self, seen: Arc<SeenStore>) -> Self {
        self.observed = Some(seen);
        self
    }

    pub fn seen_counts(&self) -> Vec<usize> {
        self.seen_counts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArticleSource for FixtureArticles {
    async fn article_text(&self, url: &str) -> String {
        if let Some(seen) = &self.observed {
            let count = seen.len().unwrap();
            self.seen_counts.lock().unwrap().push(count);
        }
        self.texts.get(url).cloned().unwrap_or_default()
    }
}
