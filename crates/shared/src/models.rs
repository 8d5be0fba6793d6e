use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::QualityAnalysis;
use crate::templates::TemplateId;

/// One raw item from a feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub title: String,
    pub url: String,
    pub source: String,
    pub published_at: DateTime<Utc>,
    pub snippet: String,
}

impl FeedEntry {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        source: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            source: source.into(),
            published_at,
            snippet: String::new(),
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }
}

/// A feed entry still eligible for selection in the current run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub entry: FeedEntry,
    /// URL of the first-seen entry sharing this entry's normalized title
    pub duplicate_of: Option<String>,
}

impl Candidate {
    pub fn is_duplicate(&self) -> bool {
        self.duplicate_of.is_some()
    }
}

/// The unit of output handed to rendering
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(flatten)]
    pub candidate: Candidate,
    pub bullets: Vec<String>,
    pub analysis: QualityAnalysis,
}

impl ArticleRecord {
    pub fn title(&self) -> &str {
        &self.candidate.entry.title
    }

    pub fn url(&self) -> &str {
        &self.candidate.entry.url
    }

    pub fn source(&self) -> &str {
        &self.candidate.entry.source
    }
}

/// One article rendered against one template
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderedPoster {
    pub article: ArticleRecord,
    pub template: TemplateId,
    pub image: String,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
    pub source: String,
    pub url: String,
}

/// Aggregated outcome of one completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub templates: Vec<TemplateId>,
    pub max_posts: usize,
    pub articles_selected: usize,
    pub total_posters: usize,
    pub average_quality: Option<f64>,
    pub duplicate_count: usize,
    pub sources: Vec<String>,
    pub top_headlines: Vec<Headline>,
}

/// Lightweight record kept in the bounded run history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub completed_at: DateTime<Utc>,
    pub templates: Vec<TemplateId>,
    pub max_posts: usize,
    pub count: usize,
    pub average_quality: Option<f64>,
}
