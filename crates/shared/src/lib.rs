// Public modules
pub mod config;
pub mod extractor;
pub mod feed;
pub mod models;
pub mod notify;
pub mod orchestrator;
pub mod render;
pub mod scheduler;
pub mod scoring;
pub mod seen;
pub mod selection;
pub mod templates;
pub mod text;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::Config;
pub use extractor::{ArticleSource, ContentExtractor};
pub use feed::{FeedSource, HttpFeedSource};
pub use models::{ArticleRecord, Candidate, FeedEntry, HistoryEntry, RenderedPoster, RunSummary};
pub use notify::{Notifier, RunNotification, WebhookNotifier};
pub use orchestrator::{
    Orchestrator, OrchestratorSettings, RunError, RunOutcome, RunRequest, RunStateSnapshot,
    TriggerSource,
};
pub use render::{build_caption, CardRenderer, PosterContent, PosterRenderer, RenderError};
pub use scheduler::spawn_scheduler;
pub use scoring::QualityAnalysis;
pub use seen::SeenStore;
pub use selection::NewsPipeline;
pub use templates::TemplateId;
