//! Single-flight run orchestration: select once, render per template,
//! summarize, and keep a bounded history of completed runs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::{ArticleRecord, Headline, HistoryEntry, RenderedPoster, RunSummary};
use crate::notify::{Notifier, RunNotification};
use crate::render::{PosterContent, PosterRenderer};
use crate::scoring::round2;
use crate::selection::NewsPipeline;
use crate::templates::{resolve_templates, TemplateId, DEFAULT_TEMPLATE};

pub const HISTORY_LIMIT: usize = 6;
const MAX_SOURCES: usize = 5;
const MAX_HEADLINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSource {
    Manual,
    Scheduler,
}

impl fmt::Display for TriggerSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerSource::Manual => f.write_str("manual"),
            TriggerSource::Scheduler => f.write_str("scheduler"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRequest {
    pub templates: Vec<String>,
    /// `None` uses the configured default.
    pub max_posts: Option<i64>,
    pub source: TriggerSource,
}

impl RunRequest {
    pub fn manual() -> Self {
        Self {
            templates: Vec::new(),
            max_posts: None,
            source: TriggerSource::Manual,
        }
    }

    pub fn scheduled() -> Self {
        Self {
            source: TriggerSource::Scheduler,
            ..Self::manual()
        }
    }

    pub fn with_templates<S: Into<String>>(mut self, templates: impl IntoIterator<Item = S>) -> Self {
        self.templates = templates.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_posts(mut self, max_posts: i64) -> Self {
        self.max_posts = Some(max_posts);
        self
    }
}

#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    /// Another run was already in progress.
    Skipped,
    Failed { run_id: String, error: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunError {
    #[error("max_posts must be a positive integer (got {0})")]
    InvalidMaxPosts(i64),
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub default_max_posts: usize,
    pub max_posts_limit: usize,
    pub default_template: TemplateId,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            default_max_posts: 2,
            max_posts_limit: 5,
            default_template: DEFAULT_TEMPLATE,
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    last_run_at: Option<DateTime<Utc>>,
    last_results: Vec<RenderedPoster>,
    last_templates: Vec<TemplateId>,
    last_max_posts: Option<usize>,
    history: VecDeque<HistoryEntry>,
}

/// Point-in-time copy of the run state, suitable for dashboards
#[derive(Debug, Clone, Serialize)]
pub struct RunStateSnapshot {
    pub running: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_results: Vec<RenderedPoster>,
    pub last_templates: Vec<TemplateId>,
    pub last_max_posts: Option<usize>,
    pub history: Vec<HistoryEntry>,
}

/// Clears the running flag however the run ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Orchestrator {
    pipeline: NewsPipeline,
    renderer: Arc<dyn PosterRenderer>,
    notifier: Option<Arc<dyn Notifier>>,
    settings: OrchestratorSettings,
    running: AtomicBool,
    last_run_millis: AtomicI64,
    state: Mutex<RunState>,
    notifications: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        pipeline: NewsPipeline,
        renderer: Arc<dyn PosterRenderer>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            pipeline,
            renderer,
            notifier: None,
            settings,
            running: AtomicBool::new(false),
            last_run_millis: AtomicI64::new(0),
            state: Mutex::new(RunState::default()),
            notifications: Mutex::new(Vec::new()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn snapshot(&self) -> RunStateSnapshot {
        let state = self.lock_state();
        RunStateSnapshot {
            running: self.is_running(),
            last_run_at: state.last_run_at,
            last_results: state.last_results.clone(),
            last_templates: state.last_templates.clone(),
            last_max_posts: state.last_max_posts,
            history: state.history.iter().cloned().collect(),
        }
    }

    /// Wait for notification deliveries still in flight.
    ///
    /// One-shot callers must await this before the runtime shuts down.
    pub async fn flush_notifications(&self) {
        let pending = std::mem::take(
            &mut *self
                .notifications
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        );
        for handle in pending {
            if let Err(e) = handle.await {
                warn!(error = %e, "Notification task did not finish");
            }
        }
    }

    fn resolve_max_posts(&self, requested: Option<i64>) -> Result<usize, RunError> {
        match requested {
            None => Ok(self.settings.default_max_posts),
            Some(n) if n <= 0 => Err(RunError::InvalidMaxPosts(n)),
            Some(n) => Ok(usize::try_from(n)
                .unwrap_or(usize::MAX)
                .min(self.settings.max_posts_limit)),
        }
    }

    /// Millisecond run ids, bumped when two runs start within the same millisecond.
    fn next_run_id(&self, now: DateTime<Utc>) -> String {
        let now_millis = now.timestamp_millis();
        let previous = self
            .last_run_millis
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now_millis.max(last + 1))
            })
            .unwrap_or(now_millis);
        format!("run_{}", now_millis.max(previous + 1))
    }

    /// Run the pipeline once, unless a run is already in progress.
    pub async fn trigger(&self, request: RunRequest) -> Result<RunOutcome, RunError> {
        let max_posts = self.resolve_max_posts(request.max_posts)?;
        let templates = resolve_templates(&request.templates, self.settings.default_template);

        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!(source = %request.source, "Run already in progress, skipped");
            return Ok(RunOutcome::Skipped);
        }
        let _guard = RunGuard(&self.running);

        let started_at = Utc::now();
        let run_id = self.next_run_id(started_at);
        info!(
            run_id = %run_id,
            source = %request.source,
            max_posts,
            templates = ?templates,
            "Poster run triggered"
        );

        let body = self.execute(&run_id, started_at, &templates, max_posts);
        let result = AssertUnwindSafe(body).catch_unwind().await;
        let outcome = match result {
            Ok(Ok(summary)) => {
                info!(
                    run_id = %run_id,
                    posters = summary.total_posters,
                    average_quality = ?summary.average_quality,
                    "Poster run completed"
                );
                self.dispatch_notification(&summary);
                RunOutcome::Completed(summary)
            }
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                error!(run_id = %run_id, error = %message, "Poster run failed");
                RunOutcome::Failed {
                    run_id,
                    error: message,
                }
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(run_id = %run_id, error = %message, "Poster run panicked");
                RunOutcome::Failed {
                    run_id,
                    error: message,
                }
            }
        };

        Ok(outcome)
    }

    async fn execute(
        &self,
        run_id: &str,
        started_at: DateTime<Utc>,
        templates: &[TemplateId],
        max_posts: usize,
    ) -> Result<RunSummary> {
        let articles = self.pipeline.fetch_fresh_news(max_posts, started_at).await?;
        info!(run_id, selected = articles.len(), "Articles selected");

        let posters = self.render_all(&articles, templates).await;
        let summary = summarize(
            run_id,
            started_at,
            Utc::now(),
            templates,
            max_posts,
            &articles,
            &posters,
        );

        self.commit(&summary, posters);
        Ok(summary)
    }

    async fn render_all(
        &self,
        articles: &[ArticleRecord],
        templates: &[TemplateId],
    ) -> Vec<RenderedPoster> {
        let mut posters = Vec::new();
        for &template in templates {
            for (position, article) in articles.iter().enumerate() {
                let content = PosterContent::from(article);
                match self.renderer.render(&content, position + 1, template).await {
                    Ok(image) => posters.push(RenderedPoster {
                        article: article.clone(),
                        template,
                        image,
                        generated_at: Utc::now(),
                    }),
                    Err(e) => {
                        warn!(
                            title = %article.title(),
                            template = %template,
                            error = %e,
                            "Failed to render poster"
                        );
                    }
                }
            }
        }
        posters
    }

    fn commit(&self, summary: &RunSummary, posters: Vec<RenderedPoster>) {
        let mut state = self.lock_state();
        state.last_run_at = Some(summary.completed_at);
        state.last_results = posters;
        state.last_templates = summary.templates.clone();
        state.last_max_posts = Some(summary.max_posts);
        state.history.push_front(HistoryEntry {
            id: summary.run_id.clone(),
            completed_at: summary.completed_at,
            templates: summary.templates.clone(),
            max_posts: summary.max_posts,
            count: summary.total_posters,
            average_quality: summary.average_quality,
        });
        state.history.truncate(HISTORY_LIMIT);
    }

    fn dispatch_notification(&self, summary: &RunSummary) {
        let Some(notifier) = self.notifier.clone() else {
            return;
        };
        let payload = RunNotification::from(summary);
        let handle = tokio::spawn(async move {
            if let Err(e) = notifier.notify(&payload).await {
                warn!(error = format!("{:#}", e), "Run notification failed");
            }
        });

        let mut pending = self
            .notifications
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }
}

fn summarize(
    run_id: &str,
    started_at: DateTime<Utc>,
    completed_at: DateTime<Utc>,
    templates: &[TemplateId],
    max_posts: usize,
    articles: &[ArticleRecord],
    posters: &[RenderedPoster],
) -> RunSummary {
    let average_quality = if posters.is_empty() {
        None
    } else {
        let total: f64 = posters
            .iter()
            .map(|p| p.article.analysis.quality_score)
            .sum();
        Some(round2(total / posters.len() as f64))
    };

    // selection order, limited to articles that produced at least one poster
    let mut sources: Vec<String> = Vec::new();
    let mut top_headlines: Vec<Headline> = Vec::new();
    for article in articles {
        let url = article.url();
        if !posters.iter().any(|p| p.article.url() == url) {
            continue;
        }
        let source = article.source();
        if !source.is_empty() && sources.len() < MAX_SOURCES && !sources.iter().any(|s| s == source) {
            sources.push(source.to_string());
        }
        if top_headlines.len() < MAX_HEADLINES && !top_headlines.iter().any(|h| h.url == url) {
            top_headlines.push(Headline {
                title: article.title().to_string(),
                source: source.to_string(),
                url: url.to_string(),
            });
        }
    }

    RunSummary {
        run_id: run_id.to_string(),
        started_at,
        completed_at,
        templates: templates.to_vec(),
        max_posts,
        articles_selected: articles.len(),
        total_posters: posters.len(),
        average_quality,
        duplicate_count: posters.iter().filter(|p| p.article.candidate.is_duplicate()).count(),
        sources,
        top_headlines,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "run panicked".to_string()
    }
}
