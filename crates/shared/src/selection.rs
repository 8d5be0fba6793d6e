use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::extractor::{build_bullets, choose_text, ArticleSource};
use crate::feed::{fetch_all, FeedSource};
use crate::models::{ArticleRecord, Candidate, FeedEntry};
use crate::scoring::{score, ScoreInput};
use crate::seen::SeenStore;
use crate::text::{normalize_title, word_count};

/// Annotate entries whose normalized title was already seen earlier in fetch order.
///
/// The first entry for a title key is canonical; later entries point at its URL.
/// Entries without a URL or title never become canonical.
pub fn mark_title_duplicates(entries: Vec<FeedEntry>) -> Vec<Candidate> {
    let mut canonical: HashMap<String, String> = HashMap::new();

    entries
        .into_iter()
        .map(|entry| {
            let key = normalize_title(&entry.title);
            let mut duplicate_of = None;
            if !key.is_empty() && !entry.url.is_empty() {
                match canonical.get(&key) {
                    Some(url) if *url != entry.url => duplicate_of = Some(url.clone()),
                    Some(_) => {}
                    None => {
                        canonical.insert(key, entry.url.clone());
                    }
                }
            }
            Candidate {
                entry,
                duplicate_of,
            }
        })
        .collect()
}

/// Drop entries lacking a URL or title and keep the newest entry per URL.
///
/// Ties keep the earlier entry; output follows first appearance of each URL.
pub fn dedupe_by_url(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<Candidate> = Vec::new();

    for candidate in candidates {
        if candidate.entry.url.is_empty() || candidate.entry.title.is_empty() {
            continue;
        }
        match slots.get(&candidate.entry.url) {
            Some(&slot) => {
                if kept[slot].entry.published_at < candidate.entry.published_at {
                    kept[slot] = candidate;
                }
            }
            None => {
                slots.insert(candidate.entry.url.clone(), kept.len());
                kept.push(candidate);
            }
        }
    }

    kept
}

pub fn filter_recent(candidates: Vec<Candidate>, cutoff: DateTime<Utc>) -> Vec<Candidate> {
    candidates
        .into_iter()
        .filter(|c| c.entry.published_at >= cutoff)
        .collect()
}

/// Most recent first. The sort is stable, so equal timestamps keep fetch order.
pub fn order_by_recency(mut candidates: Vec<Candidate>) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.entry.published_at.cmp(&a.entry.published_at));
    candidates
}

/// Title marking, URL dedup, recency filter and ordering, in that order.
pub fn rank_candidates(
    entries: Vec<FeedEntry>,
    lookback_hours: u32,
    now: DateTime<Utc>,
) -> Vec<Candidate> {
    let cutoff = now - Duration::hours(i64::from(lookback_hours));
    let marked = mark_title_duplicates(entries);
    let unique = dedupe_by_url(marked);
    let fresh = filter_recent(unique, cutoff);
    order_by_recency(fresh)
}

/// Feed fetch, selection, extraction and scoring for one run
pub struct NewsPipeline {
    feeds: Arc<dyn FeedSource>,
    articles: Arc<dyn ArticleSource>,
    seen: Arc<SeenStore>,
    feed_urls: Vec<String>,
    lookback_hours: u32,
}

impl NewsPipeline {
    pub fn new(
        feeds: Arc<dyn FeedSource>,
        articles: Arc<dyn ArticleSource>,
        seen: Arc<SeenStore>,
        feed_urls: Vec<String>,
        lookback_hours: u32,
    ) -> Self {
        Self {
            feeds,
            articles,
            seen,
            feed_urls,
            lookback_hours,
        }
    }

    pub fn seen_store(&self) -> &SeenStore {
        &self.seen
    }

    pub fn lookback_hours(&self) -> u32 {
        self.lookback_hours
    }

    /// Fetch every configured feed and select up to `limit` fresh, unseen articles.
    pub async fn fetch_fresh_news(
        &self,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArticleRecord>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let entries = fetch_all(self.feeds.as_ref(), &self.feed_urls).await;
        info!(
            feeds = self.feed_urls.len(),
            entries = entries.len(),
            "fetched feed entries"
        );
        self.select(entries, limit, now).await
    }

    /// Select from already-fetched entries. Every accepted URL is marked
    /// seen immediately, before the next candidate is considered.
    pub async fn select(
        &self,
        entries: Vec<FeedEntry>,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<Vec<ArticleRecord>> {
        let mut picks = Vec::new();
        if limit == 0 {
            return Ok(picks);
        }

        let ranked = rank_candidates(entries, self.lookback_hours, now);
        debug!(candidates = ranked.len(), "ranked candidates");

        for candidate in ranked {
            if picks.len() >= limit {
                break;
            }
            if self.seen.is_seen(&candidate.entry.url)? {
                debug!(url = %candidate.entry.url, "skipping seen article");
                continue;
            }

            let article_text = self.articles.article_text(&candidate.entry.url).await;
            let (text, tier) = choose_text(
                &article_text,
                &candidate.entry.snippet,
                &candidate.entry.title,
            );
            let bullets = build_bullets(text);
            let analysis = score(
                ScoreInput {
                    word_count: word_count(text),
                    bullet_count: bullets.len(),
                    published_at: candidate.entry.published_at,
                    is_duplicate: candidate.is_duplicate(),
                    text_tier: tier,
                },
                self.lookback_hours,
                now,
            );

            self.seen.mark_seen(&candidate.entry.url, now)?;
            info!(
                url = %candidate.entry.url,
                quality = analysis.quality_score,
                tier = ?tier,
                "selected article"
            );

            picks.push(ArticleRecord {
                candidate,
                bullets,
                analysis,
            });
        }

        Ok(picks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::DEFAULT_BULLET;
    use crate::scoring::TextTier;
    use crate::test_support::{FixtureArticles, FixtureFeeds};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap()
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 10, hour, minute, 0).unwrap()
    }

    fn entry(title: &str, url: &str, published_at: DateTime<Utc>) -> FeedEntry {
        FeedEntry::new(title, url, "Example", published_at)
    }

    fn pipeline(
        feeds: FixtureFeeds,
        articles: FixtureArticles,
        seen: Arc<SeenStore>,
    ) -> NewsPipeline {
        let urls = feeds.urls();
        NewsPipeline::new(Arc::new(feeds), Arc::new(articles), seen, urls, 24)
    }

    #[test]
    fn test_entries_without_url_or_title_are_dropped() {
        let marked = mark_title_duplicates(vec![
            entry("", "https://x.example/1", at(10, 0)),
            entry("Has title", "", at(10, 0)),
            entry("Kept", "https://x.example/2", at(10, 0)),
        ]);
        let kept = dedupe_by_url(marked);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].entry.title, "Kept");
    }

    #[test]
    fn test_url_dedup_keeps_latest() {
        let marked = mark_title_duplicates(vec![
            entry("Old copy", "https://x.example/same", at(8, 0)),
            entry("Other", "https://x.example/other", at(9, 0)),
            entry("New copy", "https://x.example/same", at(11, 0)),
            entry("Stale copy", "https://x.example/same", at(7, 0)),
        ]);
        let kept = dedupe_by_url(marked);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].entry.title, "New copy");
        assert_eq!(kept[1].entry.title, "Other");
    }

    #[test]
    fn test_title_duplicates_point_at_first_seen() {
        let marked = mark_title_duplicates(vec![
            entry("Apple's new iPhone!", "https://a.example/1", at(8, 0)),
            entry("apple s NEW iphone", "https://b.example/2", at(11, 0)),
            entry("Apple's new iPhone", "https://c.example/3", at(9, 0)),
            entry("Something else", "https://d.example/4", at(9, 0)),
        ]);
        assert_eq!(marked[0].duplicate_of, None);
        assert_eq!(marked[1].duplicate_of.as_deref(), Some("https://a.example/1"));
        assert_eq!(marked[2].duplicate_of.as_deref(), Some("https://a.example/1"));
        assert_eq!(marked[3].duplicate_of, None);
    }

    #[test]
    fn test_same_article_in_two_feeds_is_not_a_title_duplicate() {
        let marked = mark_title_duplicates(vec![
            entry("Same story", "https://a.example/1", at(8, 0)),
            entry("Same story", "https://a.example/1", at(9, 0)),
        ]);
        assert!(marked.iter().all(|c| c.duplicate_of.is_none()));
    }

    #[test]
    fn test_rank_filters_old_and_sorts_newest_first() {
        let ranked = rank_candidates(
            vec![
                entry("Yesterday", "https://x.example/old", now() - Duration::hours(25)),
                entry("Morning", "https://x.example/am", at(8, 0)),
                entry("Noonish", "https://x.example/noon", at(11, 30)),
                entry("Edge", "https://x.example/edge", now() - Duration::hours(24)),
            ],
            24,
            now(),
        );
        let titles: Vec<_> = ranked.iter().map(|c| c.entry.title.as_str()).collect();
        assert_eq!(titles, vec!["Noonish", "Morning", "Edge"]);
    }

    #[tokio::test]
    async fn test_five_entry_scenario_selects_two() {
        let feeds = FixtureFeeds::default()
            .with_feed(
                "https://a.example/rss",
                vec![
                    entry("AI chips arrive", "https://a.example/chips", at(11, 0)),
                    entry("Cloud outage hits region", "https://a.example/outage", at(9, 0)),
                    entry("Security patch ships", "https://a.example/patch", at(8, 0)),
                ],
            )
            .with_feed(
                "https://b.example/rss",
                vec![
                    entry("AI Chips Arrive!", "https://b.example/chips", at(11, 30)),
                    entry("Cloud outage: update", "https://a.example/outage", at(11, 45)),
                ],
            );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let pipeline = pipeline(feeds, FixtureArticles::default(), seen.clone());

        let picks = pipeline.fetch_fresh_news(2, now()).await.unwrap();

        assert_eq!(picks.len(), 2);
        assert_eq!(picks[0].url(), "https://a.example/outage");
        assert_eq!(picks[0].title(), "Cloud outage: update");
        assert_eq!(picks[0].candidate.entry.published_at, at(11, 45));
        assert_eq!(picks[1].url(), "https://b.example/chips");
        assert_eq!(
            picks[1].candidate.duplicate_of.as_deref(),
            Some("https://a.example/chips")
        );
        assert_eq!(picks[1].analysis.duplicate_penalty, 0.2);
        assert!(seen.is_seen("https://a.example/outage").unwrap());
        assert!(seen.is_seen("https://b.example/chips").unwrap());
        assert!(!seen.is_seen("https://a.example/chips").unwrap());
    }

    #[tokio::test]
    async fn test_previously_seen_urls_are_skipped() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![
                entry("Already posted", "https://a.example/old", at(11, 0)),
                entry("Brand new", "https://a.example/new", at(10, 0)),
            ],
        );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        seen.mark_seen("https://a.example/old", at(6, 0)).unwrap();
        let pipeline = pipeline(feeds, FixtureArticles::default(), seen.clone());

        let picks = pipeline.fetch_fresh_news(2, now()).await.unwrap();
        let urls: Vec<_> = picks.iter().map(|p| p.url()).collect();
        assert_eq!(urls, vec!["https://a.example/new"]);

        // A second run finds nothing left to post.
        let again = pipeline.fetch_fresh_news(2, now()).await.unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_accepted_urls_are_marked_before_next_extraction() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![
                entry("First", "https://a.example/1", at(11, 0)),
                entry("Second", "https://a.example/2", at(10, 0)),
            ],
        );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let articles = FixtureArticles::default().observing(seen.clone());
        let pipeline = pipeline(feeds, articles.clone(), seen);

        pipeline.fetch_fresh_news(2, now()).await.unwrap();
        assert_eq!(articles.seen_counts(), vec![0, 1]);
    }

    #[tokio::test]
    async fn test_extraction_failure_falls_back_to_snippet() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![entry("Title only words", "https://a.example/1", at(11, 0))
                .with_snippet("Snippet sentence one. Snippet sentence two.")],
        );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let pipeline = pipeline(feeds, FixtureArticles::default(), seen);

        let picks = pipeline.fetch_fresh_news(1, now()).await.unwrap();
        assert_eq!(
            picks[0].bullets,
            vec!["Snippet sentence one.", "Snippet sentence two."]
        );
        assert_eq!(picks[0].analysis.text_tier, TextTier::Snippet);
        assert_eq!(picks[0].analysis.word_count, 6);
    }

    #[tokio::test]
    async fn test_article_text_wins_when_available() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![entry("Headline", "https://a.example/1", at(11, 0)).with_snippet("Snippet.")],
        );
        let articles =
            FixtureArticles::default().with_text("https://a.example/1", "Body one. Body two! Body three?");
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let pipeline = pipeline(feeds, articles, seen);

        let picks = pipeline.fetch_fresh_news(1, now()).await.unwrap();
        assert_eq!(picks[0].bullets, vec!["Body one.", "Body two!", "Body three?"]);
        assert_eq!(picks[0].analysis.text_tier, TextTier::Article);
    }

    #[tokio::test]
    async fn test_no_article_no_snippet_uses_title() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![entry("Headline stands alone", "https://a.example/1", at(11, 0))],
        );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let pipeline = pipeline(feeds, FixtureArticles::default(), seen);

        let picks = pipeline.fetch_fresh_news(1, now()).await.unwrap();
        assert_eq!(picks[0].bullets, vec!["Headline stands alone"]);
        assert_eq!(picks[0].analysis.text_tier, TextTier::Title);
    }

    #[test]
    fn test_all_tiers_empty_yields_default_bullet() {
        let (text, tier) = choose_text("", "", "");
        assert_eq!(tier, TextTier::Title);
        assert_eq!(build_bullets(text), vec![DEFAULT_BULLET.to_string()]);
    }

    #[tokio::test]
    async fn test_fewer_candidates_than_limit_is_not_an_error() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![
                entry("Only fresh one", "https://a.example/1", at(11, 0)),
                entry("Too old", "https://a.example/2", now() - Duration::hours(30)),
            ],
        );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let pipeline = pipeline(feeds, FixtureArticles::default(), seen);

        let picks = pipeline.fetch_fresh_news(3, now()).await.unwrap();
        assert_eq!(picks.len(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_returns_nothing_and_marks_nothing() {
        let feeds = FixtureFeeds::default().with_feed(
            "https://a.example/rss",
            vec![entry("Fresh", "https://a.example/1", at(11, 0))],
        );
        let seen = Arc::new(SeenStore::open_in_memory().unwrap());
        let pipeline = pipeline(feeds, FixtureArticles::default(), seen.clone());

        assert!(pipeline.fetch_fresh_news(0, now()).await.unwrap().is_empty());
        assert!(seen.is_empty().unwrap());
    }
}
