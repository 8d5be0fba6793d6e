use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use url::Url;

use crate::models::ArticleRecord;
use crate::templates::{Palette, TemplateId};
use crate::text::sanitize;

/// What a poster shows: the normalized article record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterContent {
    pub title: String,
    pub bullets: Vec<String>,
    pub source_url: String,
}

impl From<&ArticleRecord> for PosterContent {
    fn from(article: &ArticleRecord) -> Self {
        Self {
            title: article.title().to_string(),
            bullets: article.bullets.clone(),
            source_url: article.url().to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("poster has no title")]
    MissingTitle,

    #[error("failed to write poster: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode poster: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("render failed: {0}")]
    Failed(String),
}

/// Turns poster content into an image handle
#[async_trait]
pub trait PosterRenderer: Send + Sync {
    /// `index` is the 1-based position of the article within the run.
    async fn render(
        &self,
        content: &PosterContent,
        index: usize,
        template: TemplateId,
    ) -> Result<String, RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PosterFormat {
    Square,
    Landscape,
}

impl PosterFormat {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "landscape" => PosterFormat::Landscape,
            _ => PosterFormat::Square,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            PosterFormat::Square => (1080, 1080),
            PosterFormat::Landscape => (1200, 627),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PosterFormat::Square => "square",
            PosterFormat::Landscape => "landscape",
        }
    }
}

/// Branding shared by every card
#[derive(Debug, Clone)]
pub struct CardStyle {
    pub brand_name: String,
    pub footer_text: String,
    pub hashtags: String,
    pub format: PosterFormat,
}

#[derive(Debug, Serialize)]
struct PosterCard<'a> {
    brand: &'a str,
    template: TemplateId,
    label: &'a str,
    format: PosterFormat,
    width: u32,
    height: u32,
    palette: Palette,
    title: String,
    bullets: Vec<String>,
    footer: String,
    hashtags: &'a str,
    source_url: &'a str,
}

/// Writes a JSON poster card per article/template for a downstream rasterizer.
pub struct CardRenderer {
    output_dir: PathBuf,
    style: CardStyle,
}

impl CardRenderer {
    pub fn new(output_dir: PathBuf, style: CardStyle) -> Self {
        Self { output_dir, style }
    }
}

fn source_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

#[async_trait]
impl PosterRenderer for CardRenderer {
    async fn render(
        &self,
        content: &PosterContent,
        index: usize,
        template: TemplateId,
    ) -> Result<String, RenderError> {
        let title = sanitize(&content.title);
        if title.is_empty() {
            return Err(RenderError::MissingTitle);
        }

        let info = template.info();
        let (width, height) = self.style.format.dimensions();
        let card = PosterCard {
            brand: &self.style.brand_name,
            template,
            label: info.label,
            format: self.style.format,
            width,
            height,
            palette: info.palette,
            title,
            bullets: content
                .bullets
                .iter()
                .map(|b| format!("{} {}", info.bullet_prefix, sanitize(b)))
                .collect(),
            footer: format!(
                "{} \u{2022} {}",
                self.style.footer_text,
                source_host(&content.source_url)
            ),
            hashtags: &self.style.hashtags,
            source_url: &content.source_url,
        };

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let filename = format!(
            "poster_{}_{}_{}_{:02}.json",
            self.style.format.as_str(),
            template,
            Utc::now().format("%Y%m%d%H%M%S"),
            index
        );
        let path = self.output_dir.join(filename);
        let json = serde_json::to_vec_pretty(&card)?;
        tokio::fs::write(&path, json).await?;

        Ok(path.display().to_string())
    }
}

/// Caption text handed to a publishing integration alongside the poster.
pub fn build_caption(article: &ArticleRecord, hashtags: &str) -> String {
    let mut lines = vec![article.title().to_string(), String::new()];
    for bullet in &article.bullets {
        lines.push(format!("\u{2022} {}", bullet));
    }
    lines.push(String::new());
    lines.push(format!("Read more: {}", article.url()));
    if !hashtags.trim().is_empty() {
        lines.push(String::new());
        lines.push(hashtags.trim().to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Candidate, FeedEntry};
    use crate::scoring::{score, ScoreInput, TextTier};
    use chrono::TimeZone;

    fn article() -> ArticleRecord {
        let published = Utc.with_ymd_and_hms(2026, 3, 10, 11, 0, 0).unwrap();
        let entry = FeedEntry::new(
            "NPUs \u{2014} everywhere",
            "https://news.example.com/npu",
            "Example",
            published,
        );
        ArticleRecord {
            candidate: Candidate {
                entry,
                duplicate_of: None,
            },
            bullets: vec!["First point.".to_string(), "Second point.".to_string()],
            analysis: score(
                ScoreInput {
                    word_count: 4,
                    bullet_count: 2,
                    published_at: published,
                    is_duplicate: false,
                    text_tier: TextTier::Article,
                },
                24,
                published,
            ),
        }
    }

    fn style() -> CardStyle {
        CardStyle {
            brand_name: "Tech Daily".to_string(),
            footer_text: "Fresh tech highlights for you".to_string(),
            hashtags: "#AI #Dev".to_string(),
            format: PosterFormat::Landscape,
        }
    }

    #[test]
    fn test_poster_format_parse() {
        assert_eq!(PosterFormat::parse("LANDSCAPE"), PosterFormat::Landscape);
        assert_eq!(PosterFormat::parse("portrait"), PosterFormat::Square);
        assert_eq!(PosterFormat::Square.dimensions(), (1080, 1080));
    }

    #[test]
    fn test_source_host() {
        assert_eq!(source_host("https://news.example.com/a?b=c"), "news.example.com");
        assert_eq!(source_host("not a url"), "not a url");
    }

    #[tokio::test]
    async fn test_card_renderer_writes_card() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CardRenderer::new(dir.path().join("out"), style());
        let content = PosterContent::from(&article());

        let handle = renderer.render(&content, 3, TemplateId::Aurora).await.unwrap();

        assert!(handle.contains("poster_landscape_aurora_"));
        assert!(handle.ends_with("_03.json"));
        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&handle).unwrap()).unwrap();
        assert_eq!(written["title"], "NPUs - everywhere");
        assert_eq!(written["width"], 1200);
        assert_eq!(written["template"], "aurora");
        assert_eq!(written["bullets"][0], "\u{25CF} First point.");
        assert_eq!(
            written["footer"],
            "Fresh tech highlights for you \u{2022} news.example.com"
        );
    }

    #[tokio::test]
    async fn test_card_renderer_rejects_blank_title() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = CardRenderer::new(dir.path().to_path_buf(), style());
        let content = PosterContent {
            title: "   ".to_string(),
            bullets: vec![],
            source_url: "https://x.example".to_string(),
        };
        let err = renderer
            .render(&content, 1, TemplateId::Midnight)
            .await
            .unwrap_err();
        assert!(matches!(err, RenderError::MissingTitle));
    }

    #[test]
    fn test_build_caption() {
        let caption = build_caption(&article(), "#AI #Dev");
        assert_eq!(
            caption,
            "NPUs \u{2014} everywhere\n\n\u{2022} First point.\n\u{2022} Second point.\n\nRead more: https://news.example.com/npu\n\n#AI #Dev"
        );
    }
}
