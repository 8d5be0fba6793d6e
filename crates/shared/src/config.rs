use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::orchestrator::OrchestratorSettings;
use crate::render::{CardStyle, PosterFormat};
use crate::templates::{TemplateId, DEFAULT_TEMPLATE};

const APP_DIR: &str = "tech-poster";

pub const DEFAULT_FEEDS: [&str; 3] = [
    "https://www.theverge.com/rss/index.xml",
    "http://feeds.arstechnica.com/arstechnica/index/",
    "https://www.wired.com/feed/rss",
];

const MAX_POSTS_LIMIT: i64 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    pub rss_feeds: Vec<String>,
    pub max_posts: usize,
    pub lookback_hours: u32,
    pub default_template: TemplateId,
    pub data_dir: PathBuf,
    pub output_dir: PathBuf,
    pub brand_name: String,
    pub footer_text: String,
    pub hashtags: String,
    pub poster_format: PosterFormat,
    pub slack_webhook_url: Option<String>,
    pub webhook_url: Option<String>,
    pub enable_scheduler: bool,
    pub schedule_interval_minutes: u64,
    pub http_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        // Try to load .env from multiple locations
        Self::try_load_dotenv();

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable lookup.
    pub fn from_vars(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |key: &str, default: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let optional = |key: &str| {
            get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let rss_feeds = match get("RSS_FEEDS").filter(|v| !v.trim().is_empty()) {
            Some(raw) => parse_list(&raw),
            None => DEFAULT_FEEDS.iter().map(|s| s.to_string()).collect(),
        };
        if rss_feeds.is_empty() {
            bail!("RSS_FEEDS is set but lists no feed URLs");
        }

        let max_posts = clamp(parse_number(get("MAX_POSTS").as_deref(), 2), 1, MAX_POSTS_LIMIT);
        let lookback_hours = clamp(parse_number(get("LOOKBACK_HOURS").as_deref(), 24), 1, 168);
        let http_timeout_secs = clamp(parse_number(get("HTTP_TIMEOUT_SECS").as_deref(), 20), 1, 120);
        let schedule_interval_minutes = parse_number(get("SCHEDULE_INTERVAL_MINUTES").as_deref(), 1440).max(1);

        let default_template = get("DEFAULT_TEMPLATE")
            .map(|v| TemplateId::parse_or(&v, DEFAULT_TEMPLATE))
            .unwrap_or(DEFAULT_TEMPLATE);

        let data_dir = optional("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let output_dir = optional("OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("out"));

        Ok(Self {
            rss_feeds,
            max_posts: max_posts as usize,
            lookback_hours: lookback_hours as u32,
            default_template,
            data_dir,
            output_dir,
            brand_name: text("BRAND_NAME", "Tech Daily"),
            footer_text: text("FOOTER_TEXT", "Fresh tech highlights for you"),
            hashtags: text("HASHTAGS", "#AI #Cloud #Security #Dev #TechNews"),
            poster_format: PosterFormat::parse(&text("POSTER_FORMAT", "square")),
            slack_webhook_url: optional("SLACK_WEBHOOK_URL"),
            webhook_url: optional("WEBHOOK_URL"),
            enable_scheduler: parse_bool(get("ENABLE_SCHEDULER").as_deref(), true),
            schedule_interval_minutes: schedule_interval_minutes as u64,
            http_timeout_secs: http_timeout_secs as u64,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_minutes * 60)
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            default_max_posts: self.max_posts,
            max_posts_limit: MAX_POSTS_LIMIT as usize,
            default_template: self.default_template,
        }
    }

    pub fn card_style(&self) -> CardStyle {
        CardStyle {
            brand_name: self.brand_name.clone(),
            footer_text: self.footer_text.clone(),
            hashtags: self.hashtags.clone(),
            format: self.poster_format,
        }
    }

    fn try_load_dotenv() {
        // Try locations in order of preference:

        // 1. Current directory (for development)
        if dotenvy::dotenv().is_ok() {
            return;
        }

        // 2. ~/.config/tech-poster/.env (standard config location)
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join(APP_DIR).join(".env");
            if config_path.exists() && dotenvy::from_path(&config_path).is_ok() {
                return;
            }
        }

        // 3. ~/.env (home directory)
        if let Some(home_dir) = dirs::home_dir() {
            let home_path = home_dir.join(".env");
            if home_path.exists() {
                let _ = dotenvy::from_path(&home_path);
            }
        }

        // If none found, that's okay - environment variables might be set system-wide
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("data"))
}

pub fn clamp(value: i64, min: i64, max: i64) -> i64 {
    value.max(min).min(max)
}

/// Integer parse; fractional values truncate, garbage falls back to `default`.
pub fn parse_number(value: Option<&str>, default: i64) -> i64 {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return default;
    };
    if let Ok(n) = raw.parse::<i64>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => f.trunc() as i64,
        _ => default,
    }
}

/// `1`, `true`, `yes`, `on` (any case) are true; anything else set is false.
pub fn parse_bool(value: Option<&str>, default: bool) -> bool {
    match value {
        None => default,
        Some(raw) => matches!(
            raw.trim().to_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ),
    }
}

pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
