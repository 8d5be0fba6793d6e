use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MAX_BULLETS: usize = 4;
const COVERAGE_WORDS: f64 = 600.0;
const DUPLICATE_PENALTY: f64 = 0.2;

const BULLET_WEIGHT: f64 = 0.4;
const COVERAGE_WEIGHT: f64 = 0.3;
const RECENCY_WEIGHT: f64 = 0.3;

/// Which fallback tier supplied the text an article was summarized from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTier {
    Article,
    Snippet,
    Title,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAnalysis {
    pub word_count: usize,
    pub bullet_count: usize,
    pub hours_old: f64,
    pub text_tier: TextTier,
    pub recency_score: f64,
    pub bullet_score: f64,
    pub coverage_score: f64,
    pub duplicate_penalty: f64,
    pub quality_score: f64,
}

/// Inputs to the quality score, gathered while an article is accepted
#[derive(Debug, Clone, Copy)]
pub struct ScoreInput {
    pub word_count: usize,
    pub bullet_count: usize,
    pub published_at: DateTime<Utc>,
    pub is_duplicate: bool,
    pub text_tier: TextTier,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Composite 0..=1 score from bullet density, text coverage and recency,
/// minus a flat penalty for title duplicates.
pub fn score(input: ScoreInput, lookback_hours: u32, now: DateTime<Utc>) -> QualityAnalysis {
    let age = now.signed_duration_since(input.published_at);
    let hours_old = (age.num_milliseconds() as f64 / 3_600_000.0).max(0.0);

    let lookback = f64::from(lookback_hours.max(1));
    let recency_score = (1.0 - hours_old / lookback).clamp(0.0, 1.0);
    let bullet_score = (input.bullet_count as f64 / MAX_BULLETS as f64).min(1.0);
    let coverage_score = (input.word_count as f64 / COVERAGE_WORDS).min(1.0);
    let duplicate_penalty = if input.is_duplicate {
        DUPLICATE_PENALTY
    } else {
        0.0
    };

    let composite = bullet_score * BULLET_WEIGHT
        + coverage_score * COVERAGE_WEIGHT
        + recency_score * RECENCY_WEIGHT
        - duplicate_penalty;

    QualityAnalysis {
        word_count: input.word_count,
        bullet_count: input.bullet_count,
        hours_old: round2(hours_old),
        text_tier: input.text_tier,
        recency_score: round2(recency_score),
        bullet_score: round2(bullet_score),
        coverage_score: round2(coverage_score),
        duplicate_penalty,
        quality_score: round2(composite.clamp(0.0, 1.0)),
    }
}
