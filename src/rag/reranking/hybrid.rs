// Weighted ensemble of every strategy plus recency and confidence signals
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::RetrievedChunk;

/// Component scores of one chunk, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub semantic: f32,
    pub metadata: f32,
    pub financial: f32,
    pub recency: f32,
    pub confidence: f32,
}

/// Linear weights of the hybrid strategy
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HybridWeights {
    pub semantic: f32,
    pub metadata: f32,
    pub financial: f32,
    pub recency: f32,
    pub confidence: f32,
}

impl Default for HybridWeights {
    fn default() -> Self {
        Self {
            semantic: 0.3,
            metadata: 0.2,
            financial: 0.3,
            recency: 0.1,
            confidence: 0.1,
        }
    }
}

impl HybridWeights {
    /// Weighted sum clipped to [0, 1]. Non-finite components count as 0.
    pub fn combine(&self, scores: &ComponentScores) -> f32 {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        let sum = self.semantic * finite(scores.semantic)
            + self.metadata * finite(scores.metadata)
            + self.financial * finite(scores.financial)
            + self.recency * finite(scores.recency)
            + self.confidence * finite(scores.confidence);
        sum.clamp(0.0, 1.0)
    }
}

/// Score for documents with no usable date
pub const UNDATED_RECENCY: f32 = 0.4;

/// Step function of document age in days
pub fn recency_for_age(age_days: i64) -> f32 {
    match age_days {
        d if d <= 30 => 1.0,
        d if d <= 90 => 0.8,
        d if d <= 365 => 0.6,
        _ => 0.4,
    }
}

/// Recency of a chunk relative to `today`
pub fn recency(chunk: &RetrievedChunk, today: NaiveDate) -> f32 {
    chunk
        .metadata_str("document_date")
        .and_then(parse_date)
        .map(|date| recency_for_age((today - date).num_days().max(0)))
        .unwrap_or(UNDATED_RECENCY)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok())
}

fn page_bonus(page: Option<f64>) -> f32 {
    match page {
        Some(p) if p >= 1.0 && p <= 3.0 => 1.1,
        Some(p) if p <= 10.0 => 1.0,
        Some(_) => 0.9,
        None => 1.0,
    }
}

fn length_factor(tokens: usize) -> f32 {
    if tokens < 50 {
        0.8
    } else if tokens > 1000 {
        0.9
    } else {
        1.0
    }
}

/// Similarity scaled by chunk quality, page position and length
pub fn confidence(chunk: &RetrievedChunk) -> f32 {
    let quality = chunk
        .metadata_f64("quality_score")
        .map(|q| (q as f32).clamp(0.0, 1.0))
        .unwrap_or(1.0);
    let page = chunk
        .metadata_f64("page_number")
        .or_else(|| chunk.metadata_f64("page"));

    (chunk.similarity_score * quality * page_bonus(page) * length_factor(chunk.token_count()))
        .clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;
    use serde_json::{json, Map};

    fn chunk(similarity: f32, tokens: usize) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: "c".into(),
            partition: "p".into(),
            content: "word ".repeat(tokens),
            similarity_score: similarity,
            metadata: Map::new(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 12, 31).unwrap()
    }

    #[test]
    fn test_recency_steps() {
        assert_eq!(recency_for_age(0), 1.0);
        assert_eq!(recency_for_age(30), 1.0);
        assert_eq!(recency_for_age(31), 0.8);
        assert_eq!(recency_for_age(90), 0.8);
        assert_eq!(recency_for_age(365), 0.6);
        assert_eq!(recency_for_age(366), 0.4);
    }

    #[test]
    fn test_recency_from_metadata() {
        let mut c = chunk(0.5, 60);
        assert_eq!(recency(&c, today()), UNDATED_RECENCY);

        c.metadata.insert("document_date".into(), json!("2024-12-15"));
        assert_eq!(recency(&c, today()), 1.0);

        c.metadata.insert("document_date".into(), json!("2024-09-30T00:00:00Z"));
        assert_eq!(recency(&c, today()), 0.6);

        c.metadata.insert("document_date".into(), json!("not a date"));
        assert_eq!(recency(&c, today()), UNDATED_RECENCY);
    }

    #[test]
    fn test_confidence_factors() {
        let c = chunk(0.5, 100);
        assert!((confidence(&c) - 0.5).abs() < 1e-6);

        let mut early = chunk(0.5, 100);
        early.metadata.insert("page_number".into(), json!(2));
        assert!((confidence(&early) - 0.55).abs() < 1e-6);

        let mut poor = chunk(0.5, 20);
        poor.metadata.insert("quality_score".into(), json!(0.5));
        poor.metadata.insert("page_number".into(), json!(40));
        assert!((confidence(&poor) - 0.5 * 0.5 * 0.9 * 0.8).abs() < 1e-6);

        let mut top = chunk(1.0, 100);
        top.metadata.insert("page_number".into(), json!(1));
        assert_eq!(confidence(&top), 1.0);
    }

    #[test]
    fn test_combine_weights() {
        let weights = HybridWeights::default();
        let scores = ComponentScores {
            semantic: 1.0,
            metadata: 0.5,
            financial: 0.0,
            recency: 1.0,
            confidence: 0.5,
        };
        assert!((weights.combine(&scores) - (0.3 + 0.1 + 0.1 + 0.05)).abs() < 1e-6);
        assert_eq!(
            weights.combine(&ComponentScores {
                semantic: f32::NAN,
                ..Default::default()
            }),
            0.0
        );
    }

    #[quickcheck]
    fn prop_hybrid_score_in_unit_interval(a: u16, b: u16, c: u16, d: u16, e: u16) -> bool {
        let unit = |v: u16| v as f32 / u16::MAX as f32;
        let score = HybridWeights::default().combine(&ComponentScores {
            semantic: unit(a),
            metadata: unit(b),
            financial: unit(c),
            recency: unit(d),
            confidence: unit(e),
        });
        (0.0..=1.0).contains(&score)
    }
}
