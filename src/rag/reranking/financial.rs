// Financial relevance: tiered keyword table plus numeric-content bonuses
use regex::Regex;
use std::sync::LazyLock;

use crate::rag::reranking::scorer::QueryProfile;
use crate::types::RetrievedChunk;

/// Keyword tiers, strongest first
const KEYWORD_TIERS: &[(f32, &[&str])] = &[
    (
        1.0,
        &[
            "attribution",
            "contribution",
            "contributor",
            "detractor",
            "excess return",
            "active return",
            "alpha",
            "aum",
            "assets under management",
            "net flows",
        ],
    ),
    (
        0.7,
        &[
            "performance",
            "return",
            "benchmark",
            "allocation effect",
            "selection effect",
            "allocation",
            "sector",
            "overweight",
            "underweight",
            "inflows",
            "outflows",
            "tracking error",
        ],
    ),
    (
        0.5,
        &[
            "portfolio",
            "fund",
            "equity",
            "bond",
            "holding",
            "position",
            "yield",
            "volatility",
            "revenue",
            "earnings",
            "dividend",
            "valuation",
        ],
    ),
];

/// Weighted keyword sum that maps to a full keyword score
const KEYWORD_SATURATION: f32 = 3.0;

/// Weight multiplier for keywords absent from the query
const UNASKED_KEYWORD_SCALE: f32 = 0.5;

pub const CURRENCY_BONUS: f32 = 0.1;
pub const PERCENT_BONUS: f32 = 0.1;
pub const TABLE_BONUS: f32 = 0.15;

static CURRENCY: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:[$€£¥]\s?\d[\d,]*(?:\.\d+)?(?:\s?(?:k|m|mm|bn|million|billion|thousand))?)|(?:\b\d[\d,]*(?:\.\d+)?\s?(?:usd|eur|gbp|jpy|chf)\b)",
    )
    .ok()
});

static PERCENT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:\d+(?:\.\d+)?\s?%)|(?:\b\d+(?:\.\d+)?\s?(?:bps|basis\s+points|percent)\b)").ok()
});

pub fn score(chunk: &RetrievedChunk, profile: &QueryProfile) -> f32 {
    let content = chunk.content.to_lowercase();
    let padded = pad(&content);

    let weighted: f32 = KEYWORD_TIERS
        .iter()
        .flat_map(|(weight, keywords)| keywords.iter().map(move |k| (*weight, *k)))
        .filter(|(_, keyword)| contains_word(&padded, keyword))
        .map(|(weight, keyword)| {
            if profile.mentions(keyword) {
                weight
            } else {
                weight * UNASKED_KEYWORD_SCALE
            }
        })
        .sum();

    let mut total = (weighted / KEYWORD_SATURATION).min(1.0);

    if matches(&CURRENCY, &chunk.content) {
        total += CURRENCY_BONUS;
    }
    if matches(&PERCENT, &chunk.content) {
        total += PERCENT_BONUS;
    }
    if is_table(chunk) {
        total += TABLE_BONUS;
    }

    total.min(1.0)
}

fn matches(regex: &LazyLock<Option<Regex>>, text: &str) -> bool {
    regex.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
}

fn is_table(chunk: &RetrievedChunk) -> bool {
    chunk.metadata_bool("is_table")
        || ["chunk_type", "content_type", "element_type"]
            .iter()
            .filter_map(|key| chunk.metadata_str(key))
            .any(|kind| kind.eq_ignore_ascii_case("table"))
}

/// Lowercased text with non-alphanumerics collapsed to single spaces, padded
pub(crate) fn pad(text: &str) -> String {
    let normalized: Vec<String> = text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect();
    format!(" {} ", normalized.join(" "))
}

/// Whole-word containment, allowing a plural `s`
fn contains_word(padded: &str, keyword: &str) -> bool {
    let needle = pad(keyword);
    let needle = needle.trim();
    padded.contains(&format!(" {} ", needle)) || padded.contains(&format!(" {}s ", needle))
}
