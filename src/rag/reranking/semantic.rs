// Lexical-semantic relevance: phrase match, term overlap, match position
use crate::rag::reranking::scorer::QueryProfile;
use crate::types::RetrievedChunk;

/// Weight of an exact phrase hit inside the raw score
const PHRASE_WEIGHT: f32 = 2.0;

/// Sum of the maximum raw component values (phrase + overlap + position)
const RAW_SCALE: f32 = PHRASE_WEIGHT + 1.0 + 1.0;

/// Chunks shorter than this many tokens are penalized
pub const SHORT_CHUNK_TOKENS: usize = 50;

pub fn score(chunk: &RetrievedChunk, profile: &QueryProfile) -> f32 {
    let content = chunk.content.to_lowercase();

    let phrase = if !profile.phrase.is_empty() && content.contains(&profile.phrase) {
        PHRASE_WEIGHT
    } else {
        0.0
    };

    let raw = (phrase + overlap(&content, profile) + position(&content, profile)) / RAW_SCALE;
    let blended = 0.5 * chunk.similarity_score + 0.5 * raw;

    (blended * length_factor(chunk.token_count())).clamp(0.0, 1.0)
}

/// Fraction of query terms present in the content
fn overlap(content: &str, profile: &QueryProfile) -> f32 {
    if profile.terms.is_empty() {
        return 0.0;
    }
    let matched = profile
        .terms
        .iter()
        .filter(|term| content.contains(term.as_str()))
        .count();
    matched as f32 / profile.terms.len() as f32
}

/// 1.0 when a query term opens the chunk, decaying linearly to 0 at the end
fn position(content: &str, profile: &QueryProfile) -> f32 {
    if content.is_empty() {
        return 0.0;
    }
    profile
        .terms
        .iter()
        .filter_map(|term| content.find(term.as_str()))
        .min()
        .map(|first| 1.0 - first as f32 / content.len() as f32)
        .unwrap_or(0.0)
}

fn length_factor(tokens: usize) -> f32 {
    if tokens < SHORT_CHUNK_TOKENS {
        0.8 + 0.2 * tokens as f32 / SHORT_CHUNK_TOKENS as f32
    } else {
        1.0
    }
}
