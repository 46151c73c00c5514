// Metadata relevance: requested type, fiscal year, company, tags
use crate::rag::reranking::scorer::QueryProfile;
use crate::types::RetrievedChunk;
use crate::vector_store::DOC_TYPE_KEY;

pub const DOC_TYPE_BONUS: f32 = 0.3;
pub const FISCAL_YEAR_BONUS: f32 = 0.2;
pub const COMPANY_BONUS: f32 = 0.2;
pub const TAG_BONUS: f32 = 0.1;
pub const MAX_TAG_BONUS: f32 = 0.3;
pub const FINANCIAL_DATA_BONUS: f32 = 0.15;

/// Similarity plus additive bonuses, capped at 1.0
pub fn score(chunk: &RetrievedChunk, profile: &QueryProfile, doc_type: Option<&str>) -> f32 {
    let mut total = chunk.similarity_score;

    if let (Some(requested), Some(actual)) = (doc_type, chunk.metadata_str(DOC_TYPE_KEY)) {
        if requested.eq_ignore_ascii_case(actual) {
            total += DOC_TYPE_BONUS;
        }
    }

    if let Some(year) = fiscal_year(chunk) {
        if profile.fiscal_years.contains(&year) {
            total += FISCAL_YEAR_BONUS;
        }
    }

    let company_named = chunk
        .metadata_str("company")
        .into_iter()
        .chain(chunk.metadata_list("companies"))
        .any(|company| profile.mentions(company));
    if company_named {
        total += COMPANY_BONUS;
    }

    let tag_hits = chunk
        .metadata_list("tags")
        .into_iter()
        .filter(|tag| profile.mentions(tag))
        .count();
    total += (tag_hits as f32 * TAG_BONUS).min(MAX_TAG_BONUS);

    if chunk.metadata_bool("has_financial_data") {
        total += FINANCIAL_DATA_BONUS;
    }

    total.min(1.0)
}

/// Four-digit fiscal year of a chunk, from `fiscal_year` or `document_date`
fn fiscal_year(chunk: &RetrievedChunk) -> Option<u16> {
    if let Some(year) = chunk.metadata_f64("fiscal_year") {
        return Some(year as u16);
    }
    chunk
        .metadata_str("fiscal_year")
        .or_else(|| chunk.metadata_str("document_date"))
        .and_then(|raw| {
            raw.trim()
                .trim_start_matches(|c: char| matches!(c, 'f' | 'F' | 'y' | 'Y'))
                .get(..4)
        })
        .and_then(|digits| digits.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map, Value};

    fn chunk(metadata: Value) -> RetrievedChunk {
        let metadata: Map<String, Value> = metadata.as_object().cloned().unwrap_or_default();
        RetrievedChunk {
            chunk_id: "c".into(),
            partition: "p".into(),
            content: "text".into(),
            similarity_score: 0.2,
            metadata,
        }
    }

    #[test]
    fn test_no_bonus() {
        let profile = QueryProfile::new("anything");
        assert_eq!(score(&chunk(json!({})), &profile, None), 0.2);
    }

    #[test]
    fn test_each_bonus() {
        let profile = QueryProfile::new("Apple results for FY2024 in emea");
        let c = chunk(json!({
            "doc_type": "factsheet",
            "fiscal_year": "FY2024",
            "company": "Apple",
            "tags": ["emea", "apac"],
        }));
        let s = score(&c, &profile, None);
        assert!((s - 0.7).abs() < 1e-6);

        let s = score(&chunk(json!({"doc_type": "factsheet"})), &profile, Some("Factsheet"));
        assert!((s - 0.5).abs() < 1e-6);
        let s = score(&chunk(json!({"doc_type": "commentary"})), &profile, Some("Factsheet"));
        assert!((s - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_fiscal_year_from_date_and_number() {
        let profile = QueryProfile::new("2023 review");
        assert!(score(&chunk(json!({"document_date": "2023-06-30"})), &profile, None) > 0.2);
        assert!(score(&chunk(json!({"fiscal_year": 2023})), &profile, None) > 0.2);
    }

    #[test]
    fn test_capped() {
        let profile = QueryProfile::new("a b c d");
        let mut c = chunk(json!({
            "tags": ["a", "b", "c", "d"],
            "has_financial_data": true,
            "doc_type": "x",
        }));
        c.similarity_score = 0.5;
        assert!((score(&c, &profile, Some("x")) - 1.0).abs() < 1e-6);

        let only_tags = chunk(json!({"tags": "a, b, c, d"}));
        assert!((score(&only_tags, &profile, None) - 0.5).abs() < 1e-6);
    }
}
