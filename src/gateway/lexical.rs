//! Lexical scoring shared by the bundled gateways

use super::traits::{GatewayError, GatewayResult, SearchMode, SearchResult};
use crate::graph::NodeId;

/// Maximum hits returned for one query
pub const MAX_RESULTS: usize = 20;

/// Characters of context kept on each side of a match in a snippet
const SNIPPET_CONTEXT: usize = 40;

/// A searchable document: a node's title and persisted content
pub struct Candidate<'a> {
    pub id: &'a NodeId,
    pub title: &'a str,
    pub content: &'a str,
}

/// Rank candidates against `query`.
///
/// Title hits outweigh content hits; content hits saturate so a long
/// document cannot drown a title match. `Semantic` has no lexical
/// counterpart and is refused; `Hybrid` degrades to lexical.
pub fn search<'a>(
    query: &str,
    mode: SearchMode,
    candidates: impl IntoIterator<Item = Candidate<'a>>,
) -> GatewayResult<Vec<SearchResult>> {
    if mode == SearchMode::Semantic {
        return Err(GatewayError::UnsupportedMode(mode));
    }

    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(Vec::new());
    }

    let mut results: Vec<SearchResult> = candidates
        .into_iter()
        .filter_map(|c| score(&needle, &c))
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(MAX_RESULTS);
    Ok(results)
}

fn score(needle: &str, candidate: &Candidate<'_>) -> Option<SearchResult> {
    let title_hit = candidate.title.to_lowercase().contains(needle);
    let content_lower = candidate.content.to_lowercase();
    let content_hits = content_lower.matches(needle).count();

    if !title_hit && content_hits == 0 {
        return None;
    }

    let title_score: f32 = if title_hit { 1.0 } else { 0.0 };
    let score = title_score + (content_hits.min(5) as f32) * 0.1;
    let snippet = content_lower
        .find(needle)
        .map(|at| snippet_around(candidate.content, &content_lower, at, needle.len()))
        .unwrap_or_default();

    Some(SearchResult {
        id: candidate.id.clone(),
        title: candidate.title.to_string(),
        score,
        snippet,
    })
}

/// Cut a window around a match. Offsets come from the lowercased text, so
/// they are clamped to char boundaries of the original.
fn snippet_around(original: &str, lowered: &str, at: usize, len: usize) -> String {
    if lowered.len() != original.len() {
        // Lowercasing changed byte lengths; fall back to the leading text.
        return original.chars().take(SNIPPET_CONTEXT * 2).collect();
    }

    let mut start = at.saturating_sub(SNIPPET_CONTEXT);
    while !original.is_char_boundary(start) {
        start -= 1;
    }
    let mut end = (at + len + SNIPPET_CONTEXT).min(original.len());
    while !original.is_char_boundary(end) {
        end += 1;
    }

    let mut snippet = String::new();
    if start > 0 {
        snippet.push_str("...");
    }
    snippet.push_str(original[start..end].trim());
    if end < original.len() {
        snippet.push_str("...");
    }
    snippet
}
