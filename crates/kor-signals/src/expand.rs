//! Autosuggest-style keyword expansion for the discover job.

use std::collections::HashSet;
use std::sync::Arc;

use kor_client::HttpClient;
use kor_core::KeywordCandidate;
use tracing::warn;

use crate::forum::urlencode;
use crate::sim;

const SUGGEST_BASE: &str = "https://suggestqueries.google.com/complete/search";

/// Modifier prefixes appended to the seed at depth >= 2 to widen the
/// suggestion net beyond the bare seed query.
const DEPTH_MODIFIERS: &[&str] = &["app", "for", "best", "free", "vs"];

pub struct KeywordExpander {
    client: Arc<HttpClient>,
}

impl KeywordExpander {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Expand a seed keyword into scoring candidates with descending
    /// priority. Degrades to the simulated expansion on failure so the
    /// discover job always produces candidates.
    pub async fn expand_seed_keyword(
        &self,
        seed: &str,
        country: &str,
        depth: usize,
    ) -> Vec<KeywordCandidate> {
        let mut queries = vec![seed.to_string()];
        if depth >= 2 {
            for modifier in DEPTH_MODIFIERS {
                queries.push(format!("{seed} {modifier}"));
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut candidates: Vec<KeywordCandidate> = Vec::new();
        let mut any_success = false;

        for query in &queries {
            let url = format!(
                "{SUGGEST_BASE}?client=firefox&hl={}&q={}",
                urlencode(&country.to_ascii_lowercase()),
                urlencode(query),
            );
            let fetched = match self.client.fetch_json(&url).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    warn!(query, error = %err, "suggest fetch failed, skipping query");
                    continue;
                }
            };
            any_success = true;
            for term in parse_suggestions(&fetched.body) {
                let normalized = term.trim().to_ascii_lowercase();
                if normalized.is_empty() || normalized == seed.to_ascii_lowercase() {
                    continue;
                }
                if seen.insert(normalized.clone()) {
                    candidates.push(KeywordCandidate {
                        term: normalized,
                        priority: 0.0,
                    });
                }
            }
        }

        if !any_success || candidates.is_empty() {
            warn!(seed, "no usable suggestions, using simulated expansion");
            return sim::candidates(seed, depth);
        }

        // Earlier discovery means higher priority, on the same 0..100
        // scale the simulated expansion uses.
        let step = 90.0 / candidates.len() as f64;
        for (idx, candidate) in candidates.iter_mut().enumerate() {
            candidate.priority = (95.0 - idx as f64 * step).max(5.0);
        }
        candidates
    }
}

/// The suggest endpoint answers `[query, [suggestion, ...], ...]`.
fn parse_suggestions(body: &serde_json::Value) -> Vec<String> {
    body.as_array()
        .and_then(|outer| outer.get(1))
        .and_then(|v| v.as_array())
        .map(|suggestions| {
            suggestions
                .iter()
                .filter_map(|s| s.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_firefox_style_payload() {
        let body = json!(["habit", ["habit tracker", "habit stacking", 3]]);
        assert_eq!(
            parse_suggestions(&body),
            vec!["habit tracker".to_string(), "habit stacking".to_string()]
        );
    }

    #[test]
    fn non_array_payload_yields_nothing() {
        assert!(parse_suggestions(&json!({"unexpected": true})).is_empty());
        assert!(parse_suggestions(&json!([])).is_empty());
    }
}
