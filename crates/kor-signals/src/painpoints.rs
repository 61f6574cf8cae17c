//! Pain-point scanner: intent-pattern forum queries, first-match
//! classification, URL dedup and a 0–100 signal strength.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use kor_core::{PainPoint, PainPointIntent, PainPointSignal, SignalSource};
use tracing::warn;

use crate::forum::{ForumDirectory, ForumSearchBackend};
use crate::sim;

/// Fixed intent-pattern queries run against every forum for a keyword.
const INTENT_QUERIES: &[&str] = &[
    "wish there was an app",
    "looking for an app",
    "app recommendation",
    "frustrated with app",
];

/// Ordered classification table; the first matching category wins, and
/// posts that match nothing are discarded rather than defaulted.
const INTENT_PHRASES: &[(PainPointIntent, &[&str])] = &[
    (
        PainPointIntent::Wish,
        &["i wish", "wish there was", "if only there was", "would love an app"],
    ),
    (
        PainPointIntent::LookingFor,
        &["looking for", "is there an app", "searching for", "need an app"],
    ),
    (
        PainPointIntent::Frustration,
        &["frustrated", "frustrating", "annoying", "hate that", "fed up", "so bad"],
    ),
    (
        PainPointIntent::RecommendationRequest,
        &["recommend", "recommendation", "what app do you", "best app for"],
    ),
];

/// Classify a post title into exactly one intent, or none.
pub fn classify(title: &str) -> Option<PainPointIntent> {
    let lower = title.to_ascii_lowercase();
    for (intent, phrases) in INTENT_PHRASES {
        if phrases.iter().any(|phrase| lower.contains(phrase)) {
            return Some(*intent);
        }
    }
    None
}

/// signal_strength = min(quantity + quality + intent_bonus, 100):
/// quantity = min(n·5, 50),
/// quality  = min(log10(avg_score+1)·15 + log10(avg_comments+1)·15, 50),
/// intent_bonus = min(3·|wish ∪ looking_for|, 15).
pub fn signal_strength(posts: &[PainPoint]) -> f64 {
    if posts.is_empty() {
        return 0.0;
    }
    let n = posts.len() as f64;
    let avg_score = posts.iter().map(|p| p.score as f64).sum::<f64>() / n;
    let avg_comments = posts.iter().map(|p| p.num_comments as f64).sum::<f64>() / n;
    let demand_count = posts
        .iter()
        .filter(|p| matches!(p.intent, PainPointIntent::Wish | PainPointIntent::LookingFor))
        .count() as f64;

    let quantity = (n * 5.0).min(50.0);
    let quality =
        ((avg_score + 1.0).log10() * 15.0 + (avg_comments + 1.0).log10() * 15.0).min(50.0);
    let intent_bonus = (demand_count * 3.0).min(15.0);

    (quantity + quality + intent_bonus).min(100.0)
}

pub struct PainPointScanner {
    backend: Arc<dyn ForumSearchBackend>,
    directory: ForumDirectory,
    inter_request_delay: Duration,
}

impl PainPointScanner {
    pub fn new(
        backend: Arc<dyn ForumSearchBackend>,
        directory: ForumDirectory,
        inter_request_delay: Duration,
    ) -> Self {
        Self {
            backend,
            directory,
            inter_request_delay,
        }
    }

    /// Run every intent query against every category forum, classify,
    /// dedup by URL, and score. Degrades to simulation when nothing
    /// usable comes back.
    pub async fn scan(&self, keyword: &str, category: &str) -> PainPointSignal {
        let forums = self.directory.forums_for(category);
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut posts: Vec<PainPoint> = Vec::new();
        let mut first_request = true;

        for forum in &forums {
            for query in INTENT_QUERIES {
                if !first_request {
                    tokio::time::sleep(self.inter_request_delay).await;
                }
                first_request = false;

                let search = format!("{keyword} {query}");
                let found = match self.backend.search(forum, &search).await {
                    Ok(found) => found,
                    Err(err) => {
                        warn!(forum, query, error = %err, "pain-point query failed, continuing");
                        continue;
                    }
                };

                for post in found {
                    let Some(intent) = classify(&post.title) else {
                        continue;
                    };
                    if !seen_urls.insert(post.url.clone()) {
                        continue;
                    }
                    posts.push(PainPoint {
                        title: post.title,
                        url: post.url,
                        score: post.score,
                        num_comments: post.num_comments,
                        intent,
                    });
                }
            }
        }

        if posts.is_empty() {
            return sim::pain_points(keyword);
        }

        let strength = signal_strength(&posts);
        PainPointSignal {
            source: SignalSource::Real,
            posts,
            signal_strength: strength,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pp(score: u64, comments: u64, intent: PainPointIntent) -> PainPoint {
        PainPoint {
            title: String::new(),
            url: format!("u{score}-{comments}"),
            score,
            num_comments: comments,
            intent,
        }
    }

    #[test]
    fn first_matching_category_wins() {
        // "i wish" (Wish) appears before "looking for" in the table.
        assert_eq!(
            classify("I wish there was an app, been looking for one"),
            Some(PainPointIntent::Wish)
        );
        assert_eq!(
            classify("Looking for a frustrating puzzle"),
            Some(PainPointIntent::LookingFor)
        );
        assert_eq!(classify("Weekly progress thread"), None);
    }

    #[test]
    fn strength_is_zero_for_no_posts() {
        assert_eq!(signal_strength(&[]), 0.0);
    }

    #[test]
    fn strength_never_exceeds_one_hundred() {
        let posts: Vec<_> = (0..50)
            .map(|i| pp(10_000 + i, 5_000, PainPointIntent::Wish))
            .collect();
        assert!(signal_strength(&posts) <= 100.0);
    }

    #[test]
    fn strength_monotone_in_post_count() {
        let few: Vec<_> = (0..3).map(|_| pp(10, 5, PainPointIntent::Frustration)).collect();
        let more: Vec<_> = (0..6).map(|_| pp(10, 5, PainPointIntent::Frustration)).collect();
        assert!(signal_strength(&more) > signal_strength(&few));
    }

    #[test]
    fn strength_monotone_in_engagement() {
        let quiet: Vec<_> = (0..4).map(|_| pp(2, 1, PainPointIntent::Frustration)).collect();
        let loud: Vec<_> = (0..4).map(|_| pp(500, 120, PainPointIntent::Frustration)).collect();
        assert!(signal_strength(&loud) > signal_strength(&quiet));
    }

    #[test]
    fn demand_intents_add_a_capped_bonus() {
        let neutral: Vec<_> = (0..4)
            .map(|_| pp(10, 5, PainPointIntent::Frustration))
            .collect();
        let demand: Vec<_> = (0..4).map(|_| pp(10, 5, PainPointIntent::Wish)).collect();
        let diff = signal_strength(&demand) - signal_strength(&neutral);
        assert!((diff - 12.0).abs() < 1e-9);

        let many_demand: Vec<_> = (0..10).map(|_| pp(10, 5, PainPointIntent::Wish)).collect();
        let many_neutral: Vec<_> = (0..10)
            .map(|_| pp(10, 5, PainPointIntent::Frustration))
            .collect();
        let capped = signal_strength(&many_demand) - signal_strength(&many_neutral);
        assert!((capped - 15.0).abs() < 1e-9);
    }
}
