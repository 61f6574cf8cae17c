//! Competing app listings for a keyword, from the public store search
//! API with a simulated fallback.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use kor_client::HttpClient;
use kor_core::{AppListing, AppListingSignal, SignalSource};
use tracing::warn;

use crate::forum::urlencode;
use crate::sim;

const STORE_SEARCH_BASE: &str = "https://itunes.apple.com/search";

/// Top competing listings considered per keyword.
pub const TOP_N_LISTINGS: usize = 10;

pub struct ListingFetcher {
    client: Arc<HttpClient>,
}

impl ListingFetcher {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Fetch the top competing listings for a keyword. Transport
    /// failures or an unusable body degrade to simulation.
    pub async fn fetch(&self, keyword: &str, country: &str) -> AppListingSignal {
        let url = format!(
            "{STORE_SEARCH_BASE}?term={}&country={}&entity=software&limit={TOP_N_LISTINGS}",
            urlencode(keyword),
            urlencode(&country.to_ascii_lowercase()),
        );

        let fetched = match self.client.fetch_json(&url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(keyword, error = %err, "listing fetch failed, using simulation");
                return sim::listings(keyword, TOP_N_LISTINGS);
            }
        };

        let (listings, total_results) = parse_search_results(&fetched.body);
        if listings.is_empty() {
            warn!(keyword, "listing response had no usable results, using simulation");
            return sim::listings(keyword, TOP_N_LISTINGS);
        }

        AppListingSignal {
            source: SignalSource::Real,
            listings,
            total_results,
        }
    }
}

/// Parse a store search response, discarding malformed result entries.
/// IAP, subscription, feature count and hardware flags come from
/// description heuristics since the search API does not expose them.
fn parse_search_results(body: &serde_json::Value) -> (Vec<AppListing>, u64) {
    let total_results = body
        .get("resultCount")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);

    let Some(results) = body.get("results").and_then(|v| v.as_array()) else {
        return (Vec::new(), total_results);
    };

    let listings = results
        .iter()
        .filter_map(|entry| {
            let title = entry.get("trackName")?.as_str()?.to_string();
            let rating = entry
                .get("averageUserRating")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let review_count = entry
                .get("userRatingCount")
                .and_then(|v| v.as_u64())
                .unwrap_or(0);
            let price = entry.get("price").and_then(|v| v.as_f64()).unwrap_or(0.0);
            let description = entry
                .get("description")
                .and_then(|v| v.as_str())
                .unwrap_or("");
            let lower = description.to_ascii_lowercase();

            let released_at = entry
                .get("releaseDate")
                .and_then(|v| v.as_str())
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc));

            Some(AppListing {
                title,
                rating,
                review_count,
                price,
                has_iap: lower.contains("in-app purchase") || lower.contains("premium"),
                has_subscription: lower.contains("subscription") || lower.contains("/month"),
                feature_count: feature_count_of(description),
                requires_hardware: lower.contains("apple watch required")
                    || lower.contains("requires external"),
                released_at,
            })
        })
        .collect();

    (listings, total_results)
}

/// Count feature-style bullet lines in a store description.
fn feature_count_of(description: &str) -> u32 {
    description
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with('-') || trimmed.starts_with('•') || trimmed.starts_with('*')
        })
        .count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_results_and_skips_malformed_entries() {
        let body = json!({
            "resultCount": 42,
            "results": [
                {
                    "trackName": "Habit Hero",
                    "averageUserRating": 4.6,
                    "userRatingCount": 1200,
                    "price": 2.99,
                    "releaseDate": "2024-06-01T00:00:00Z",
                    "description": "Track habits.\n- streaks\n- reminders\nIncludes in-app purchases."
                },
                {"no_track_name": true},
                {"trackName": "Bare App"}
            ]
        });
        let (listings, total) = parse_search_results(&body);
        assert_eq!(total, 42);
        assert_eq!(listings.len(), 2);
        assert_eq!(listings[0].title, "Habit Hero");
        assert_eq!(listings[0].feature_count, 2);
        assert!(listings[0].has_iap);
        assert!(!listings[0].has_subscription);
        assert!(listings[0].released_at.is_some());
        assert!(listings[1].released_at.is_none());
        assert_eq!(listings[1].review_count, 0);
    }

    #[test]
    fn empty_body_yields_no_listings() {
        let (listings, total) = parse_search_results(&json!({}));
        assert!(listings.is_empty());
        assert_eq!(total, 0);
    }

    #[test]
    fn bullet_styles_all_count() {
        assert_eq!(feature_count_of("• one\n - two\n* three\nplain"), 3);
    }
}
