//! Search-interest time series, real when an API key is configured and
//! simulated otherwise.

use std::sync::Arc;

use kor_client::HttpClient;
use kor_core::{SignalSource, TrendSignal};
use tracing::{debug, warn};

use crate::forum::urlencode;
use crate::sim;

const TREND_API_BASE: &str = "https://serpapi.com/search.json";

pub struct TrendsFetcher {
    client: Arc<HttpClient>,
    api_key: Option<String>,
}

impl TrendsFetcher {
    pub fn new(client: Arc<HttpClient>, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }

    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Fetch weekly interest points for a keyword. Any upstream failure
    /// or unparseable body degrades to the simulated series.
    pub async fn fetch(&self, keyword: &str, country: &str) -> TrendSignal {
        let Some(api_key) = &self.api_key else {
            debug!(keyword, "no trend API key configured, using simulation");
            return sim::trend(keyword);
        };

        let url = format!(
            "{TREND_API_BASE}?engine=google_trends&q={}&geo={}&date=today+12-m&api_key={api_key}",
            urlencode(keyword),
            urlencode(&country.to_ascii_uppercase()),
        );

        let fetched = match self.client.fetch_json(&url).await {
            Ok(fetched) => fetched,
            Err(err) => {
                warn!(keyword, error = %err, "trend fetch failed, using simulation");
                return sim::trend(keyword);
            }
        };

        match parse_interest_series(&fetched.body) {
            Some(interest) if !interest.is_empty() => TrendSignal {
                source: SignalSource::Real,
                interest,
            },
            _ => {
                warn!(keyword, "trend response had no usable series, using simulation");
                sim::trend(keyword)
            }
        }
    }
}

/// Pull the timeline values out of a trends response, tolerating
/// missing or oddly-typed entries by skipping them.
fn parse_interest_series(body: &serde_json::Value) -> Option<Vec<f64>> {
    let timeline = body
        .get("interest_over_time")?
        .get("timeline_data")?
        .as_array()?;

    let mut interest = Vec::with_capacity(timeline.len());
    for point in timeline {
        let Some(values) = point.get("values").and_then(|v| v.as_array()) else {
            continue;
        };
        let Some(value) = values.first().and_then(|v| v.get("extracted_value")) else {
            continue;
        };
        if let Some(n) = value.as_f64() {
            interest.push(n.clamp(0.0, 100.0));
        }
    }
    Some(interest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_timeline_values() {
        let body = json!({
            "interest_over_time": {
                "timeline_data": [
                    {"values": [{"extracted_value": 42}]},
                    {"values": [{"extracted_value": 61.5}]},
                    {"no_values": true},
                    {"values": [{"extracted_value": 150}]},
                ]
            }
        });
        let series = parse_interest_series(&body).unwrap();
        assert_eq!(series, vec![42.0, 61.5, 100.0]);
    }

    #[test]
    fn missing_sections_yield_none() {
        assert!(parse_interest_series(&json!({})).is_none());
        assert!(parse_interest_series(&json!({"interest_over_time": {}})).is_none());
    }

    #[tokio::test]
    async fn missing_key_uses_simulation() {
        let client = Arc::new(
            kor_client::HttpClient::new(kor_client::HttpClientConfig::default()).unwrap(),
        );
        let fetcher = TrendsFetcher::new(client, None);
        assert!(!fetcher.is_available());
        let signal = fetcher.fetch("habit tracker", "us").await;
        assert_eq!(signal.source, SignalSource::Simulated);
        assert_eq!(signal, sim::trend("habit tracker"));
    }
}
