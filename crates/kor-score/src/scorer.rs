//! Two-fidelity opportunity scorer: gathers signals through the
//! fetcher set, composes the five dimensions and derives the
//! human-readable summary fields.

use chrono::{DateTime, Utc};
use kor_core::{
    AppListingSignal, DimensionScores, Fidelity, KeywordCandidate, PainPointIntent,
    PainPointSignal, ScoredOpportunity, SocialSignal, TrendSignal,
};
use kor_signals::SignalFetchers;
use serde_json::json;
use tracing::info;

use crate::dimensions;

/// Everything a scoring pass works from. Basic fidelity leaves the
/// slow-source fields `None`.
#[derive(Debug, Clone, Default)]
pub struct SignalSet {
    pub listings: Option<AppListingSignal>,
    pub expansion: Vec<KeywordCandidate>,
    pub trend: Option<TrendSignal>,
    pub social: Option<SocialSignal>,
    pub pain_points: Option<PainPointSignal>,
}

pub struct OpportunityScorer {
    fetchers: SignalFetchers,
}

impl OpportunityScorer {
    pub fn new(fetchers: SignalFetchers) -> Self {
        Self { fetchers }
    }

    /// The underlying fetcher set, shared with the discover handler
    /// and the availability probes.
    pub fn fetchers(&self) -> &SignalFetchers {
        &self.fetchers
    }

    pub async fn score_basic(
        &self,
        keyword: &str,
        category: &str,
        country: &str,
    ) -> ScoredOpportunity {
        self.score(keyword, category, country, Fidelity::Basic).await
    }

    pub async fn score_full(
        &self,
        keyword: &str,
        category: &str,
        country: &str,
    ) -> ScoredOpportunity {
        self.score(keyword, category, country, Fidelity::Full).await
    }

    async fn score(
        &self,
        keyword: &str,
        category: &str,
        country: &str,
        fidelity: Fidelity,
    ) -> ScoredOpportunity {
        let signals = self.gather(keyword, category, country, fidelity).await;
        let scored = compose(keyword, category, country, fidelity, &signals, Utc::now());
        info!(
            keyword,
            fidelity = fidelity.as_str(),
            score = scored.opportunity_score,
            "scored opportunity"
        );
        scored
    }

    async fn gather(
        &self,
        keyword: &str,
        category: &str,
        country: &str,
        fidelity: Fidelity,
    ) -> SignalSet {
        let listings = self.fetchers.listings.fetch(keyword, country).await;
        let expansion = self
            .fetchers
            .expander
            .expand_seed_keyword(keyword, country, 1)
            .await;

        let mut signals = SignalSet {
            listings: Some(listings),
            expansion,
            ..SignalSet::default()
        };

        if fidelity == Fidelity::Full {
            signals.trend = Some(self.fetchers.trends.fetch(keyword, country).await);
            signals.social = Some(self.fetchers.social.fetch(keyword, category).await);
            signals.pain_points = Some(self.fetchers.pain_points.scan(keyword, category).await);
        }

        signals
    }
}

/// Pure composition step: dimensions, composite, summary text and the
/// provenance-tagged raw payload.
pub fn compose(
    keyword: &str,
    category: &str,
    country: &str,
    fidelity: Fidelity,
    signals: &SignalSet,
    now: DateTime<Utc>,
) -> ScoredOpportunity {
    let listings = signals.listings.as_ref();
    let expansion = (!signals.expansion.is_empty()).then_some(signals.expansion.as_slice());

    let dims = DimensionScores {
        competition_gap: dimensions::competition_gap(keyword, listings),
        market_demand: dimensions::market_demand(
            expansion,
            signals.trend.as_ref(),
            signals.social.as_ref(),
            listings,
        ),
        revenue_potential: dimensions::revenue_potential(listings),
        trend_momentum: dimensions::trend_momentum(
            signals.trend.as_ref(),
            if fidelity == Fidelity::Full { listings } else { None },
            signals.social.as_ref(),
            now,
        ),
        execution_feasibility: dimensions::execution_feasibility(keyword, listings),
    };

    ScoredOpportunity {
        keyword: keyword.to_string(),
        country: country.to_string(),
        category: category.to_string(),
        dimensions: dims,
        opportunity_score: dimensions::composite(&dims),
        fidelity,
        reasoning: reasoning_for(&dims, fidelity, signals),
        suggested_differentiator: differentiator_for(keyword, signals),
        top_competitor_weaknesses: weaknesses_for(signals),
        raw_data: raw_data_for(signals),
        scored_at: now,
    }
}

fn raw_data_for(signals: &SignalSet) -> serde_json::Value {
    json!({
        "app_listings": signals.listings,
        "expansion": signals.expansion,
        "trend": signals.trend,
        "social": signals.social,
        "pain_points": signals.pain_points,
    })
}

/// One-paragraph explanation naming the strongest and weakest
/// dimensions plus the pain-point read when one exists.
fn reasoning_for(dims: &DimensionScores, fidelity: Fidelity, signals: &SignalSet) -> String {
    let named = [
        ("competition gap", dims.competition_gap),
        ("market demand", dims.market_demand),
        ("revenue potential", dims.revenue_potential),
        ("trend momentum", dims.trend_momentum),
        ("execution feasibility", dims.execution_feasibility),
    ];
    let strongest = named
        .iter()
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or(&named[0]);
    let weakest = named
        .iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or(&named[0]);

    let mut out = format!(
        "Strongest dimension is {} at {:.0}; weakest is {} at {:.0}. Scored at {} fidelity.",
        strongest.0, strongest.1, weakest.0, weakest.1, fidelity.as_str()
    );
    if let Some(pain) = &signals.pain_points {
        out.push_str(&format!(
            " Pain-point signal strength {:.0} from {} classified posts.",
            pain.signal_strength,
            pain.posts.len()
        ));
    }
    out
}

/// Positioning suggestion derived from the most visible incumbent
/// weakness.
fn differentiator_for(keyword: &str, signals: &SignalSet) -> String {
    let Some(listings) = signals.listings.as_ref().filter(|l| !l.listings.is_empty()) else {
        return format!("first well-executed app dedicated to {keyword}");
    };

    let n = listings.listings.len() as f64;
    let sub_ratio = listings.listings.iter().filter(|l| l.has_subscription).count() as f64 / n;
    let avg_rating = listings.listings.iter().map(|l| l.rating).sum::<f64>() / n;
    let avg_features =
        listings.listings.iter().map(|l| l.feature_count as f64).sum::<f64>() / n;
    let hw_ratio = listings.listings.iter().filter(|l| l.requires_hardware).count() as f64 / n;

    if sub_ratio >= 0.5 {
        "one-time purchase pricing where incumbents demand subscriptions".to_string()
    } else if avg_rating < 4.0 {
        "polish and reliability where existing apps rate poorly".to_string()
    } else if avg_features > 15.0 {
        "a focused single-purpose experience against feature-bloated incumbents".to_string()
    } else if hw_ratio > 0.3 {
        "a software-only alternative to hardware-bound competitors".to_string()
    } else {
        format!("sharper niche positioning within {keyword}")
    }
}

/// Up to five concrete incumbent weaknesses, low-rated apps first,
/// then frustration-intent pain points.
fn weaknesses_for(signals: &SignalSet) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(listings) = &signals.listings {
        let mut low_rated: Vec<_> = listings
            .listings
            .iter()
            .filter(|l| l.review_count > 0 && l.rating < 4.0)
            .collect();
        low_rated.sort_by(|a, b| a.rating.total_cmp(&b.rating));
        for app in low_rated {
            out.push(format!(
                "{} averages {:.1} stars over {} reviews",
                app.title, app.rating, app.review_count
            ));
        }
    }

    if let Some(pain) = &signals.pain_points {
        for post in pain
            .posts
            .iter()
            .filter(|p| p.intent == PainPointIntent::Frustration)
        {
            out.push(post.title.clone());
        }
    }

    out.truncate(5);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use kor_core::{AppListing, PainPoint, SignalSource};

    fn listing(rating: f64, reviews: u64) -> AppListing {
        AppListing {
            title: format!("App {rating}"),
            rating,
            review_count: reviews,
            price: 0.0,
            has_iap: false,
            has_subscription: true,
            feature_count: 8,
            requires_hardware: false,
            released_at: None,
        }
    }

    fn basic_signals() -> SignalSet {
        SignalSet {
            listings: Some(AppListingSignal {
                source: SignalSource::Simulated,
                listings: vec![listing(3.5, 400), listing(4.6, 9000)],
                total_results: 240,
            }),
            expansion: vec![KeywordCandidate {
                term: "habit tracker app".to_string(),
                priority: 80.0,
            }],
            ..SignalSet::default()
        }
    }

    #[test]
    fn basic_composition_uses_neutral_momentum() {
        let scored = compose(
            "habit tracker",
            "productivity",
            "us",
            Fidelity::Basic,
            &basic_signals(),
            Utc::now(),
        );
        assert_eq!(scored.dimensions.trend_momentum, dimensions::NEUTRAL);
        assert_eq!(scored.fidelity, Fidelity::Basic);
        assert_eq!(
            scored.opportunity_score,
            dimensions::composite(&scored.dimensions)
        );
        assert!((0.0..=100.0).contains(&scored.opportunity_score));
    }

    #[test]
    fn full_composition_attaches_raw_payloads() {
        let mut signals = basic_signals();
        signals.trend = Some(TrendSignal {
            source: SignalSource::Simulated,
            interest: vec![40.0, 45.0, 50.0, 55.0],
        });
        signals.social = Some(SocialSignal {
            source: SignalSource::Simulated,
            mentions_30d: 43,
            mentions_7d: 10,
            avg_engagement: 12.0,
        });
        signals.pain_points = Some(PainPointSignal {
            source: SignalSource::Simulated,
            posts: vec![PainPoint {
                title: "So frustrated with every habit app".to_string(),
                url: "https://example.com/1".to_string(),
                score: 120,
                num_comments: 30,
                intent: PainPointIntent::Frustration,
            }],
            signal_strength: 22.0,
        });

        let scored = compose(
            "habit tracker",
            "productivity",
            "us",
            Fidelity::Full,
            &signals,
            Utc::now(),
        );
        assert_ne!(scored.dimensions.trend_momentum, dimensions::NEUTRAL);
        assert!(!scored.raw_data["trend"].is_null());
        assert_eq!(scored.raw_data["social"]["source"], "simulated");
        assert!(scored
            .top_competitor_weaknesses
            .iter()
            .any(|w| w.contains("frustrated")));
        assert!(scored.reasoning.contains("full fidelity"));
    }

    #[test]
    fn subscription_heavy_market_suggests_one_time_pricing() {
        let signals = basic_signals();
        assert!(compose("habit", "productivity", "us", Fidelity::Basic, &signals, Utc::now())
            .suggested_differentiator
            .contains("one-time purchase"));
    }

    #[test]
    fn weaknesses_lead_with_the_lowest_rated_incumbent() {
        let weaknesses = weaknesses_for(&basic_signals());
        assert_eq!(weaknesses.len(), 1);
        assert!(weaknesses[0].contains("3.5 stars"));
    }
}
