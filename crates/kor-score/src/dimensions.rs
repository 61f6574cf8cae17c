//! The five dimension calculators.
//!
//! Each is a pure function over an optional subset of the fetched
//! signals, returning 0–100. When the required signal set is entirely
//! absent the calculator returns the neutral default instead of
//! propagating an absence, so a composite score always exists.

use chrono::{DateTime, Duration, Utc};
use kor_core::{AppListingSignal, KeywordCandidate, SocialSignal, TrendSignal};

/// Substituted for any sub-signal (or whole dimension) whose upstream
/// data is absent.
pub const NEUTRAL: f64 = 50.0;

/// Fixed composite weights, in dimension order: competition gap,
/// market demand, revenue potential, trend momentum, execution
/// feasibility.
pub const COMPOSITE_WEIGHTS: [f64; 5] = [0.30, 0.25, 0.20, 0.15, 0.10];

/// Higher = weaker competition. Blend of title-keyword saturation
/// (30%), incumbent review strength (35%), rating penalty (20%) and
/// feature density (15%).
pub fn competition_gap(keyword: &str, listings: Option<&AppListingSignal>) -> f64 {
    let Some(signal) = listings else {
        return NEUTRAL;
    };
    if signal.listings.is_empty() {
        // Nobody competing at all.
        return 100.0;
    }

    let n = signal.listings.len() as f64;
    let lower_keyword = keyword.to_ascii_lowercase();
    let saturated = signal
        .listings
        .iter()
        .filter(|l| l.title.to_ascii_lowercase().contains(&lower_keyword))
        .count() as f64;
    let title_gap = (1.0 - saturated / n) * 100.0;

    let max_reviews = signal
        .listings
        .iter()
        .map(|l| l.review_count)
        .max()
        .unwrap_or(0) as f64;
    let review_strength = ((max_reviews + 1.0).log10() / 6.0).min(1.0);
    let review_gap = (1.0 - review_strength) * 100.0;

    let avg_rating = signal.listings.iter().map(|l| l.rating).sum::<f64>() / n;
    let rating_penalty = ((5.0 - avg_rating) / 2.5 * 100.0).clamp(0.0, 100.0);

    let avg_features = signal.listings.iter().map(|l| l.feature_count as f64).sum::<f64>() / n;
    let feature_gap = (1.0 - (avg_features / 25.0).min(1.0)) * 100.0;

    let score =
        0.30 * title_gap + 0.35 * review_gap + 0.20 * rating_penalty + 0.15 * feature_gap;
    score.clamp(0.0, 100.0)
}

/// Autosuggest priority (40%), trend interest (30%), social velocity
/// (20%), raw result count (10%). Each part falls back to neutral
/// independently; all absent yields the neutral default outright.
pub fn market_demand(
    expansion: Option<&[KeywordCandidate]>,
    trend: Option<&TrendSignal>,
    social: Option<&SocialSignal>,
    listings: Option<&AppListingSignal>,
) -> f64 {
    let suggest = expansion
        .filter(|c| !c.is_empty())
        .map(|c| c.iter().map(|k| k.priority).sum::<f64>() / c.len() as f64)
        .unwrap_or(NEUTRAL);

    let interest = trend
        .filter(|t| !t.interest.is_empty())
        .map(|t| t.interest.iter().sum::<f64>() / t.interest.len() as f64)
        .unwrap_or(NEUTRAL);

    let velocity = social.map(SocialSignal::growth_rate).unwrap_or(NEUTRAL);

    let result_count = listings
        .map(|l| ((l.total_results as f64 + 1.0).log10() / 5.0).min(1.0) * 100.0)
        .unwrap_or(NEUTRAL);

    let score = 0.40 * suggest + 0.30 * interest + 0.20 * velocity + 0.10 * result_count;
    score.clamp(0.0, 100.0)
}

/// Average price (25%), IAP ratio (35%), subscription presence (25%),
/// review-count proxy (15%) across the incumbent listings.
pub fn revenue_potential(listings: Option<&AppListingSignal>) -> f64 {
    let Some(signal) = listings else {
        return NEUTRAL;
    };
    if signal.listings.is_empty() {
        return NEUTRAL;
    }

    let n = signal.listings.len() as f64;
    let avg_price = signal.listings.iter().map(|l| l.price).sum::<f64>() / n;
    let price_score = (avg_price / 10.0).min(1.0) * 100.0;

    let iap_ratio = signal.listings.iter().filter(|l| l.has_iap).count() as f64 / n;
    let sub_ratio = signal.listings.iter().filter(|l| l.has_subscription).count() as f64 / n;

    let avg_reviews = signal.listings.iter().map(|l| l.review_count as f64).sum::<f64>() / n;
    let review_proxy = ((avg_reviews + 1.0).log10() / 6.0).min(1.0) * 100.0;

    let score = 0.25 * price_score
        + 0.35 * iap_ratio * 100.0
        + 0.25 * sub_ratio * 100.0
        + 0.15 * review_proxy;
    score.clamp(0.0, 100.0)
}

/// Interest-series slope (50%), competitors released inside 90 days
/// (25%), social growth (25%).
pub fn trend_momentum(
    trend: Option<&TrendSignal>,
    listings: Option<&AppListingSignal>,
    social: Option<&SocialSignal>,
    now: DateTime<Utc>,
) -> f64 {
    if trend.is_none() && listings.is_none() && social.is_none() {
        return NEUTRAL;
    }

    // Slope is interest points per week; +-4/week saturates the scale.
    let slope_score = trend
        .filter(|t| t.interest.len() >= 2)
        .map(|t| (NEUTRAL + linreg_slope(&t.interest) * 12.5).clamp(0.0, 100.0))
        .unwrap_or(NEUTRAL);

    let new_competitors = listings
        .filter(|l| l.listings.iter().any(|a| a.released_at.is_some()))
        .map(|l| {
            let cutoff = now - Duration::days(90);
            let recent = l
                .listings
                .iter()
                .filter(|a| a.released_at.is_some_and(|d| d >= cutoff))
                .count() as f64;
            (recent * 20.0).min(100.0)
        })
        .unwrap_or(NEUTRAL);

    let growth = social.map(SocialSignal::growth_rate).unwrap_or(NEUTRAL);

    let score = 0.50 * slope_score + 0.25 * new_competitors + 0.25 * growth;
    score.clamp(0.0, 100.0)
}

/// Inverted average feature count (40%), inverted API dependency (30%),
/// hardware-requirement penalty (30%).
pub fn execution_feasibility(keyword: &str, listings: Option<&AppListingSignal>) -> f64 {
    let Some(signal) = listings else {
        return NEUTRAL;
    };
    if signal.listings.is_empty() {
        return NEUTRAL;
    }

    let n = signal.listings.len() as f64;
    let avg_features = signal.listings.iter().map(|l| l.feature_count as f64).sum::<f64>() / n;
    let feature_score = (1.0 - (avg_features / 25.0).min(1.0)) * 100.0;

    let api_score = (1.0 - api_dependency(keyword)) * 100.0;

    let hw_ratio = signal.listings.iter().filter(|l| l.requires_hardware).count() as f64 / n;
    let hardware_score = (1.0 - hw_ratio) * 100.0;

    let score = 0.40 * feature_score + 0.30 * api_score + 0.30 * hardware_score;
    score.clamp(0.0, 100.0)
}

/// Composite opportunity score, rounded to one decimal.
pub fn composite(dims: &kor_core::DimensionScores) -> f64 {
    let parts = [
        dims.competition_gap,
        dims.market_demand,
        dims.revenue_potential,
        dims.trend_momentum,
        dims.execution_feasibility,
    ];
    let score: f64 = parts
        .iter()
        .zip(COMPOSITE_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    (score * 10.0).round() / 10.0
}

/// Ordinary least-squares slope over equally spaced points.
pub fn linreg_slope(series: &[f64]) -> f64 {
    let n = series.len() as f64;
    if series.len() < 2 {
        return 0.0;
    }
    let mean_x = (n - 1.0) / 2.0;
    let mean_y = series.iter().sum::<f64>() / n;
    let mut num = 0.0;
    let mut den = 0.0;
    for (idx, y) in series.iter().enumerate() {
        let dx = idx as f64 - mean_x;
        num += dx * (y - mean_y);
        den += dx * dx;
    }
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}

/// Rough 0..1 estimate of how much the idea depends on third-party
/// data feeds, from the keyword itself.
fn api_dependency(keyword: &str) -> f64 {
    const FEED_TERMS: &[&str] = &[
        "weather", "stock", "crypto", "flight", "translation", "navigation", "news",
        "currency", "score", "transit",
    ];
    const SYNC_TERMS: &[&str] = &["sync", "cloud", "share", "social", "chat", "multiplayer"];

    let lower = keyword.to_ascii_lowercase();
    let mut dep: f64 = 0.15;
    if FEED_TERMS.iter().any(|t| lower.contains(t)) {
        dep += 0.45;
    }
    if SYNC_TERMS.iter().any(|t| lower.contains(t)) {
        dep += 0.25;
    }
    dep.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kor_core::{AppListing, DimensionScores, SignalSource};

    fn listing(rating: f64, reviews: u64, features: u32) -> AppListing {
        AppListing {
            title: "Test App".to_string(),
            rating,
            review_count: reviews,
            price: 0.0,
            has_iap: false,
            has_subscription: false,
            feature_count: features,
            requires_hardware: false,
            released_at: None,
        }
    }

    fn signal(listings: Vec<AppListing>) -> AppListingSignal {
        AppListingSignal {
            source: SignalSource::Simulated,
            total_results: 100,
            listings,
        }
    }

    #[test]
    fn composite_is_the_fixed_weight_dot_product() {
        let dims = DimensionScores {
            competition_gap: 80.0,
            market_demand: 60.0,
            revenue_potential: 40.0,
            trend_momentum: 20.0,
            execution_feasibility: 90.0,
        };
        assert_eq!(composite(&dims), 59.0);
    }

    #[test]
    fn absent_signal_sets_yield_the_neutral_default() {
        assert_eq!(competition_gap("x", None), NEUTRAL);
        assert_eq!(market_demand(None, None, None, None), NEUTRAL);
        assert_eq!(revenue_potential(None), NEUTRAL);
        assert_eq!(trend_momentum(None, None, None, Utc::now()), NEUTRAL);
        assert_eq!(execution_feasibility("x", None), NEUTRAL);
    }

    #[test]
    fn all_dimensions_stay_clamped() {
        let crowded = signal(
            (0..10)
                .map(|_| {
                    let mut l = listing(5.0, 10_000_000, 40);
                    l.title = "habit tracker".to_string();
                    l
                })
                .collect(),
        );
        let empty = signal(vec![]);
        for sig in [&crowded, &empty] {
            for v in [
                competition_gap("habit tracker", Some(sig)),
                revenue_potential(Some(sig)),
                execution_feasibility("habit tracker", Some(sig)),
            ] {
                assert!((0.0..=100.0).contains(&v), "out of range: {v}");
            }
        }
    }

    #[test]
    fn weak_incumbents_widen_the_gap() {
        let weak = signal(vec![listing(3.0, 50, 5), listing(3.2, 80, 6)]);
        let strong = signal(vec![listing(4.8, 500_000, 22), listing(4.9, 900_000, 25)]);
        assert!(
            competition_gap("habit", Some(&weak)) > competition_gap("habit", Some(&strong))
        );
    }

    #[test]
    fn no_competition_maxes_the_gap() {
        assert_eq!(competition_gap("habit", Some(&signal(vec![]))), 100.0);
    }

    #[test]
    fn monetized_incumbents_raise_revenue_potential() {
        let free = signal(vec![listing(4.0, 100, 5); 4]);
        let mut paid_listings = vec![listing(4.0, 100, 5); 4];
        for l in &mut paid_listings {
            l.price = 6.99;
            l.has_iap = true;
            l.has_subscription = true;
        }
        let paid = signal(paid_listings);
        assert!(revenue_potential(Some(&paid)) > revenue_potential(Some(&free)));
    }

    #[test]
    fn linreg_slope_matches_known_lines() {
        assert_eq!(linreg_slope(&[0.0, 1.0, 2.0, 3.0]), 1.0);
        assert_eq!(linreg_slope(&[5.0, 5.0, 5.0]), 0.0);
        assert!(linreg_slope(&[9.0, 6.0, 3.0]) < 0.0);
        assert_eq!(linreg_slope(&[1.0]), 0.0);
    }

    #[test]
    fn rising_series_beats_falling_series() {
        let rising = TrendSignal {
            source: SignalSource::Simulated,
            interest: (0..20).map(|i| 30.0 + i as f64 * 2.0).collect(),
        };
        let falling = TrendSignal {
            source: SignalSource::Simulated,
            interest: (0..20).map(|i| 70.0 - i as f64 * 2.0).collect(),
        };
        let now = Utc::now();
        assert!(
            trend_momentum(Some(&rising), None, None, now)
                > trend_momentum(Some(&falling), None, None, now)
        );
    }

    #[test]
    fn feed_heavy_keywords_are_harder_to_execute() {
        let plain = signal(vec![listing(4.0, 100, 8); 3]);
        assert!(
            execution_feasibility("habit journal", Some(&plain))
                > execution_feasibility("weather radar sync", Some(&plain))
        );
    }
}
