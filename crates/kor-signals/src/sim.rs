//! Deterministic simulated signals, seeded by a hash of the keyword.
//!
//! Stands in for paid or rate-limited backends: the same keyword always
//! produces byte-identical output, distinct keywords diverge, and every
//! value stays in the plausible range of its real counterpart.

use chrono::{DateTime, Duration, Utc};
use kor_core::{
    AppListing, AppListingSignal, KeywordCandidate, PainPoint, PainPointIntent, PainPointSignal,
    SignalSource, SocialSignal, TrendSignal,
};
use sha2::{Digest, Sha256};

use crate::painpoints;

/// Day-stable anchor so repeated calls within a day stay identical.
fn midnight_today() -> DateTime<Utc> {
    Utc::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .expect("midnight is valid")
        .and_utc()
}

/// Stable 64-bit seed for a keyword, taken from the first eight bytes
/// of its SHA-256 digest.
pub fn keyword_seed(keyword: &str) -> u64 {
    let digest = Sha256::digest(keyword.as_bytes());
    u64::from_be_bytes(digest[..8].try_into().expect("digest is 32 bytes"))
}

// Per-source salts keep the streams independent: a keyword's trend
// series and social counts should not be correlated.
const TREND_SALT: u64 = 0x7472_656e_6400;
const SOCIAL_SALT: u64 = 0x736f_6369_616c;
const LISTING_SALT: u64 = 0x6c69_7374;
const EXPAND_SALT: u64 = 0x6578_7061_6e64;
const PAIN_SALT: u64 = 0x7061_696e;

fn rng_for(keyword: &str, salt: u64) -> fastrand::Rng {
    fastrand::Rng::with_seed(keyword_seed(keyword) ^ salt)
}

/// 26 weekly interest points with a per-keyword baseline and drift.
pub fn trend(keyword: &str) -> TrendSignal {
    let mut rng = rng_for(keyword, TREND_SALT);
    let baseline = 20.0 + rng.f64() * 50.0;
    let drift = rng.f64() * 2.0 - 0.8;
    let mut interest = Vec::with_capacity(26);
    for week in 0..26 {
        let noise = rng.f64() * 14.0 - 7.0;
        let point = baseline + drift * week as f64 + noise;
        interest.push(point.clamp(0.0, 100.0));
    }
    TrendSignal {
        source: SignalSource::Simulated,
        interest,
    }
}

pub fn social(keyword: &str) -> SocialSignal {
    let mut rng = rng_for(keyword, SOCIAL_SALT);
    let mentions_30d = rng.u64(5..400);
    // Keep the 7-day share between a quiet and a hot week.
    let share = 0.1 + rng.f64() * 0.3;
    let mentions_7d = ((mentions_30d as f64) * share).round() as u64;
    SocialSignal {
        source: SignalSource::Simulated,
        mentions_30d,
        mentions_7d,
        avg_engagement: 1.0 + rng.f64() * 40.0,
    }
}

pub fn listings(keyword: &str, top_n: usize) -> AppListingSignal {
    let mut rng = rng_for(keyword, LISTING_SALT);
    let total_results = rng.u64(10..5000);
    let count = top_n.min(total_results as usize);
    let mut listings = Vec::with_capacity(count);
    for rank in 0..count {
        let keyword_in_title = rng.f64() < 0.6;
        let title = if keyword_in_title {
            format!("{} - {}", title_case(keyword), APP_SUFFIXES[rank % APP_SUFFIXES.len()])
        } else {
            format!("{}{}", BRAND_STEMS[rank % BRAND_STEMS.len()], rng.u32(10..99))
        };
        listings.push(AppListing {
            title,
            rating: ((2.8 + rng.f64() * 2.1) * 10.0).round() / 10.0,
            review_count: rng.u64(0..120_000),
            price: if rng.f64() < 0.7 { 0.0 } else { (rng.f64() * 9.0 * 100.0).round() / 100.0 + 0.99 },
            has_iap: rng.f64() < 0.65,
            has_subscription: rng.f64() < 0.4,
            feature_count: rng.u32(3..28),
            requires_hardware: rng.f64() < 0.12,
            released_at: Some(midnight_today() - Duration::days(rng.i64(14..1100))),
        });
    }
    AppListingSignal {
        source: SignalSource::Simulated,
        listings,
        total_results,
    }
}

pub fn candidates(seed: &str, depth: usize) -> Vec<KeywordCandidate> {
    let mut rng = rng_for(seed, EXPAND_SALT);
    let count = (depth.max(1) * 4).min(EXPANSION_MODIFIERS.len());
    let mut out = Vec::with_capacity(count);
    for (rank, modifier) in EXPANSION_MODIFIERS.iter().take(count).enumerate() {
        out.push(KeywordCandidate {
            term: format!("{seed} {modifier}"),
            priority: (95.0 - rank as f64 * 6.0 - rng.f64() * 4.0).max(5.0),
        });
    }
    out
}

pub fn pain_points(keyword: &str) -> PainPointSignal {
    let mut rng = rng_for(keyword, PAIN_SALT);
    let count = rng.usize(2..18);
    let mut posts = Vec::with_capacity(count);
    for idx in 0..count {
        let (template, intent) = PAIN_TEMPLATES[rng.usize(0..PAIN_TEMPLATES.len())];
        posts.push(PainPoint {
            title: template.replace("{kw}", keyword),
            url: format!("https://reddit.com/r/simulated/comments/{:x}{idx}", keyword_seed(keyword) & 0xffff),
            score: rng.u64(1..900),
            num_comments: rng.u64(0..220),
            intent,
        });
    }
    let strength = painpoints::signal_strength(&posts);
    PainPointSignal {
        source: SignalSource::Simulated,
        posts,
        signal_strength: strength,
    }
}

const APP_SUFFIXES: &[&str] = &["Tracker", "Planner", "Pro", "Coach", "Journal", "Manager", "Buddy"];
const BRAND_STEMS: &[&str] = &["Zen", "Flow", "Nova", "Pulse", "Loop", "Habit", "Spark"];

const EXPANSION_MODIFIERS: &[&str] = &[
    "app", "tracker", "free", "for beginners", "planner", "reminder", "journal", "widget",
    "offline", "for kids", "with friends", "no ads",
];

const PAIN_TEMPLATES: &[(&str, PainPointIntent)] = &[
    ("I wish there was an app for {kw}", PainPointIntent::Wish),
    ("Looking for a good {kw} app", PainPointIntent::LookingFor),
    ("So frustrated with every {kw} app I try", PainPointIntent::Frustration),
    ("Any recommendations for {kw} apps?", PainPointIntent::RecommendationRequest),
    ("Is there an app that does {kw} properly?", PainPointIntent::LookingFor),
    ("Why is every {kw} app subscription only, this is annoying", PainPointIntent::Frustration),
];

fn title_case(input: &str) -> String {
    input
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_keyword_is_byte_identical() {
        assert_eq!(trend("habit tracker"), trend("habit tracker"));
        assert_eq!(social("habit tracker"), social("habit tracker"));
        assert_eq!(listings("habit tracker", 10), listings("habit tracker", 10));
        assert_eq!(candidates("habit tracker", 2), candidates("habit tracker", 2));
    }

    #[test]
    fn distinct_keywords_diverge() {
        assert_ne!(trend("habit tracker").interest, trend("sleep tracker").interest);
        assert_ne!(keyword_seed("a"), keyword_seed("b"));
    }

    #[test]
    fn trend_points_stay_in_range() {
        let signal = trend("budget planner");
        assert_eq!(signal.interest.len(), 26);
        assert!(signal.interest.iter().all(|p| (0.0..=100.0).contains(p)));
    }

    #[test]
    fn social_week_never_exceeds_month() {
        for kw in ["a", "plant care", "meal prep", "zzz"] {
            let s = social(kw);
            assert!(s.mentions_7d <= s.mentions_30d);
        }
    }

    #[test]
    fn everything_is_tagged_simulated() {
        assert_eq!(trend("x").source, SignalSource::Simulated);
        assert_eq!(social("x").source, SignalSource::Simulated);
        assert_eq!(listings("x", 5).source, SignalSource::Simulated);
        assert_eq!(pain_points("x").source, SignalSource::Simulated);
    }
}
