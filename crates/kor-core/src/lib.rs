//! Core domain model for the keyword opportunity pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CRATE_NAME: &str = "kor-core";

/// Provenance tag on every fetched signal, so downstream consumers can
/// disclose whether numbers came from a live backend or the seeded
/// simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    Real,
    Simulated,
}

/// Scoring fidelity: `Basic` uses only fast always-available sources,
/// `Full` adds trend, social and pain-point signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Fidelity {
    Basic,
    Full,
}

impl Fidelity {
    pub fn as_str(self) -> &'static str {
        match self {
            Fidelity::Basic => "basic",
            Fidelity::Full => "full",
        }
    }
}

/// One competing app listing returned by the app-store source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppListing {
    pub title: String,
    pub rating: f64,
    pub review_count: u64,
    pub price: f64,
    pub has_iap: bool,
    pub has_subscription: bool,
    pub feature_count: u32,
    pub requires_hardware: bool,
    /// Store release date, when the source exposes one.
    pub released_at: Option<DateTime<Utc>>,
}

/// Top-N incumbent listings for a keyword plus the raw result count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppListingSignal {
    pub source: SignalSource,
    pub listings: Vec<AppListing>,
    pub total_results: u64,
}

/// A candidate keyword produced by autosuggest expansion.
/// `priority` is the 0–100 suggestion rank weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordCandidate {
    pub term: String,
    pub priority: f64,
}

/// Trend-interest series for a keyword. `interest` holds normalized
/// 0–100 weekly points, oldest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignal {
    pub source: SignalSource,
    pub interest: Vec<f64>,
}

impl TrendSignal {
    pub fn current_interest(&self) -> f64 {
        self.interest.last().copied().unwrap_or(0.0)
    }
}

/// Aggregated social-discussion activity over the trailing 30/7 days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialSignal {
    pub source: SignalSource,
    pub mentions_30d: u64,
    pub mentions_7d: u64,
    pub avg_engagement: f64,
}

impl SocialSignal {
    /// Weekly mention velocity relative to the 30-day baseline,
    /// normalized so a flat week equals 50.
    pub fn growth_rate(&self) -> f64 {
        if self.mentions_30d == 0 {
            return 0.0;
        }
        let weekly_baseline = self.mentions_30d as f64 / 4.3;
        if weekly_baseline <= 0.0 {
            return 0.0;
        }
        (self.mentions_7d as f64 / weekly_baseline * 50.0).clamp(0.0, 100.0)
    }
}

/// The single intent category a pain-point post is classified into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PainPointIntent {
    Wish,
    LookingFor,
    Frustration,
    RecommendationRequest,
}

/// One classified discussion post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainPoint {
    pub title: String,
    pub url: String,
    pub score: u64,
    pub num_comments: u64,
    pub intent: PainPointIntent,
}

/// Output of the pain-point scanner: classified posts plus the
/// 0–100 composite signal strength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PainPointSignal {
    pub source: SignalSource,
    pub posts: Vec<PainPoint>,
    pub signal_strength: f64,
}

impl PainPointSignal {
    pub fn count_with_intent(&self, intent: PainPointIntent) -> usize {
        self.posts.iter().filter(|p| p.intent == intent).count()
    }
}

/// The five 0–100 dimension scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DimensionScores {
    pub competition_gap: f64,
    pub market_demand: f64,
    pub revenue_potential: f64,
    pub trend_momentum: f64,
    pub execution_feasibility: f64,
}

/// A fully scored opportunity, ready for upsert.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredOpportunity {
    pub keyword: String,
    pub country: String,
    pub category: String,
    pub dimensions: DimensionScores,
    pub opportunity_score: f64,
    pub fidelity: Fidelity,
    pub reasoning: String,
    pub suggested_differentiator: String,
    pub top_competitor_weaknesses: Vec<String>,
    /// Nested per-fetcher payloads, each tagged with its `source`.
    pub raw_data: serde_json::Value,
    pub scored_at: DateTime<Utc>,
}

/// Opportunity lifecycle status (`selected`/`blueprinted` transitions
/// are driven by callers outside the pipeline).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityStatus {
    New,
    Selected,
    Blueprinted,
}

impl OpportunityStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OpportunityStatus::New => "new",
            OpportunityStatus::Selected => "selected",
            OpportunityStatus::Blueprinted => "blueprinted",
        }
    }
}

/// Pipeline job type. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Discover,
    ScoreBasic,
    EnrichFull,
}

impl JobType {
    pub fn as_str(self) -> &'static str {
        match self {
            JobType::Discover => "discover",
            JobType::ScoreBasic => "score_basic",
            JobType::EnrichFull => "enrich_full",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "discover" => Some(JobType::Discover),
            "score_basic" => Some(JobType::ScoreBasic),
            "enrich_full" => Some(JobType::EnrichFull),
            _ => None,
        }
    }

    /// The fidelity a scoring job runs at; `None` for discover jobs.
    pub fn fidelity(self) -> Option<Fidelity> {
        match self {
            JobType::Discover => None,
            JobType::ScoreBasic => Some(Fidelity::Basic),
            JobType::EnrichFull => Some(Fidelity::Full),
        }
    }
}

/// Pipeline job status. Legal transitions:
/// pending → running → completed, or running → pending (retry) while
/// `retry_count < max_retries`, or running → failed once the retry
/// budget is exhausted. Terminal states are never left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input {
            "pending" => Some(JobStatus::Pending),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Parameters of a `discover` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoverParams {
    pub seed: String,
    pub category: String,
    pub country: String,
}

/// Parameters of a `score_basic` / `enrich_full` job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreParams {
    pub keyword: String,
    pub category: String,
    pub country: String,
}

/// A row from the `jobs` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineJob {
    pub id: Uuid,
    pub job_type: JobType,
    pub status: JobStatus,
    pub priority: i32,
    pub params: serde_json::Value,
    pub total_items: Option<i32>,
    pub processed_items: Option<i32>,
    pub result: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub retry_count: i32,
    pub max_retries: i32,
    /// Earliest claim time; pushed forward by retry backoff.
    pub run_after: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl PipelineJob {
    pub fn discover_params(&self) -> Option<DiscoverParams> {
        serde_json::from_value(self.params.clone()).ok()
    }

    pub fn score_params(&self) -> Option<ScoreParams> {
        serde_json::from_value(self.params.clone()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_type_round_trips_through_str() {
        for ty in [JobType::Discover, JobType::ScoreBasic, JobType::EnrichFull] {
            assert_eq!(JobType::parse(ty.as_str()), Some(ty));
        }
        assert_eq!(JobType::parse("score"), None);
    }

    #[test]
    fn terminal_statuses_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn growth_rate_is_fifty_for_a_flat_week() {
        let signal = SocialSignal {
            source: SignalSource::Simulated,
            mentions_30d: 43,
            mentions_7d: 10,
            avg_engagement: 3.0,
        };
        assert!((signal.growth_rate() - 50.0).abs() < 0.5);
    }

    #[test]
    fn growth_rate_handles_zero_baseline() {
        let signal = SocialSignal {
            source: SignalSource::Simulated,
            mentions_30d: 0,
            mentions_7d: 0,
            avg_engagement: 0.0,
        };
        assert_eq!(signal.growth_rate(), 0.0);
    }

    #[test]
    fn scoring_job_types_carry_their_fidelity() {
        assert_eq!(JobType::ScoreBasic.fidelity(), Some(Fidelity::Basic));
        assert_eq!(JobType::EnrichFull.fidelity(), Some(Fidelity::Full));
        assert_eq!(JobType::Discover.fidelity(), None);
    }
}
