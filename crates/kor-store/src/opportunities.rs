//! The `opportunities` table and its append-only scoring history.
//!
//! The scorer's upsert is the only writer of opportunity rows; history
//! rows are inserted once per scoring pass and never touched again.

use chrono::{DateTime, Utc};
use kor_core::{DimensionScores, Fidelity, OpportunityStatus, ScoredOpportunity};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::StoreError;

const COLUMNS: &str = "\
    id, keyword, country, category, competition_gap, market_demand, \
    revenue_potential, trend_momentum, execution_feasibility, \
    opportunity_score, status, reasoning, suggested_differentiator, \
    top_competitor_weaknesses, raw_data, enrichment_level, scored_at, \
    created_at";

/// A persisted opportunity row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Opportunity {
    pub id: Uuid,
    pub keyword: String,
    pub country: String,
    pub category: String,
    pub dimensions: DimensionScores,
    pub opportunity_score: f64,
    pub status: OpportunityStatus,
    pub reasoning: String,
    pub suggested_differentiator: String,
    pub top_competitor_weaknesses: Vec<String>,
    pub raw_data: serde_json::Value,
    pub enrichment_level: Fidelity,
    pub scored_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// One append-only history row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub opportunity_id: Uuid,
    pub dimensions: DimensionScores,
    pub opportunity_score: f64,
    pub enrichment_level: Fidelity,
    pub scored_at: DateTime<Utc>,
}

pub struct OpportunityStore;

impl OpportunityStore {
    /// Upsert keyed on `(keyword, country)` plus one history append, in
    /// one transaction. A full-fidelity pass after a basic one rewrites
    /// the same row in place. Returns the opportunity id.
    pub async fn record(pool: &PgPool, scored: &ScoredOpportunity) -> Result<Uuid, StoreError> {
        let mut tx = pool.begin().await?;
        let id = Self::upsert(&mut tx, scored).await?;
        Self::insert_history(&mut tx, id, scored).await?;
        tx.commit().await?;
        info!(
            keyword = %scored.keyword,
            country = %scored.country,
            score = scored.opportunity_score,
            enrichment = scored.fidelity.as_str(),
            "recorded opportunity"
        );
        Ok(id)
    }

    async fn upsert(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        scored: &ScoredOpportunity,
    ) -> Result<Uuid, StoreError> {
        let dims = &scored.dimensions;
        let row: (Uuid,) = sqlx::query_as(
            "INSERT INTO opportunities ( \
                 keyword, country, category, competition_gap, market_demand, \
                 revenue_potential, trend_momentum, execution_feasibility, \
                 opportunity_score, reasoning, suggested_differentiator, \
                 top_competitor_weaknesses, raw_data, enrichment_level, scored_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
             ON CONFLICT (keyword, country) DO UPDATE SET \
                 category = EXCLUDED.category, \
                 competition_gap = EXCLUDED.competition_gap, \
                 market_demand = EXCLUDED.market_demand, \
                 revenue_potential = EXCLUDED.revenue_potential, \
                 trend_momentum = EXCLUDED.trend_momentum, \
                 execution_feasibility = EXCLUDED.execution_feasibility, \
                 opportunity_score = EXCLUDED.opportunity_score, \
                 reasoning = EXCLUDED.reasoning, \
                 suggested_differentiator = EXCLUDED.suggested_differentiator, \
                 top_competitor_weaknesses = EXCLUDED.top_competitor_weaknesses, \
                 raw_data = EXCLUDED.raw_data, \
                 enrichment_level = EXCLUDED.enrichment_level, \
                 scored_at = EXCLUDED.scored_at \
             RETURNING id",
        )
        .bind(&scored.keyword)
        .bind(&scored.country)
        .bind(&scored.category)
        .bind(dims.competition_gap)
        .bind(dims.market_demand)
        .bind(dims.revenue_potential)
        .bind(dims.trend_momentum)
        .bind(dims.execution_feasibility)
        .bind(scored.opportunity_score)
        .bind(&scored.reasoning)
        .bind(&scored.suggested_differentiator)
        .bind(&scored.top_competitor_weaknesses)
        .bind(&scored.raw_data)
        .bind(scored.fidelity.as_str())
        .bind(scored.scored_at)
        .fetch_one(&mut **tx)
        .await?;
        Ok(row.0)
    }

    async fn insert_history(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        opportunity_id: Uuid,
        scored: &ScoredOpportunity,
    ) -> Result<(), StoreError> {
        let dims = &scored.dimensions;
        sqlx::query(
            "INSERT INTO opportunity_history ( \
                 opportunity_id, competition_gap, market_demand, \
                 revenue_potential, trend_momentum, execution_feasibility, \
                 opportunity_score, enrichment_level, scored_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(opportunity_id)
        .bind(dims.competition_gap)
        .bind(dims.market_demand)
        .bind(dims.revenue_potential)
        .bind(dims.trend_momentum)
        .bind(dims.execution_feasibility)
        .bind(scored.opportunity_score)
        .bind(scored.fidelity.as_str())
        .bind(scored.scored_at)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    /// Highest-scoring opportunities first.
    pub async fn list(pool: &PgPool, limit: i64) -> Result<Vec<Opportunity>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM opportunities \
             ORDER BY opportunity_score DESC LIMIT $1"
        );
        let rows = sqlx::query(&query).bind(limit).fetch_all(pool).await?;
        rows.iter().map(opportunity_from_row).collect()
    }

    pub async fn find(
        pool: &PgPool,
        keyword: &str,
        country: &str,
    ) -> Result<Option<Opportunity>, StoreError> {
        let query = format!(
            "SELECT {COLUMNS} FROM opportunities WHERE keyword = $1 AND country = $2"
        );
        let row = sqlx::query(&query)
            .bind(keyword)
            .bind(country)
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(opportunity_from_row).transpose()
    }

    /// All history rows for a keyword, oldest first, across countries.
    pub async fn history_for(
        pool: &PgPool,
        keyword: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let rows = sqlx::query(
            "SELECT h.id, h.opportunity_id, h.competition_gap, h.market_demand, \
                    h.revenue_potential, h.trend_momentum, h.execution_feasibility, \
                    h.opportunity_score, h.enrichment_level, h.scored_at \
             FROM opportunity_history h \
             JOIN opportunities o ON o.id = h.opportunity_id \
             WHERE o.keyword = $1 \
             ORDER BY h.scored_at ASC",
        )
        .bind(keyword)
        .fetch_all(pool)
        .await?;
        rows.iter().map(history_from_row).collect()
    }
}

fn dimensions_from_row(row: &PgRow) -> Result<DimensionScores, StoreError> {
    Ok(DimensionScores {
        competition_gap: row.try_get("competition_gap")?,
        market_demand: row.try_get("market_demand")?,
        revenue_potential: row.try_get("revenue_potential")?,
        trend_momentum: row.try_get("trend_momentum")?,
        execution_feasibility: row.try_get("execution_feasibility")?,
    })
}

fn enrichment_from_row(row: &PgRow) -> Result<Fidelity, StoreError> {
    let raw: String = row.try_get("enrichment_level")?;
    match raw.as_str() {
        "basic" => Ok(Fidelity::Basic),
        "full" => Ok(Fidelity::Full),
        other => Err(StoreError::InvalidColumn {
            column: "enrichment_level",
            value: other.to_string(),
        }),
    }
}

fn opportunity_from_row(row: &PgRow) -> Result<Opportunity, StoreError> {
    let status_raw: String = row.try_get("status")?;
    let status = match status_raw.as_str() {
        "new" => OpportunityStatus::New,
        "selected" => OpportunityStatus::Selected,
        "blueprinted" => OpportunityStatus::Blueprinted,
        other => {
            return Err(StoreError::InvalidColumn {
                column: "status",
                value: other.to_string(),
            })
        }
    };

    Ok(Opportunity {
        id: row.try_get("id")?,
        keyword: row.try_get("keyword")?,
        country: row.try_get("country")?,
        category: row.try_get("category")?,
        dimensions: dimensions_from_row(row)?,
        opportunity_score: row.try_get("opportunity_score")?,
        status,
        reasoning: row.try_get("reasoning")?,
        suggested_differentiator: row.try_get("suggested_differentiator")?,
        top_competitor_weaknesses: row.try_get("top_competitor_weaknesses")?,
        raw_data: row.try_get("raw_data")?,
        enrichment_level: enrichment_from_row(row)?,
        scored_at: row.try_get("scored_at")?,
        created_at: row.try_get("created_at")?,
    })
}

fn history_from_row(row: &PgRow) -> Result<HistoryEntry, StoreError> {
    Ok(HistoryEntry {
        id: row.try_get("id")?,
        opportunity_id: row.try_get("opportunity_id")?,
        dimensions: dimensions_from_row(row)?,
        opportunity_score: row.try_get("opportunity_score")?,
        enrichment_level: enrichment_from_row(row)?,
        scored_at: row.try_get("scored_at")?,
    })
}
