//! The `jobs` table: idempotent enqueue, atomic claim, retry
//! bookkeeping and the aggregate stats query.

use std::time::Duration;

use chrono::{DateTime, Utc};
use kor_core::{JobStatus, JobType, PipelineJob};
use serde_json::Value;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::StoreError;

/// Column list for `jobs` queries.
const COLUMNS: &str = "\
    id, job_type, status, priority, params, total_items, \
    processed_items, result, error_message, retry_count, max_retries, \
    run_after, created_at, started_at, completed_at";

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct PipelineStats {
    pub pending_count: i64,
    pub running_count: i64,
    pub completed_today: i64,
    pub failed_today: i64,
    pub avg_processing_time_ms: Option<f64>,
}

/// Queue operations for pipeline jobs.
pub struct JobStore;

impl JobStore {
    /// Idempotent enqueue: at most one non-terminal job per
    /// `(job_type, keyword-or-seed, country)`. Returns the surviving
    /// job id and whether this call created it.
    pub async fn create_if_not_exists(
        pool: &PgPool,
        job_type: JobType,
        params: &Value,
        priority: i32,
        max_retries: i32,
    ) -> Result<(Uuid, bool), StoreError> {
        loop {
            let inserted: Option<(Uuid,)> = sqlx::query_as(
                "INSERT INTO jobs (job_type, params, priority, max_retries) \
                 VALUES ($1, $2, $3, $4) \
                 ON CONFLICT DO NOTHING \
                 RETURNING id",
            )
            .bind(job_type.as_str())
            .bind(params)
            .bind(priority)
            .bind(max_retries)
            .fetch_optional(pool)
            .await?;

            if let Some((id,)) = inserted {
                return Ok((id, true));
            }

            // Lost to the partial unique index; find the surviving row.
            let (key_field, key) = idempotency_key(params);
            let country = params.get("country").and_then(Value::as_str).unwrap_or("");
            let query = format!(
                "SELECT id FROM jobs \
                 WHERE job_type = $1 AND params->>'{key_field}' = $2 \
                   AND params->>'country' = $3 \
                   AND status IN ('pending', 'running') \
                 LIMIT 1"
            );
            let existing: Option<(Uuid,)> = sqlx::query_as(&query)
                .bind(job_type.as_str())
                .bind(key)
                .bind(country)
                .fetch_optional(pool)
                .await?;
            match existing {
                Some((id,)) => return Ok((id, false)),
                // The conflicting job reached a terminal state between the
                // insert and the select, so the insert can succeed now.
                None => continue,
            }
        }
    }

    /// Atomically claim the next ready job. At most one concurrent
    /// caller receives a given job (`FOR UPDATE SKIP LOCKED`). Jobs
    /// left `running` past the claim lease are reclaimed as well.
    pub async fn claim_next(
        pool: &PgPool,
        job_types: &[JobType],
        claim_lease: Duration,
    ) -> Result<Option<PipelineJob>, StoreError> {
        let types: Vec<&str> = job_types.iter().map(|t| t.as_str()).collect();
        let query = format!(
            "UPDATE jobs \
             SET status = 'running', started_at = NOW() \
             WHERE id = ( \
                 SELECT id FROM jobs \
                 WHERE job_type = ANY($1) \
                   AND ((status = 'pending' AND run_after <= NOW()) \
                        OR (status = 'running' \
                            AND started_at < NOW() - make_interval(secs => $2))) \
                 ORDER BY priority DESC, created_at ASC \
                 LIMIT 1 \
                 FOR UPDATE SKIP LOCKED \
             ) \
             RETURNING {COLUMNS}"
        );
        let row = sqlx::query(&query)
            .bind(&types)
            .bind(claim_lease.as_secs_f64())
            .fetch_optional(pool)
            .await?;
        row.as_ref().map(job_from_row).transpose()
    }

    /// Success path: write the result and stamp `completed_at`.
    pub async fn complete_job(
        pool: &PgPool,
        id: Uuid,
        result: &Value,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE jobs \
             SET status = 'completed', result = $2, completed_at = NOW() \
             WHERE id = $1 AND status = 'running'",
        )
        .bind(id)
        .bind(result)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Failure path: bump `retry_count` and either requeue with the
    /// backoff applied or finalize as `failed`. Returns the status the
    /// job ended up in.
    pub async fn fail_job(
        pool: &PgPool,
        id: Uuid,
        error: &str,
        retry_backoff: Duration,
    ) -> Result<JobStatus, StoreError> {
        let mut tx = pool.begin().await?;

        let counters: Option<(i32, i32)> = sqlx::query_as(
            "SELECT retry_count, max_retries FROM jobs \
             WHERE id = $1 AND status = 'running' FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((retry_count, max_retries)) = counters else {
            // Already finalized by another worker.
            tx.rollback().await?;
            return Err(StoreError::Database(sqlx::Error::RowNotFound));
        };

        let next = next_status_after_failure(retry_count, max_retries);
        match next {
            JobStatus::Pending => {
                sqlx::query(
                    "UPDATE jobs \
                     SET status = 'pending', retry_count = retry_count + 1, \
                         error_message = $2, started_at = NULL, \
                         run_after = NOW() + make_interval(secs => $3) \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(error)
                .bind(retry_backoff.as_secs_f64())
                .execute(&mut *tx)
                .await?;
            }
            _ => {
                sqlx::query(
                    "UPDATE jobs \
                     SET status = 'failed', retry_count = retry_count + 1, \
                         error_message = $2, completed_at = NOW() \
                     WHERE id = $1",
                )
                .bind(id)
                .bind(error)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        info!(job_id = %id, status = next.as_str(), "job failed");
        Ok(next)
    }

    /// Update the discover progress counters.
    pub async fn update_progress(
        pool: &PgPool,
        id: Uuid,
        total_items: i32,
        processed_items: i32,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE jobs SET total_items = $2, processed_items = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(total_items)
        .bind(processed_items)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<PipelineJob>, StoreError> {
        let query = format!("SELECT {COLUMNS} FROM jobs WHERE id = $1");
        let row = sqlx::query(&query).bind(id).fetch_optional(pool).await?;
        row.as_ref().map(job_from_row).transpose()
    }

    pub async fn pipeline_stats(pool: &PgPool) -> Result<PipelineStats, StoreError> {
        let row = sqlx::query(
            "SELECT \
                 COUNT(*) FILTER (WHERE status = 'pending') AS pending_count, \
                 COUNT(*) FILTER (WHERE status = 'running') AS running_count, \
                 COUNT(*) FILTER (WHERE status = 'completed' \
                     AND completed_at >= date_trunc('day', NOW())) AS completed_today, \
                 COUNT(*) FILTER (WHERE status = 'failed' \
                     AND completed_at >= date_trunc('day', NOW())) AS failed_today, \
                 AVG(EXTRACT(EPOCH FROM (completed_at - started_at)) * 1000.0) \
                     FILTER (WHERE status = 'completed' \
                         AND completed_at >= date_trunc('day', NOW())) \
                     AS avg_processing_time_ms \
             FROM jobs",
        )
        .fetch_one(pool)
        .await?;

        Ok(PipelineStats {
            pending_count: row.try_get("pending_count")?,
            running_count: row.try_get("running_count")?,
            completed_today: row.try_get("completed_today")?,
            failed_today: row.try_get("failed_today")?,
            avg_processing_time_ms: row.try_get("avg_processing_time_ms")?,
        })
    }
}

/// Retry state machine: a failure while `retry_count < max_retries - 1`
/// requeues the job, otherwise it finalizes as failed. `retry_count`
/// is the value before this failure is recorded.
pub fn next_status_after_failure(retry_count: i32, max_retries: i32) -> JobStatus {
    if retry_count + 1 >= max_retries {
        JobStatus::Failed
    } else {
        JobStatus::Pending
    }
}

/// The params field the partial unique index keys on.
fn idempotency_key(params: &Value) -> (&'static str, &str) {
    if let Some(keyword) = params.get("keyword").and_then(Value::as_str) {
        ("keyword", keyword)
    } else {
        (
            "seed",
            params.get("seed").and_then(Value::as_str).unwrap_or(""),
        )
    }
}

fn job_from_row(row: &PgRow) -> Result<PipelineJob, StoreError> {
    let job_type_raw: String = row.try_get("job_type")?;
    let job_type = JobType::parse(&job_type_raw).ok_or(StoreError::InvalidColumn {
        column: "job_type",
        value: job_type_raw.clone(),
    })?;
    let status_raw: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_raw).ok_or(StoreError::InvalidColumn {
        column: "status",
        value: status_raw.clone(),
    })?;

    Ok(PipelineJob {
        id: row.try_get("id")?,
        job_type,
        status,
        priority: row.try_get("priority")?,
        params: row.try_get("params")?,
        total_items: row.try_get("total_items")?,
        processed_items: row.try_get("processed_items")?,
        result: row.try_get("result")?,
        error_message: row.try_get("error_message")?,
        retry_count: row.try_get("retry_count")?,
        max_retries: row.try_get("max_retries")?,
        run_after: row.try_get::<DateTime<Utc>, _>("run_after")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn three_failures_at_three_retries_finalize_failed() {
        let max_retries = 3;
        let mut retry_count = 0;
        let mut transitions = Vec::new();
        loop {
            // Each iteration is one pending→running claim plus failure.
            let next = next_status_after_failure(retry_count, max_retries);
            retry_count += 1;
            transitions.push(next);
            if next == JobStatus::Failed {
                break;
            }
        }
        assert_eq!(
            transitions,
            vec![JobStatus::Pending, JobStatus::Pending, JobStatus::Failed]
        );
        assert_eq!(retry_count, 3);
    }

    #[test]
    fn zero_retry_budget_fails_immediately() {
        assert_eq!(next_status_after_failure(0, 0), JobStatus::Failed);
        assert_eq!(next_status_after_failure(0, 1), JobStatus::Failed);
    }

    #[test]
    fn idempotency_key_prefers_keyword_over_seed() {
        let score = json!({"keyword": "habit tracker", "country": "us"});
        assert_eq!(idempotency_key(&score), ("keyword", "habit tracker"));
        let discover = json!({"seed": "habit", "country": "us"});
        assert_eq!(idempotency_key(&discover), ("seed", "habit"));
    }
}
