//! Postgres persistence: the durable job queue, the opportunity store
//! and the append-only scoring history.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use thiserror::Error;

pub mod jobs;
pub mod opportunities;

pub use jobs::{JobStore, PipelineStats};
pub use opportunities::{HistoryEntry, Opportunity, OpportunityStore};

pub const CRATE_NAME: &str = "kor-store";

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid {column} value in row: {value}")]
    InvalidColumn {
        column: &'static str,
        value: String,
    },
}

pub async fn connect(database_url: &str) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(8)
        .connect(database_url)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    MIGRATOR.run(pool).await?;
    Ok(())
}
