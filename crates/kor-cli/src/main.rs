use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use kor_pipeline::{Pipeline, PipelineConfig};
use kor_store::{JobStore, OpportunityStore};
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "kor")]
#[command(about = "Keyword Opportunity Radar command-line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run pending database migrations.
    Migrate,
    /// Enqueue a discover job for a seed keyword.
    Discover {
        seed: String,
        #[arg(long, default_value = "productivity")]
        category: String,
        #[arg(long, default_value = "us")]
        country: String,
        #[arg(long, default_value_t = 0)]
        priority: i32,
    },
    /// Claim and process queued jobs.
    Work {
        #[arg(long, default_value_t = 10)]
        max_jobs: usize,
    },
    /// Score one keyword immediately, outside the queue.
    Score {
        keyword: String,
        #[arg(long, default_value = "productivity")]
        category: String,
        #[arg(long, default_value = "us")]
        country: String,
        /// Full fidelity: trend, social and pain-point signals too.
        #[arg(long)]
        full: bool,
    },
    /// Print queue statistics.
    Stats,
    /// Serve the JSON API, with the cron scheduler when enabled.
    Serve,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::from_env();

    match cli.command {
        Commands::Migrate => {
            let pool = kor_store::connect(&config.database_url).await?;
            kor_store::run_migrations(&pool).await?;
            println!("migrations applied");
        }
        Commands::Discover {
            seed,
            category,
            country,
            priority,
        } => {
            let pool = kor_store::connect(&config.database_url).await?;
            let pipeline = Pipeline::new(config, pool)?;
            let (job_id, created) = pipeline
                .enqueue_discover(&seed, &category, &country, priority)
                .await?;
            if created {
                println!("queued discover job {job_id} for seed '{seed}'");
            } else {
                println!("discover job {job_id} for seed '{seed}' already queued");
            }
        }
        Commands::Work { max_jobs } => {
            let pool = kor_store::connect(&config.database_url).await?;
            let pipeline = Pipeline::new(config, pool)?;
            let processed = pipeline.process_jobs(max_jobs, None).await?;
            println!("processed {processed} job(s)");
        }
        Commands::Score {
            keyword,
            category,
            country,
            full,
        } => {
            let pool = kor_store::connect(&config.database_url).await?;
            let pipeline = Pipeline::new(config, pool)?;
            let scored = if full {
                pipeline.score_opportunity(&keyword, &category, &country).await?
            } else {
                pipeline
                    .score_opportunity_basic(&keyword, &category, &country)
                    .await?
            };
            println!(
                "{}: score {:.1} ({} fidelity)",
                scored.keyword,
                scored.opportunity_score,
                scored.fidelity.as_str()
            );
            println!("  reasoning: {}", scored.reasoning);
            println!("  differentiator: {}", scored.suggested_differentiator);
            for weakness in &scored.top_competitor_weaknesses {
                println!("  weakness: {weakness}");
            }
        }
        Commands::Stats => {
            let pool = kor_store::connect(&config.database_url).await?;
            let stats = JobStore::pipeline_stats(&pool).await?;
            println!("pending:   {}", stats.pending_count);
            println!("running:   {}", stats.running_count);
            println!("completed today: {}", stats.completed_today);
            println!("failed today:    {}", stats.failed_today);
            match stats.avg_processing_time_ms {
                Some(avg) => println!("avg processing:  {avg:.0} ms"),
                None => println!("avg processing:  n/a"),
            }
            let top = OpportunityStore::list(&pool, 10).await?;
            if !top.is_empty() {
                println!("top opportunities:");
                for opp in top {
                    println!(
                        "  {:>5.1}  {} ({})",
                        opp.opportunity_score, opp.keyword, opp.country
                    );
                }
            }
        }
        Commands::Serve => {
            let pool = kor_store::connect(&config.database_url).await?;
            let pipeline = Arc::new(Pipeline::new(config, pool)?);
            if let Some(scheduler) = pipeline.maybe_build_scheduler().await? {
                scheduler.start().await?;
                info!("cron scheduler started");
            }
            kor_web::serve(pipeline).await?;
        }
    }

    Ok(())
}
