use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scout::config::Config;
use scout::db::Database;
use scout::discovery::{HttpDiscovery, SEARCH_CHANNEL};
use scout::llm::{OracleApiClient, ORACLE_CHANNEL};
use scout::ratelimit::RateLimiter;
use scout::services::{JobReport, SourcingAgent};

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "Candidate sourcing agent: discover, score, and draft outreach")]
struct Args {
    /// Single job description to process
    #[arg(long, conflicts_with = "jobs_file")]
    job: Option<String>,

    /// File containing job descriptions, one per line
    #[arg(long)]
    jobs_file: Option<std::path::PathBuf>,

    /// Number of top candidates to draft outreach for
    #[arg(long)]
    top_candidates: Option<usize>,

    /// Write the full JSON report to this file
    #[arg(long)]
    output: Option<std::path::PathBuf>,

    /// Ignore cached scores and recompute every candidate
    #[arg(long)]
    recompute: bool,

    /// Show the N top-scored candidates already in the database, then exit
    #[arg(long, value_name = "N")]
    show_top: Option<usize>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scout=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env();
    if let Some(top) = args.top_candidates {
        config.pipeline.top_candidates = top;
    }
    config.validate()?;

    tracing::info!("Initializing database...");
    let db = Database::new(&config.database).await?;

    let limiter = Arc::new(
        RateLimiter::new()
            .channel(ORACLE_CHANNEL, config.oracle.rate_limit_per_minute)
            .channel(SEARCH_CHANNEL, config.discovery.rate_limit_per_minute),
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received, finishing in-flight work...");
            signal_token.cancel();
        }
    });

    tracing::info!(model = %config.oracle.model, "Initializing scoring oracle...");
    let oracle = OracleApiClient::new(&config.oracle, Arc::clone(&limiter))?
        .with_cancellation(cancel.child_token());

    let discovery = HttpDiscovery::new(config.discovery.clone(), Arc::clone(&limiter))?;

    let agent = SourcingAgent::new(db, Arc::new(discovery), Arc::new(oracle), config.clone())
        .with_cancellation(cancel.clone());

    if let Some(limit) = args.show_top {
        for (i, candidate) in agent.top_candidates(limit).await?.iter().enumerate() {
            println!(
                "{}. {} - {:.1}/10  {}",
                i + 1,
                candidate.name,
                candidate.score,
                candidate.profile_url,
            );
        }
        return Ok(());
    }

    let jobs = load_jobs(&args)?;
    let reports = agent.process_jobs(&jobs, args.recompute).await;

    for report in &reports {
        print_report(report);
    }

    if let Some(path) = &args.output {
        let json = if reports.len() == 1 {
            serde_json::to_string_pretty(&reports[0])?
        } else {
            serde_json::to_string_pretty(&reports)?
        };
        std::fs::write(path, json)?;
        println!("\nResults saved to {}", path.display());
    }

    Ok(())
}

fn load_jobs(args: &Args) -> anyhow::Result<Vec<String>> {
    if let Some(job) = &args.job {
        return Ok(vec![job.clone()]);
    }
    if let Some(path) = &args.jobs_file {
        let content = std::fs::read_to_string(path)?;
        let jobs: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(String::from)
            .collect();
        if jobs.is_empty() {
            anyhow::bail!("no job descriptions found in {}", path.display());
        }
        return Ok(jobs);
    }
    anyhow::bail!("provide a job description with --job or --jobs-file");
}

fn print_report(report: &JobReport) {
    println!("\nJob: {}", report.job_title);

    if let Some(error) = &report.error {
        println!("  Error: {error}");
        return;
    }

    println!(
        "  Candidates: {} total, {} scored ({} from cache), {} failed, average {:.1}/10",
        report.summary.total_candidates,
        report.summary.scored,
        report.summary.from_cache,
        report.summary.failed,
        report.summary.average_score,
    );

    for (i, candidate) in report.candidates.iter().enumerate() {
        println!(
            "  {}. {} - {:.1}/10{}",
            i + 1,
            candidate.name,
            candidate.score,
            if candidate.from_cache { " (cached)" } else { "" },
        );
        println!("     {}", candidate.profile_url);
        if let Some(headline) = &candidate.headline {
            println!("     {headline}");
        }
        for score in &candidate.breakdown.scores {
            println!("       {}: {:.1}", score.criterion.as_str(), score.value);
        }
        if let Some(message) = &candidate.outreach_message {
            println!("     Outreach: {message}");
        }
    }

    for failure in &report.failures {
        println!("  failed: {} ({})", failure.profile_url, failure.reason);
    }
}
