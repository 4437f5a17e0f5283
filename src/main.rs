//! # Balanced News
//!
//! Collects the latest headlines from Swedish news sites, analyses them for
//! bias, factual accuracy and quality with an OpenAI-compatible LLM, and
//! caches every article and its analysis in SQLite.
//!
//! ## Features
//!
//! - Reads SVT, Aftonbladet, Expressen, Dagens Nyheter and Dagens, via RSS
//!   with an HTML front page fallback
//! - Routes each article to a model by topic: a keyword classifier picks a
//!   bucket, the policy table picks model and output budgets
//! - Enforces a strict six-section JSON contract on the model's answer, with
//!   retries and exponential backoff
//! - Stores each `(site, url)` once and analyses it at most once
//! - Aggregates scores per site and for domestic versus foreign news
//!
//! ## Usage
//!
//! ```sh
//! balanced_news fetch --analyse
//! balanced_news list --site svt
//! balanced_news analyse 42
//! balanced_news analytics --output-dir ./dashboard
//! ```
//!
//! ## Architecture
//!
//! 1. **Ingestion**: collect headlines per site ([`scrapers`])
//! 2. **Storage**: insert unseen articles unanalyzed ([`store`])
//! 3. **Analysis**: classify, resolve policy, call the model ([`pipeline`], [`api`])
//! 4. **Output**: front page listing and dashboard JSON ([`outputs`], [`analytics`])

use clap::Parser;
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analytics;
mod api;
mod claims;
mod classifier;
mod cli;
mod coalesce;
mod error;
mod models;
mod outputs;
mod pipeline;
mod policy;
mod prompt;
mod scrapers;
mod store;
#[cfg(test)]
mod test_support;
mod utils;

use api::{AnalysisClient, OpenAiChat};
use cli::{Cli, Command};
use pipeline::{AnalysisOutcome, Analyzer, BatchSettings, run_batch};
use policy::PolicyTable;
use scrapers::HttpNewsSource;
use store::ArticleStore;
use utils::ensure_writable_dir;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(command = ?args.command, database_url = %args.database_url, "Parsed CLI arguments");

    let store = ArticleStore::open(&args.database_url).await?;

    match &args.command {
        Command::Fetch(fetch) => {
            let settings = BatchSettings {
                per_site: fetch.per_site,
                news_len: fetch.news_len,
                analyse_limit: fetch.analyse_limit,
                keep: fetch.keep,
            };
            let analyzer = if fetch.analyse {
                Some(build_analyzer(&args, &store)?)
            } else {
                None
            };
            let source = HttpNewsSource::new()?;
            let report = run_batch(&store, &source, analyzer.as_ref(), &settings).await;
            println!(
                "Pulled {} headlines | new {} | analysed {} | tokens {} (≈ {:.2} SEK)",
                report.pulled,
                report.stored_new,
                report.analysed,
                report.tokens,
                report.estimated_cost_sek()
            );
        }
        Command::Analyse { id } => {
            let analyzer = build_analyzer(&args, &store)?;
            let outcome = analyzer.analyse_article(*id).await?;
            if let AnalysisOutcome::Degraded(_) = outcome {
                warn!(id, "Analysis unavailable; try again later");
            }
            let body = serde_json::json!({
                "status": outcome.label(),
                "article": outcome.article(),
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::List { site, limit } => {
            let articles = store.recent(*site, *limit).await?;
            print!("{}", outputs::text::front_page(&articles));
        }
        Command::Analytics { output_dir } => {
            let dashboard = analytics::collect(&store).await?;
            match output_dir {
                Some(dir) => {
                    if let Err(e) = ensure_writable_dir(dir).await {
                        error!(
                            path = %dir,
                            error = %e,
                            "Output directory is not writable (fix perms or choose a different path)"
                        );
                        return Err(e.into());
                    }
                    let path = outputs::json::write_dashboard(&dashboard, dir).await?;
                    println!("{}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&dashboard)?),
            }
        }
        Command::Reset => {
            let reset = store.reset_analysis().await?;
            println!("Reset analysis on {reset} articles");
        }
        Command::Prune { keep } => {
            let deleted = store.prune(*keep).await?;
            println!("Deleted {deleted} articles");
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Wire the OpenAI backend, retry client and policy table into an [`Analyzer`].
///
/// # Errors
///
/// [`error::Error::Config`] when no API key is configured or the policy file
/// is invalid.
fn build_analyzer(args: &Cli, store: &ArticleStore) -> error::Result<Analyzer<OpenAiChat>> {
    let api_key = args
        .openai_api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| error::Error::Config("OPENAI_API_KEY is not set".to_string()))?;
    let policies = PolicyTable::load(args.policy_file.as_deref())?;
    let backend = OpenAiChat::new(
        api_key,
        &args.openai_base_url,
        Duration::from_secs(args.request_timeout_secs),
    )?;
    info!(base_url = %args.openai_base_url, "LLM client ready");
    Ok(Analyzer::new(store.clone(), AnalysisClient::new(backend), policies))
}
