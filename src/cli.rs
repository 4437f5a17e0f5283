//! Command-line interface definitions for Balanced News.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Most options can be provided via command-line flags or environment
//! variables.

use crate::models::Site;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the Balanced News application.
///
/// Global options configure the database, the OpenAI-compatible endpoint and
/// the per-bucket model policy; the subcommand selects what to do.
///
/// # Examples
///
/// ```sh
/// # Fetch headlines only
/// balanced_news fetch
///
/// # Fetch and analyse up to two new articles per site
/// OPENAI_API_KEY=sk-... balanced_news fetch --analyse --analyse-limit 2
///
/// # Analyse one stored article on demand
/// balanced_news analyse 42
///
/// # Write today's dashboard aggregates
/// balanced_news analytics --output-dir ./dashboard
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// SQLite database URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:balanced_news.db", global = true)]
    pub database_url: String,

    /// API key for the chat completion endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1", global = true)]
    pub openai_base_url: String,

    /// Optional YAML file overriding the per-bucket model policy
    #[arg(long, env = "POLICY_FILE", global = true)]
    pub policy_file: Option<PathBuf>,

    /// Timeout for a single chat completion request, in seconds
    #[arg(long, default_value_t = 60, global = true)]
    pub request_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Collect the latest headlines from every site, optionally analysing new ones
    Fetch(FetchArgs),

    /// Analyse one stored article unless it is already analysed
    Analyse {
        /// Article id
        id: i64,
    },

    /// List the most recently fetched articles
    List {
        /// Only list this site
        #[arg(long)]
        site: Option<Site>,

        /// Number of articles
        #[arg(long, default_value_t = 30)]
        limit: usize,
    },

    /// Aggregate scores per site and region
    Analytics {
        /// Write `<dir>/<date>/analytics.json` instead of printing
        #[arg(long)]
        output_dir: Option<String>,
    },

    /// Clear the analysis of every stored article
    Reset,

    /// Delete all but the most recently fetched articles
    Prune {
        /// Articles to keep
        #[arg(long, env = "RETENTION_CAP", default_value_t = 1000)]
        keep: usize,
    },
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct FetchArgs {
    /// Headlines per site
    #[arg(short = 'n', long, env = "NEWS_PER_SITE", default_value_t = 10)]
    pub per_site: usize,

    /// Max words kept from each feed summary
    #[arg(long, env = "NEWS_SUMMARY_LEN", default_value_t = 70)]
    pub news_len: usize,

    /// Call the model right away (otherwise only fetch headlines)
    #[arg(long)]
    pub analyse: bool,

    /// New articles analysed per site in this run
    #[arg(long, env = "ANALYSE_LIMIT", default_value_t = 1)]
    pub analyse_limit: usize,

    /// Articles kept after the run
    #[arg(long, env = "RETENTION_CAP", default_value_t = 1000)]
    pub keep: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_defaults() {
        let cli = Cli::parse_from(["balanced_news", "fetch"]);
        let Command::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        assert!(!args.analyse);
        assert_eq!(args.per_site, 10);
        assert_eq!(args.news_len, 70);
        assert_eq!(args.analyse_limit, 1);
        assert_eq!(args.keep, 1000);
        assert_eq!(cli.request_timeout_secs, 60);
    }

    #[test]
    fn test_fetch_flags() {
        let cli = Cli::parse_from([
            "balanced_news",
            "fetch",
            "-n",
            "5",
            "--analyse",
            "--analyse-limit",
            "3",
            "--database-url",
            "sqlite://tmp/x.db",
        ]);
        assert_eq!(cli.database_url, "sqlite://tmp/x.db");
        assert_eq!(
            cli.command,
            Command::Fetch(FetchArgs {
                per_site: 5,
                news_len: 70,
                analyse: true,
                analyse_limit: 3,
                keep: 1000,
            })
        );
    }

    #[test]
    fn test_list_parses_site() {
        let cli = Cli::parse_from(["balanced_news", "list", "--site", "DN", "--limit", "5"]);
        assert_eq!(
            cli.command,
            Command::List {
                site: Some(Site::Dn),
                limit: 5
            }
        );
        assert!(Cli::try_parse_from(["balanced_news", "list", "--site", "bbc"]).is_err());
    }

    #[test]
    fn test_analyse_requires_id() {
        assert!(Cli::try_parse_from(["balanced_news", "analyse"]).is_err());
        let cli = Cli::parse_from(["balanced_news", "analyse", "42"]);
        assert_eq!(cli.command, Command::Analyse { id: 42 });
    }
}
