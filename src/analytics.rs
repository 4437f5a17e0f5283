//! Dashboard aggregates over the article store.
//!
//! Scores are averaged over rows carrying a current-schema analysis only;
//! legacy payloads are counted but never scored. An article is *foreign*
//! when its title mentions one of [`FOREIGN_KEYWORDS`] (case-sensitive), and
//! *domestic* otherwise.

use crate::error::Result;
use crate::models::{Article, Site};
use crate::pipeline::SEK_PER_TOKEN;
use crate::scrapers::source_for;
use crate::store::{ArticleStore, SiteCount};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument};

pub const FOREIGN_KEYWORDS: [&str; 7] = ["USA", "Ryssland", "Ukraina", "EU", "Nato", "Kina", "Iran"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dashboard {
    pub generated_at: DateTime<Utc>,
    pub total_articles: i64,
    pub analysed_articles: i64,
    pub legacy_articles: usize,
    pub verified_claims: i64,
    pub corrected_claims: i64,
    pub openai_tokens: i64,
    pub estimated_cost_sek: f64,
    pub sites: Vec<SiteStats>,
    pub domestic: RegionStats,
    pub foreign: RegionStats,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStats {
    pub site: Site,
    pub name: &'static str,
    pub articles: i64,
    pub analysed: i64,
    pub avg_accuracy: Option<f64>,
    pub avg_source_reliability: Option<f64>,
    pub avg_balance: Option<f64>,
    pub avg_depth: Option<f64>,
    pub avg_overall: Option<f64>,
    pub verified_claims: i64,
    pub corrected_claims: i64,
    pub openai_tokens: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegionStats {
    /// Scored articles in this region.
    pub articles: usize,
    pub avg_overall: Option<f64>,
}

pub fn is_foreign(title: &str) -> bool {
    FOREIGN_KEYWORDS.iter().any(|keyword| title.contains(keyword))
}

fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), value| (sum + value, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Build the dashboard from per-site counts and the analyzed rows.
pub fn build_dashboard(counts: &[SiteCount], analysed: &[Article], generated_at: DateTime<Utc>) -> Dashboard {
    let sites: Vec<SiteStats> = Site::ALL
        .into_iter()
        .map(|site| {
            let count = counts.iter().find(|c| c.site == site.as_str());
            let rows: Vec<&Article> = analysed.iter().filter(|a| a.site == site).collect();
            let scores: Vec<_> = rows
                .iter()
                .filter_map(|a| a.analysis())
                .filter_map(|result| result.quality_scores.as_ref())
                .collect();
            let avg = |pick: fn(&crate::models::QualityScores) -> Option<u8>| {
                mean(scores.iter().filter_map(|s| pick(s)).map(f64::from))
            };

            SiteStats {
                site,
                name: source_for(site).name,
                articles: count.map_or(0, |c| c.total),
                analysed: count.map_or(0, |c| c.analyzed),
                avg_accuracy: avg(|s| s.accuracy),
                avg_source_reliability: avg(|s| s.source_reliability),
                avg_balance: avg(|s| s.balance),
                avg_depth: avg(|s| s.depth),
                avg_overall: mean(scores.iter().filter_map(|s| s.overall())),
                verified_claims: rows.iter().map(|a| a.verified_claims).sum(),
                corrected_claims: rows.iter().map(|a| a.corrected_claims).sum(),
                openai_tokens: rows.iter().map(|a| a.openai_tokens).sum(),
            }
        })
        .collect();

    let region = |foreign: bool| {
        let overall: Vec<f64> = analysed
            .iter()
            .filter(|a| is_foreign(&a.title) == foreign)
            .filter_map(|a| a.analysis())
            .filter_map(|result| result.quality_scores.as_ref()?.overall())
            .collect();
        RegionStats {
            articles: overall.len(),
            avg_overall: mean(overall),
        }
    };

    let openai_tokens: i64 = sites.iter().map(|s| s.openai_tokens).sum();
    Dashboard {
        generated_at,
        total_articles: counts.iter().map(|c| c.total).sum(),
        analysed_articles: counts.iter().map(|c| c.analyzed).sum(),
        legacy_articles: analysed
            .iter()
            .filter(|a| a.nuanced_perspective.as_ref().is_some_and(|p| p.is_legacy()))
            .count(),
        verified_claims: sites.iter().map(|s| s.verified_claims).sum(),
        corrected_claims: sites.iter().map(|s| s.corrected_claims).sum(),
        openai_tokens,
        estimated_cost_sek: openai_tokens as f64 * SEK_PER_TOKEN,
        domestic: region(false),
        foreign: region(true),
        sites,
    }
}

/// Read the store and aggregate.
#[instrument(level = "info", skip_all)]
pub async fn collect(store: &ArticleStore) -> Result<Dashboard> {
    let counts = store.site_counts().await?;
    let analysed = store.analyzed().await?;
    let dashboard = build_dashboard(&counts, &analysed, Utc::now());
    info!(
        total = dashboard.total_articles,
        analysed = dashboard.analysed_articles,
        legacy = dashboard.legacy_articles,
        "Built dashboard"
    );
    Ok(dashboard)
}
