//! Ingestion and analysis orchestration.
//!
//! [`Analyzer`] ties the classifier, the policy table, the LLM client and the
//! article store together. It serves both callers:
//!
//! - the batch job, [`run_batch`]: collect headlines per site, store them,
//!   and analyse a capped number of new rows per site
//! - on-demand analysis, [`Analyzer::analyse_article`]: analyse one stored
//!   row unless it already carries an analysis
//!
//! Both paths go through the same per-identity in-flight lock, and neither
//! persists a fallback result; a row whose analysis failed stays unanalyzed
//! and is picked up again later.

use crate::api::{AnalysisClient, AskAsync, Clock, Completion, TokioClock};
use crate::classifier::classify;
use crate::coalesce::InFlight;
use crate::error::{Error, Result};
use crate::models::{AnalysisResult, Article, Site};
use crate::policy::PolicyTable;
use crate::scrapers::NewsSource;
use crate::store::{ArticleStore, needs_analysis};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Estimated cost per token, in SEK.
pub const SEK_PER_TOKEN: f64 = 0.006;

/// Result of analysing one stored article.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    /// The row already had an analysis; nothing was spent.
    Cached(Article),
    /// A fresh analysis was stored.
    Analysed(Article),
    /// Every attempt failed; the row is returned unchanged and unanalyzed.
    Degraded(Article),
}

impl AnalysisOutcome {
    pub fn article(&self) -> &Article {
        match self {
            AnalysisOutcome::Cached(article)
            | AnalysisOutcome::Analysed(article)
            | AnalysisOutcome::Degraded(article) => article,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AnalysisOutcome::Cached(_) => "cached",
            AnalysisOutcome::Analysed(_) => "ok",
            AnalysisOutcome::Degraded(_) => "degraded",
        }
    }
}

pub struct Analyzer<B, C = TokioClock> {
    store: ArticleStore,
    client: AnalysisClient<B, C>,
    policies: PolicyTable,
    in_flight: InFlight,
}

impl<B, C> Analyzer<B, C>
where
    B: AskAsync<Response = Completion>,
    C: Clock,
{
    pub fn new(store: ArticleStore, client: AnalysisClient<B, C>, policies: PolicyTable) -> Self {
        Self {
            store,
            client,
            policies,
            in_flight: InFlight::new(),
        }
    }

    /// Classify `article`, resolve its policy and run the model.
    ///
    /// Never fails; see [`AnalysisClient::analyse`].
    pub async fn analyse_row(&self, article: &Article) -> AnalysisResult {
        let bucket = classify(&article.title, &article.summary);
        let policy = self.policies.policy_for(bucket);
        info!(
            id = article.id,
            %bucket,
            model = %policy.model_id,
            max_words = policy.max_output_words,
            "Analysing article"
        );
        self.client
            .analyse(
                article.input(),
                &policy.model_id,
                policy.max_output_words,
                policy.max_output_tokens,
            )
            .await
    }

    /// On-demand analysis of the stored article `id`.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] when no such row exists, or a database error from
    /// reading or persisting. Upstream failures are not errors; they yield
    /// [`AnalysisOutcome::Degraded`].
    #[instrument(level = "info", skip(self))]
    pub async fn analyse_article(&self, id: i64) -> Result<AnalysisOutcome> {
        let article = self.store.get(id).await?.ok_or(Error::NotFound(id))?;
        if !needs_analysis(&article) {
            debug!("Serving cached analysis");
            return Ok(AnalysisOutcome::Cached(article));
        }
        self.analyse_coalesced(article).await
    }

    /// Analyse an unanalyzed row while holding its identity lock.
    async fn analyse_coalesced(&self, article: Article) -> Result<AnalysisOutcome> {
        let _guard = self.in_flight.acquire(article.site, &article.url).await;

        // another request may have finished while we waited
        let article = self
            .store
            .get(article.id)
            .await?
            .ok_or(Error::NotFound(article.id))?;
        if !needs_analysis(&article) {
            debug!(id = article.id, "Analysed by a concurrent request");
            return Ok(AnalysisOutcome::Cached(article));
        }

        let result = self.analyse_row(&article).await;
        if result.is_fallback() {
            warn!(id = article.id, "Analysis degraded to fallback; leaving row unanalyzed");
            return Ok(AnalysisOutcome::Degraded(article));
        }
        let stored = self.store.apply_analysis(&article, &result).await?;
        Ok(AnalysisOutcome::Analysed(stored))
    }
}

/// Knobs for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchSettings {
    /// Headlines requested per site.
    pub per_site: usize,
    /// Word budget for stored summaries.
    pub news_len: usize,
    /// LLM submissions allowed per site in this run.
    pub analyse_limit: usize,
    /// Rows kept after the run.
    pub keep: usize,
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            per_site: 10,
            news_len: 70,
            analyse_limit: 1,
            keep: 1000,
        }
    }
}

/// Counters reported at the end of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub pulled: usize,
    pub stored_new: usize,
    pub analysed: usize,
    pub degraded: usize,
    pub tokens: i64,
    pub pruned: u64,
}

impl BatchReport {
    pub fn estimated_cost_sek(&self) -> f64 {
        self.tokens as f64 * SEK_PER_TOKEN
    }
}

/// Collect, store and optionally analyse headlines for every site.
///
/// Sites are processed one after another, items in feed order. With an
/// `analyzer`, at most `settings.analyse_limit` rows per site are sent to the
/// model; rows already analyzed are skipped without cost. Storage failures
/// on a single item are logged and the item skipped. Pruning runs last and
/// its failure only logs.
///
/// # Arguments
///
/// * `store` - Article store receiving the headlines
/// * `source` - Where headlines come from
/// * `analyzer` - `None` to only ingest
/// * `settings` - Per-run limits
///
/// # Returns
///
/// A [`BatchReport`] with the run's counters.
#[instrument(level = "info", skip_all, fields(analyse = analyzer.is_some()))]
pub async fn run_batch<S, B, C>(
    store: &ArticleStore,
    source: &S,
    analyzer: Option<&Analyzer<B, C>>,
    settings: &BatchSettings,
) -> BatchReport
where
    S: NewsSource,
    B: AskAsync<Response = Completion>,
    C: Clock,
{
    let t0 = Instant::now();
    let mut report = BatchReport::default();

    for site in Site::ALL {
        let items = source.collect(site, settings.per_site, settings.news_len).await;
        report.pulled += items.len();
        let mut budget = settings.analyse_limit;

        for candidate in items {
            match store.upsert_unanalyzed(&candidate).await {
                Ok(true) => report.stored_new += 1,
                Ok(false) => {}
                Err(e) => {
                    error!(%site, url = %candidate.url, error = %e, "Failed to store article; skipping");
                    continue;
                }
            }

            let Some(analyzer) = analyzer else {
                continue;
            };
            if budget == 0 {
                continue;
            }
            let row = match store.find(site, &candidate.url).await {
                Ok(Some(row)) if needs_analysis(&row) => row,
                Ok(_) => continue,
                Err(e) => {
                    error!(%site, url = %candidate.url, error = %e, "Failed to read article; skipping");
                    continue;
                }
            };

            budget -= 1;
            match analyzer.analyse_coalesced(row).await {
                Ok(AnalysisOutcome::Analysed(stored)) => {
                    report.analysed += 1;
                    report.tokens += stored.openai_tokens;
                }
                Ok(AnalysisOutcome::Degraded(_)) => report.degraded += 1,
                Ok(AnalysisOutcome::Cached(_)) => {}
                Err(e) => {
                    error!(%site, url = %candidate.url, error = %e, "Failed to persist analysis; continuing");
                }
            }
        }
    }

    match store.prune(settings.keep).await {
        Ok(deleted) => report.pruned = deleted,
        Err(e) => warn!(error = %e, keep = settings.keep, "Pruning failed; continuing"),
    }

    info!(
        pulled = report.pulled,
        new = report.stored_new,
        analysed = report.analysed,
        degraded = report.degraded,
        tokens = report.tokens,
        cost_sek = %format!("{:.2}", report.estimated_cost_sek()),
        elapsed_ms = t0.elapsed().as_millis() as u64,
        "Batch complete"
    );
    report
}
