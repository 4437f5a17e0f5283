//! SQLite-backed article cache.
//!
//! Articles are keyed by `(site, url)`, enforced by a unique constraint. A
//! row is inserted unanalyzed at ingestion and moves to analyzed exactly once
//! through [`ArticleStore::apply_analysis`]; only the administrative
//! [`ArticleStore::reset_analysis`] moves it back.

use crate::claims::count_claims;
use crate::error::{Error, Result};
use crate::models::{
    ANALYSIS_SCHEMA_VERSION, AnalysisResult, Article, CandidateArticle, Site, StoredAnalysis,
};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use sqlx::FromRow;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const CREATE_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS articles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        site TEXT NOT NULL,
        title TEXT NOT NULL,
        summary TEXT NOT NULL DEFAULT '',
        url TEXT NOT NULL,
        fetched_at TEXT NOT NULL,
        nuanced_perspective TEXT,
        analysis_schema_version INTEGER,
        verified_claims INTEGER NOT NULL DEFAULT 0,
        corrected_claims INTEGER NOT NULL DEFAULT 0,
        analysis_sources TEXT,
        analyzed_at TEXT,
        last_updated_at TEXT,
        openai_tokens INTEGER NOT NULL DEFAULT 0,
        CONSTRAINT uix_site_url UNIQUE (site, url)
    )
"#;

/// Columns a table created by an older release may lack, with the
/// definition used to add them.
const ADDED_COLUMNS: &[(&str, &str)] = &[
    ("nuanced_perspective", "TEXT"),
    ("analysis_schema_version", "INTEGER"),
    ("verified_claims", "INTEGER NOT NULL DEFAULT 0"),
    ("corrected_claims", "INTEGER NOT NULL DEFAULT 0"),
    ("analysis_sources", "TEXT"),
    ("analyzed_at", "TEXT"),
    ("last_updated_at", "TEXT"),
    ("openai_tokens", "INTEGER NOT NULL DEFAULT 0"),
];

const INDEXES: &[&str] = &[
    // Older tables only carry a unique url; upserts need the pair.
    "CREATE UNIQUE INDEX IF NOT EXISTS uix_articles_site_url ON articles(site, url)",
    "CREATE INDEX IF NOT EXISTS idx_articles_site ON articles(site)",
    "CREATE INDEX IF NOT EXISTS idx_articles_fetched_at ON articles(fetched_at)",
];

// Older rows may hold NULL where this release writes defaults.
const COLUMNS: &str = "id, site, title, COALESCE(summary, '') AS summary, url, fetched_at, \
    nuanced_perspective, analysis_schema_version, \
    COALESCE(verified_claims, 0) AS verified_claims, \
    COALESCE(corrected_claims, 0) AS corrected_claims, analysis_sources, \
    analyzed_at, last_updated_at, COALESCE(openai_tokens, 0) AS openai_tokens";

#[derive(Debug, FromRow)]
struct ArticleRecord {
    id: i64,
    site: String,
    title: String,
    summary: String,
    url: String,
    fetched_at: DateTime<Utc>,
    nuanced_perspective: Option<String>,
    analysis_schema_version: Option<i64>,
    verified_claims: i64,
    corrected_claims: i64,
    analysis_sources: Option<String>,
    analyzed_at: Option<DateTime<Utc>>,
    last_updated_at: Option<DateTime<Utc>>,
    openai_tokens: i64,
}

impl TryFrom<ArticleRecord> for Article {
    type Error = Error;

    fn try_from(row: ArticleRecord) -> Result<Self> {
        let site = row
            .site
            .parse::<Site>()
            .map_err(|e| Error::Database(sqlx::Error::Decode(e.into())))?;
        let analysis_sources = row
            .analysis_sources
            .as_deref()
            .map(|raw| decode_sources(row.id, raw))
            .unwrap_or_default();
        Ok(Article {
            id: row.id,
            site,
            title: row.title,
            summary: row.summary,
            url: row.url,
            fetched_at: row.fetched_at,
            nuanced_perspective: row
                .nuanced_perspective
                .as_deref()
                .map(|raw| StoredAnalysis::decode(row.analysis_schema_version, raw)),
            verified_claims: row.verified_claims,
            corrected_claims: row.corrected_claims,
            analysis_sources,
            analyzed_at: row.analyzed_at,
            last_updated_at: row.last_updated_at,
            openai_tokens: row.openai_tokens,
        })
    }
}

/// Decode the stored source list.
///
/// Rows written by this crate hold a JSON array. Anything else is read as a
/// comma-separated list so one odd row never fails a whole listing.
fn decode_sources(id: i64, raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(sources) => sources,
        Err(e) => {
            warn!(id, error = %e, "analysis_sources is not a JSON array; splitting on commas");
            raw.split(',')
                .map(str::trim)
                .filter(|source| !source.is_empty())
                .map(str::to_string)
                .collect()
        }
    }
}

/// Per-site row counts.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SiteCount {
    pub site: String,
    pub total: i64,
    pub analyzed: i64,
}

/// `true` iff the stored row has no analysis payload yet.
pub fn needs_analysis(article: &Article) -> bool {
    article.nuanced_perspective.is_none()
}

#[derive(Debug, Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    /// Open (creating if missing) the database at `database_url` and ensure
    /// the schema exists, upgrading tables written by older releases.
    ///
    /// Accepts `sqlite:path`, `sqlite://path` and `sqlite::memory:`.
    #[instrument(level = "info")]
    pub async fn open(database_url: &str) -> Result<Self> {
        if !database_url.starts_with("sqlite:") {
            return Err(Error::Config(format!(
                "unsupported database url {database_url}; only sqlite: is supported"
            )));
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::query(CREATE_TABLE)
            .execute(&pool)
            .await
            .map_err(|e| Error::Config(format!("failed to create articles table: {e}")))?;
        Self::add_missing_columns(&pool).await?;
        for (i, statement) in INDEXES.iter().enumerate() {
            sqlx::query(statement).execute(&pool).await.map_err(|e| {
                Error::Config(format!("failed to apply index statement {i}: {e}"))
            })?;
        }
        info!("Article store ready");

        Ok(Self { pool })
    }

    /// Bring a table created by an older release up to the current columns.
    ///
    /// A column added concurrently by another process counts as done.
    async fn add_missing_columns(pool: &SqlitePool) -> Result<()> {
        let existing: Vec<String> =
            sqlx::query_scalar("SELECT name FROM pragma_table_info('articles')")
                .fetch_all(pool)
                .await?;

        for &(column, definition) in ADDED_COLUMNS {
            if existing.iter().any(|name| name.eq_ignore_ascii_case(column)) {
                continue;
            }
            let statement = format!("ALTER TABLE articles ADD COLUMN {column} {definition}");
            match sqlx::query(&statement).execute(pool).await {
                Ok(_) => info!(column, "Added missing column to articles"),
                Err(sqlx::Error::Database(e)) if e.message().contains("duplicate column name") => {
                    debug!(column, "Column already exists");
                }
                Err(e) => {
                    return Err(Error::Config(format!("failed to add column {column}: {e}")));
                }
            }
        }
        Ok(())
    }

    /// Identity lookup.
    pub async fn exists(&self, site: Site, url: &str) -> Result<bool> {
        let found = sqlx::query("SELECT 1 FROM articles WHERE site = ? AND url = ?")
            .bind(site.as_str())
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRecord>(&format!(
            "SELECT {COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Article::try_from).transpose()
    }

    pub async fn find(&self, site: Site, url: &str) -> Result<Option<Article>> {
        let row = sqlx::query_as::<_, ArticleRecord>(&format!(
            "SELECT {COLUMNS} FROM articles WHERE site = ? AND url = ?"
        ))
        .bind(site.as_str())
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Article::try_from).transpose()
    }

    /// Insert `candidate` unanalyzed, stamped with the current time.
    ///
    /// Returns `false` without touching the existing row when `(site, url)`
    /// is already stored.
    pub async fn upsert_unanalyzed(&self, candidate: &CandidateArticle) -> Result<bool> {
        self.upsert_unanalyzed_at(candidate, Utc::now()).await
    }

    #[instrument(level = "debug", skip_all, fields(site = %candidate.site, url = %candidate.url))]
    pub async fn upsert_unanalyzed_at(
        &self,
        candidate: &CandidateArticle,
        fetched_at: DateTime<Utc>,
    ) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO articles (site, title, summary, url, fetched_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(site, url) DO NOTHING
            "#,
        )
        .bind(candidate.site.as_str())
        .bind(&candidate.title)
        .bind(&candidate.summary)
        .bind(&candidate.url)
        .bind(fetched_at)
        .execute(&self.pool)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            debug!("Stored new article");
        } else {
            debug!("Article already stored; skipping");
        }
        Ok(inserted)
    }

    /// Persist an analysis for `article` and return the stored row.
    ///
    /// Writes the payload, the derived claim counts, the de-duplicated
    /// sources, the token count and both timestamps in one transaction. The
    /// update only applies while the row is still unanalyzed, so an analysis
    /// stored by a concurrent writer is never overwritten; the returned row
    /// then carries that earlier analysis.
    ///
    /// # Errors
    ///
    /// Database failures are returned to the caller; nothing is written.
    #[instrument(level = "info", skip_all, fields(id = article.id, site = %article.site))]
    pub async fn apply_analysis(&self, article: &Article, result: &AnalysisResult) -> Result<Article> {
        let payload = serde_json::to_string(result)?;
        let counts = count_claims(result);
        let sources: Vec<&str> = result
            .sources
            .iter()
            .flatten()
            .map(|source| source.trim())
            .filter(|source| !source.is_empty())
            .unique()
            .collect();
        let sources = serde_json::to_string(&sources)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        let updated = sqlx::query(
            r#"
            UPDATE articles
            SET nuanced_perspective = ?,
                analysis_schema_version = ?,
                verified_claims = ?,
                corrected_claims = ?,
                analysis_sources = ?,
                analyzed_at = ?,
                last_updated_at = ?,
                openai_tokens = ?
            WHERE id = ? AND nuanced_perspective IS NULL
            "#,
        )
        .bind(payload)
        .bind(ANALYSIS_SCHEMA_VERSION)
        .bind(counts.verified)
        .bind(counts.corrected)
        .bind(sources)
        .bind(now)
        .bind(now)
        .bind(i64::from(result.tokens))
        .bind(article.id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let row = sqlx::query_as::<_, ArticleRecord>(&format!(
            "SELECT {COLUMNS} FROM articles WHERE id = ?"
        ))
        .bind(article.id)
        .fetch_optional(&mut *tx)
        .await?;
        tx.commit().await?;

        let row = row.ok_or(Error::NotFound(article.id))?;
        if updated == 0 {
            debug!("Article was already analyzed; kept existing analysis");
        } else {
            info!(
                verified_claims = counts.verified,
                corrected_claims = counts.corrected,
                tokens = result.tokens,
                "Stored analysis"
            );
        }
        Article::try_from(row)
    }

    /// Delete everything but the `keep` most recently fetched rows.
    ///
    /// Returns the number of rows deleted.
    #[instrument(level = "info", skip(self))]
    pub async fn prune(&self, keep: usize) -> Result<u64> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        let deleted = sqlx::query(
            r#"
            DELETE FROM articles
            WHERE id NOT IN (
                SELECT id FROM articles ORDER BY fetched_at DESC, id DESC LIMIT ?
            )
            "#,
        )
        .bind(keep)
        .execute(&self.pool)
        .await?
        .rows_affected();
        info!(deleted, "Pruned articles");
        Ok(deleted)
    }

    /// Clear every analysis field on every row.
    #[instrument(level = "info", skip(self))]
    pub async fn reset_analysis(&self) -> Result<u64> {
        let reset = sqlx::query(
            r#"
            UPDATE articles
            SET nuanced_perspective = NULL,
                analysis_schema_version = NULL,
                verified_claims = 0,
                corrected_claims = 0,
                analysis_sources = NULL,
                analyzed_at = NULL,
                last_updated_at = NULL,
                openai_tokens = 0
            "#,
        )
        .execute(&self.pool)
        .await?
        .rows_affected();
        info!(reset, "Reset analysis on all articles");
        Ok(reset)
    }

    /// Most recently fetched articles, optionally for a single site.
    pub async fn recent(&self, site: Option<Site>, limit: usize) -> Result<Vec<Article>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = match site {
            Some(site) => {
                sqlx::query_as::<_, ArticleRecord>(&format!(
                    "SELECT {COLUMNS} FROM articles WHERE site = ? \
                     ORDER BY fetched_at DESC, id DESC LIMIT ?"
                ))
                .bind(site.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ArticleRecord>(&format!(
                    "SELECT {COLUMNS} FROM articles ORDER BY fetched_at DESC, id DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.into_iter().map(Article::try_from).collect()
    }

    /// Every row that carries an analysis payload.
    pub async fn analyzed(&self) -> Result<Vec<Article>> {
        let rows = sqlx::query_as::<_, ArticleRecord>(&format!(
            "SELECT {COLUMNS} FROM articles WHERE nuanced_perspective IS NOT NULL ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Article::try_from).collect()
    }

    pub async fn site_counts(&self) -> Result<Vec<SiteCount>> {
        let counts = sqlx::query_as::<_, SiteCount>(
            r#"
            SELECT site, COUNT(*) AS total, COUNT(nuanced_perspective) AS analyzed
            FROM articles
            GROUP BY site
            ORDER BY site
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(counts)
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
