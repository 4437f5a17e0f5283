//! Crate-wide error type.
//!
//! Everything that can fail outside the LLM client funnels into [`Error`].
//! The client itself never lets an error escape `analyse`; its per-attempt
//! failures are reported as [`Error::Upstream`] or [`Error::Contract`] and
//! only ever logged.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed error: {0}")]
    Feed(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Response violates the analysis contract: {0}")]
    Contract(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Article {0} not found")]
    NotFound(i64),
}

pub type Result<T> = std::result::Result<T, Error>;
