//! Data models for outlets, stored articles and LLM analysis results.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Site`]: The configured news outlets
//! - [`CandidateArticle`]: A headline as delivered by an ingestion source
//! - [`Article`]: A persisted article row, with or without analysis
//! - [`AnalysisResult`]: The structured LLM output, one canonical versioned shape
//! - [`StoredAnalysis`]: A persisted payload, either canonical or legacy
//!
//! The analysis structs use the exact snake_case keys the system prompt asks
//! the model to emit, so serde can read the response without renaming.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema version stamped on every analysis this crate writes.
pub const ANALYSIS_SCHEMA_VERSION: i64 = 1;

/// Top-level keys every model response must contain.
pub const REQUIRED_SECTIONS: [&str; 6] = [
    "main_facts",
    "bias_assessment",
    "factual_accuracy",
    "quality_scores",
    "macro_perspective",
    "sources",
];

/// A configured Swedish news outlet.
///
/// The lowercase name is the value stored in the `site` column and accepted
/// on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Site {
    Svt,
    Aftonbladet,
    Expressen,
    Dn,
    Dagens,
}

impl Site {
    /// Every outlet in ingestion order.
    pub const ALL: [Site; 5] = [
        Site::Svt,
        Site::Aftonbladet,
        Site::Expressen,
        Site::Dn,
        Site::Dagens,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Site::Svt => "svt",
            Site::Aftonbladet => "aftonbladet",
            Site::Expressen => "expressen",
            Site::Dn => "dn",
            Site::Dagens => "dagens",
        }
    }
}

impl fmt::Display for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Site {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Site::ALL
            .into_iter()
            .find(|site| site.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown site: {s}"))
    }
}

/// A headline as delivered by an ingestion source, before it is stored.
///
/// `title` and `summary` are plain text; the summary has already been
/// truncated to the configured word budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateArticle {
    pub site: Site,
    pub title: String,
    pub summary: String,
    pub url: String,
}

/// The part of an article that is sent to the model as the user turn.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleInput<'a> {
    pub title: &'a str,
    pub summary: &'a str,
}

/// A persisted article, identified by `(site, url)`.
///
/// An unanalyzed article has `nuanced_perspective == None`, zero counters,
/// no sources and no timestamps. Once analyzed, `nuanced_perspective` and
/// `analyzed_at` are always both set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    pub id: i64,
    pub site: Site,
    pub title: String,
    pub summary: String,
    pub url: String,
    pub fetched_at: DateTime<Utc>,
    pub nuanced_perspective: Option<StoredAnalysis>,
    pub verified_claims: i64,
    pub corrected_claims: i64,
    pub analysis_sources: Vec<String>,
    pub analyzed_at: Option<DateTime<Utc>>,
    pub last_updated_at: Option<DateTime<Utc>>,
    pub openai_tokens: i64,
}

impl Article {
    /// The title/summary pair handed to the model.
    pub fn input(&self) -> ArticleInput<'_> {
        ArticleInput {
            title: &self.title,
            summary: &self.summary,
        }
    }

    /// The canonical analysis, if this row carries one.
    pub fn analysis(&self) -> Option<&AnalysisResult> {
        match &self.nuanced_perspective {
            Some(StoredAnalysis::Current(result)) => Some(result),
            _ => None,
        }
    }
}

/// Bias and balance assessment of the article's framing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BiasAssessment {
    /// Short label such as `vänster`, `neutral` or `höger`.
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub balance: Option<String>,
}

/// Factual-accuracy narratives.
///
/// `claim_verification` holds one claim per line, each tagged with a
/// `Säkerhet:` confidence marker and, when needed, a `Korrigering:` marker.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactualAccuracy {
    #[serde(default)]
    pub claim_verification: Option<String>,
    #[serde(default)]
    pub unsupported_assertions: Option<String>,
}

/// Four 0–100 quality sub-scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityScores {
    #[serde(default)]
    pub accuracy: Option<u8>,
    #[serde(default)]
    pub source_reliability: Option<u8>,
    #[serde(default)]
    pub balance: Option<u8>,
    #[serde(default)]
    pub depth: Option<u8>,
}

impl QualityScores {
    /// All four scores in declaration order.
    pub fn all(&self) -> [Option<u8>; 4] {
        [self.accuracy, self.source_reliability, self.balance, self.depth]
    }

    /// Mean of the four scores, or `None` unless all four are present.
    pub fn overall(&self) -> Option<f64> {
        let scores = self.all();
        if scores.iter().any(Option::is_none) {
            return None;
        }
        let sum: u32 = scores.iter().flatten().map(|&s| u32::from(s)).sum();
        Some(f64::from(sum) / 4.0)
    }
}

/// Background and consequences beyond the single article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacroPerspective {
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub implications: Option<String>,
}

/// The structured LLM analysis of one article (schema version 1).
///
/// Every section is independently nullable. The value returned by
/// [`AnalysisResult::fallback`] has every section `None` and zero tokens; it
/// is what the client hands back when the model could not be reached or never
/// produced a conforming answer.
///
/// # JSON Schema
///
/// The field names match the object shape rendered by
/// [`crate::prompt::build_system_prompt`]. `tokens` is attached by the client
/// after parsing and is not requested from the model.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub main_facts: Option<String>,
    #[serde(default)]
    pub bias_assessment: Option<BiasAssessment>,
    #[serde(default)]
    pub factual_accuracy: Option<FactualAccuracy>,
    #[serde(default)]
    pub quality_scores: Option<QualityScores>,
    #[serde(default)]
    pub macro_perspective: Option<MacroPerspective>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    /// Total prompt + completion tokens reported by the provider.
    #[serde(default)]
    pub tokens: u32,
}

impl AnalysisResult {
    /// The all-null result returned once retries are exhausted.
    pub fn fallback() -> Self {
        Self::default()
    }

    /// `true` when every analytical field is null and no tokens were spent.
    pub fn is_fallback(&self) -> bool {
        *self == Self::fallback()
    }

    /// `true` when all six sections are present.
    pub fn is_complete(&self) -> bool {
        self.main_facts.is_some()
            && self.bias_assessment.is_some()
            && self.factual_accuracy.is_some()
            && self.quality_scores.is_some()
            && self.macro_perspective.is_some()
            && self.sources.is_some()
    }

    /// Every key, top-level and nested, that the prompt must spell out.
    pub fn contract_keys() -> Vec<&'static str> {
        let mut keys = REQUIRED_SECTIONS.to_vec();
        keys.extend([
            "label",
            "explanation",
            "balance",
            "claim_verification",
            "unsupported_assertions",
            "accuracy",
            "source_reliability",
            "depth",
            "context",
            "implications",
        ]);
        keys
    }
}

/// An analysis payload as read back from storage.
///
/// Rows written by this crate decode to [`StoredAnalysis::Current`]. Anything
/// stamped with another schema version, or that no longer decodes as the
/// current shape, is kept verbatim as [`StoredAnalysis::Legacy`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredAnalysis {
    Current(AnalysisResult),
    Legacy {
        version: Option<i64>,
        payload: serde_json::Value,
    },
}

impl StoredAnalysis {
    /// Decode a stored `nuanced_perspective` column.
    pub fn decode(version: Option<i64>, raw: &str) -> Self {
        if version == Some(ANALYSIS_SCHEMA_VERSION) {
            if let Ok(result) = serde_json::from_str::<AnalysisResult>(raw) {
                return StoredAnalysis::Current(result);
            }
        }
        let payload = serde_json::from_str(raw)
            .unwrap_or_else(|_| serde_json::Value::String(raw.to_string()));
        StoredAnalysis::Legacy { version, payload }
    }

    pub fn is_legacy(&self) -> bool {
        matches!(self, StoredAnalysis::Legacy { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_round_trips_through_str() {
        for site in Site::ALL {
            assert_eq!(site.to_string().parse::<Site>().unwrap(), site);
        }
        assert_eq!("SVT".parse::<Site>().unwrap(), Site::Svt);
        assert!("bbc".parse::<Site>().is_err());
    }

    #[test]
    fn test_fallback_is_all_null() {
        let fallback = AnalysisResult::fallback();
        assert!(fallback.main_facts.is_none());
        assert!(fallback.bias_assessment.is_none());
        assert!(fallback.factual_accuracy.is_none());
        assert!(fallback.quality_scores.is_none());
        assert!(fallback.macro_perspective.is_none());
        assert!(fallback.sources.is_none());
        assert_eq!(fallback.tokens, 0);
        assert!(fallback.is_fallback());
        assert!(!fallback.is_complete());
    }

    #[test]
    fn test_partial_result_is_not_fallback() {
        let result = AnalysisResult {
            main_facts: Some("Fakta".to_string()),
            ..Default::default()
        };
        assert!(!result.is_fallback());
    }

    #[test]
    fn test_missing_nested_fields_deserialize_as_none() {
        let json = r#"{
            "main_facts": null,
            "bias_assessment": {"label": "neutral"},
            "factual_accuracy": {},
            "quality_scores": {"accuracy": 80},
            "macro_perspective": null,
            "sources": ["SCB"]
        }"#;
        let result: AnalysisResult = serde_json::from_str(json).unwrap();
        assert_eq!(
            result.bias_assessment.unwrap().label.as_deref(),
            Some("neutral")
        );
        assert_eq!(result.quality_scores.unwrap().depth, None);
        assert_eq!(result.tokens, 0);
    }

    #[test]
    fn test_overall_quality_requires_all_scores() {
        let scores = QualityScores {
            accuracy: Some(80),
            source_reliability: Some(60),
            balance: Some(70),
            depth: Some(50),
        };
        assert_eq!(scores.overall(), Some(65.0));

        let partial = QualityScores {
            depth: None,
            ..scores
        };
        assert_eq!(partial.overall(), None);
    }

    #[test]
    fn test_decode_current_payload() {
        let result = AnalysisResult {
            main_facts: Some("Fakta".to_string()),
            tokens: 42,
            ..Default::default()
        };
        let raw = serde_json::to_string(&result).unwrap();
        assert_eq!(
            StoredAnalysis::decode(Some(ANALYSIS_SCHEMA_VERSION), &raw),
            StoredAnalysis::Current(result)
        );
    }

    #[test]
    fn test_decode_unversioned_payload_is_legacy() {
        let raw = r#"{"balanced_title": "X", "bias_score": 0.2}"#;
        let stored = StoredAnalysis::decode(None, raw);
        assert!(stored.is_legacy());
        if let StoredAnalysis::Legacy { version, payload } = stored {
            assert_eq!(version, None);
            assert_eq!(payload["bias_score"], 0.2);
        }
    }

    #[test]
    fn test_decode_garbage_keeps_raw_text() {
        let stored = StoredAnalysis::decode(Some(ANALYSIS_SCHEMA_VERSION), "not json");
        assert_eq!(
            stored,
            StoredAnalysis::Legacy {
                version: Some(ANALYSIS_SCHEMA_VERSION),
                payload: serde_json::Value::String("not json".to_string()),
            }
        );
    }
}
