//! Claim counting over the factual-accuracy narratives.
//!
//! The prompt asks for one claim per line, tagged `Säkerhet: hög|medel|låg`
//! and optionally `Korrigering: <motbevis>`. A line counts as verified when it
//! carries a high or medium confidence marker, and as corrected when its
//! correction marker has real content.

use crate::models::AnalysisResult;
use once_cell::sync::Lazy;
use regex::Regex;

static CONFIDENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:säkerhet|confidence)\s*:\s*(hög|medel|high|medium)\b")
        .expect("confidence regex is valid")
});

static CORRECTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:korrigering|correction)\s*:\s*([^|\n]*)").expect("correction regex is valid")
});

/// Placeholders models write instead of leaving the correction empty.
const EMPTY_CORRECTIONS: &[&str] = &["ingen", "inget", "inga", "tomt", "saknas", "none", "n/a"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClaimCounts {
    pub verified: i64,
    pub corrected: i64,
}

/// Count verified and corrected claims in a result.
///
/// Both narratives are scanned line by line. A fallback result counts zero.
pub fn count_claims(result: &AnalysisResult) -> ClaimCounts {
    let Some(accuracy) = &result.factual_accuracy else {
        return ClaimCounts::default();
    };

    let mut counts = ClaimCounts::default();
    let narratives = [
        accuracy.claim_verification.as_deref(),
        accuracy.unsupported_assertions.as_deref(),
    ];
    for line in narratives.into_iter().flatten().flat_map(str::lines) {
        if CONFIDENCE.is_match(line) {
            counts.verified += 1;
        }
        if has_correction(line) {
            counts.corrected += 1;
        }
    }
    counts
}

fn has_correction(line: &str) -> bool {
    CORRECTION.captures(line).is_some_and(|caps| {
        let raw = caps[1].trim();
        // the template placeholder echoed back verbatim
        if raw.starts_with('<') && raw.ends_with('>') {
            return false;
        }
        let text = raw.trim_matches(|c: char| c.is_whitespace() || "-–.'\"".contains(c));
        !text.is_empty() && !EMPTY_CORRECTIONS.contains(&text.to_lowercase().as_str())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FactualAccuracy;

    fn with_narratives(claims: &str, unsupported: &str) -> AnalysisResult {
        AnalysisResult {
            factual_accuracy: Some(FactualAccuracy {
                claim_verification: Some(claims.to_string()),
                unsupported_assertions: Some(unsupported.to_string()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_fallback_counts_nothing() {
        assert_eq!(count_claims(&AnalysisResult::fallback()), ClaimCounts::default());
    }

    #[test]
    fn test_counts_high_and_medium_confidence() {
        let result = with_narratives(
            "- Sverige är medlem i Nato | Säkerhet: hög | Korrigering:\n\
             - Beslutet togs i mars | Säkerhet: medel | Korrigering: \n\
             - Alla partier stödde beslutet | Säkerhet: låg | Korrigering: V röstade nej",
            "",
        );
        assert_eq!(
            count_claims(&result),
            ClaimCounts {
                verified: 2,
                corrected: 1
            }
        );
    }

    #[test]
    fn test_placeholder_corrections_are_ignored() {
        let result = with_narratives(
            "- A | Säkerhet: HÖG | Korrigering: ingen\n\
             - B | Säkerhet: låg | Korrigering: -\n\
             - C | Säkerhet: låg | Korrigering: <motbevis eller tomt>",
            "- D | Korrigering: Siffran gäller 2023, inte 2024",
        );
        assert_eq!(
            count_claims(&result),
            ClaimCounts {
                verified: 1,
                corrected: 1
            }
        );
    }

    #[test]
    fn test_english_markers_are_accepted() {
        let result = with_narratives("- X | Confidence: high | Correction: wrong year", "");
        assert_eq!(
            count_claims(&result),
            ClaimCounts {
                verified: 1,
                corrected: 1
            }
        );
    }
}
