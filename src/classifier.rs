//! Keyword classification of articles into topic buckets.
//!
//! Buckets pick the model parameters used for analysis (see [`crate::policy`]).
//! Scoring is a linear scan over static Swedish/English vocabularies: each
//! keyword contributes the number of times it occurs as a substring of the
//! lower-cased title and summary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A topic category used to select model parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bucket {
    Geopolitics,
    Economics,
    Policy,
    Sports,
    Culture,
    Default,
}

impl Bucket {
    /// Buckets that are scored, in tie-break priority order.
    pub const SCORED: [Bucket; 5] = [
        Bucket::Geopolitics,
        Bucket::Economics,
        Bucket::Policy,
        Bucket::Sports,
        Bucket::Culture,
    ];

    pub const ALL: [Bucket; 6] = [
        Bucket::Geopolitics,
        Bucket::Economics,
        Bucket::Policy,
        Bucket::Sports,
        Bucket::Culture,
        Bucket::Default,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Bucket::Geopolitics => "geopolitics",
            Bucket::Economics => "economics",
            Bucket::Policy => "policy",
            Bucket::Sports => "sports",
            Bucket::Culture => "culture",
            Bucket::Default => "default",
        }
    }

    fn keywords(&self) -> &'static [&'static str] {
        match self {
            Bucket::Geopolitics => GEOPOLITICS,
            Bucket::Economics => ECONOMICS,
            Bucket::Policy => POLICY,
            Bucket::Sports => SPORTS,
            Bucket::Culture => CULTURE,
            Bucket::Default => &[],
        }
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Bucket {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Bucket::ALL
            .into_iter()
            .find(|bucket| bucket.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown bucket: {s}"))
    }
}

// All entries are lower-case.
const GEOPOLITICS: &[&str] = &[
    "nato",
    "ryssland",
    "ukraina",
    "kina",
    "usa",
    "iran",
    "israel",
    "gaza",
    "krig",
    "militär",
    "försvar",
    "säkerhetspolitik",
    "diplomat",
    "sanktion",
    "fn:s",
    "putin",
    "trump",
    "eu-kommissionen",
];

const ECONOMICS: &[&str] = &[
    "ekonomi",
    "inflation",
    "ränta",
    "riksbank",
    "börs",
    "aktie",
    "kronan",
    "bnp",
    "arbetslöshet",
    "budget",
    "skatter",
    "skatten",
    "skattesänk",
    "skattehöj",
    "tull",
    "handel",
    "konjunktur",
    "bostadspris",
];

const POLICY: &[&str] = &[
    "regeringen",
    "riksdag",
    "minister",
    "lagförslag",
    "proposition",
    "utredning",
    "migration",
    "kriminalitet",
    "polis",
    "skola",
    "vård",
    "valet",
    "valrörelse",
    "riksdagsval",
    "partiledare",
    "socialdemokrat",
    "moderat",
    "sverigedemokrat",
];

const SPORTS: &[&str] = &[
    "fotboll",
    "hockey",
    "allsvenskan",
    "shl",
    "landslag",
    "vm",
    "em-",
    "os ",
    "match",
    "mål",
    "tränare",
    "zlatan",
    "friidrott",
    "skidor",
];

const CULTURE: &[&str] = &[
    "kultur",
    "musik",
    "film",
    "teater",
    "konsten",
    "konstnär",
    "konstutställning",
    "boken",
    "bokmässa",
    "författare",
    "melodifestival",
    "eurovision",
    "artist",
    "konsert",
    "museum",
    "nobelpris",
];

/// Classify an article into a topic bucket.
///
/// The bucket with the strictly highest keyword count wins. Ties keep the
/// first bucket in [`Bucket::SCORED`] order; an all-zero score yields
/// [`Bucket::Default`].
///
/// # Examples
///
/// ```ignore
/// assert_eq!(classify("Regeringen möter press efter NATO-beslut", ""), Bucket::Geopolitics);
/// ```
pub fn classify(title: &str, summary: &str) -> Bucket {
    let text = format!("{title} {summary}").to_lowercase();

    let mut best = Bucket::Default;
    let mut best_score = 0usize;
    for bucket in Bucket::SCORED {
        let score = score(&text, bucket.keywords());
        if score > best_score {
            best = bucket;
            best_score = score;
        }
    }
    tracing::debug!(bucket = %best, score = best_score, "Classified article");
    best
}

fn score(text: &str, keywords: &[&str]) -> usize {
    keywords
        .iter()
        .map(|keyword| text.matches(keyword).count())
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_keywords_yields_default() {
        assert_eq!(classify("", ""), Bucket::Default);
        assert_eq!(classify("Solen lyser idag", "Fint väder i Lund"), Bucket::Default);
    }

    #[test]
    fn test_nato_headline_is_geopolitics() {
        // "regeringen" scores one for policy, "nato" one for geopolitics; the
        // tie goes to geopolitics.
        let bucket = classify(
            "Regeringen möter press efter NATO-beslut",
            "Oppositionen kräver svar.",
        );
        assert_eq!(bucket, Bucket::Geopolitics);
    }

    #[test]
    fn test_highest_count_wins() {
        let bucket = classify(
            "Riksbanken höjer räntan",
            "Inflationen och räntan pressar kronan",
        );
        assert_eq!(bucket, Bucket::Economics);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        assert_eq!(classify("ALLSVENSKAN: Fotboll", ""), Bucket::Sports);
        assert_eq!(classify("Ny FILM om Musik", ""), Bucket::Culture);
    }

    #[test]
    fn test_tie_goes_to_first_declared_bucket() {
        // one economics keyword, one culture keyword
        assert_eq!(classify("Börsen", "Konsert"), Bucket::Economics);
    }

    #[test]
    fn test_keywords_do_not_match_inside_common_words() {
        assert_eq!(
            classify("Domstolen konstaterar att mannen är skyldig", ""),
            Bucket::Default
        );
        assert_eq!(classify("Bilbranschen oroad över kvaliteten", ""), Bucket::Default);
        assert_eq!(classify("Experter uppskattar läget", "Ny valuta"), Bucket::Default);
        assert_eq!(classify("Bokstavligen", ""), Bucket::Default);
    }

    #[test]
    fn test_word_forms_still_match() {
        assert_eq!(classify("Konstnären ställer ut", "Konsten i fokus"), Bucket::Culture);
        assert_eq!(classify("Skatten sänks", ""), Bucket::Economics);
        assert_eq!(classify("Valet närmar sig", ""), Bucket::Policy);
    }

    #[test]
    fn test_classify_is_deterministic() {
        let title = "Ukraina och EU diskuterar handel";
        let summary = "Ministern talade om tullar och krig";
        let first = classify(title, summary);
        for _ in 0..10 {
            assert_eq!(classify(title, summary), first);
        }
    }

    #[test]
    fn test_bucket_parses_from_name() {
        for bucket in Bucket::ALL {
            assert_eq!(bucket.as_str().parse::<Bucket>().unwrap(), bucket);
        }
        assert!("weather".parse::<Bucket>().is_err());
    }
}
