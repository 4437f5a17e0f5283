//! Per-bucket model policy.
//!
//! A [`PolicyTable`] maps every [`Bucket`] to the model identifier and the
//! output budgets used when analysing an article of that topic. The table is
//! built once at process start: compiled-in defaults, then an optional YAML
//! file, then environment variables (`OPENAI_MODEL_<BUCKET>`,
//! `MAX_WORDS_<BUCKET>`, `MAX_TOKENS_<BUCKET>`).

use crate::classifier::Bucket;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Model identifier and output budgets for one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelPolicy {
    pub model_id: String,
    pub max_output_words: u32,
    pub max_output_tokens: u32,
}

impl ModelPolicy {
    fn new(model_id: &str, max_output_words: u32, max_output_tokens: u32) -> Self {
        Self {
            model_id: model_id.to_string(),
            max_output_words,
            max_output_tokens,
        }
    }
}

/// Partial policy as read from the YAML override file.
#[derive(Debug, Default, Deserialize)]
struct PolicyOverride {
    model: Option<String>,
    max_words: Option<u32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct PolicyTable {
    default: ModelPolicy,
    buckets: HashMap<Bucket, ModelPolicy>,
}

impl Default for PolicyTable {
    fn default() -> Self {
        let heavy = ModelPolicy::new("gpt-4.1", 200, 3000);
        let light = ModelPolicy::new("gpt-4.1-nano", 70, 1000);
        let buckets = HashMap::from([
            (Bucket::Geopolitics, heavy.clone()),
            (Bucket::Economics, heavy.clone()),
            (Bucket::Policy, heavy),
            (Bucket::Sports, light.clone()),
            (Bucket::Culture, light),
        ]);
        Self {
            default: ModelPolicy::new("gpt-4.1-mini", 100, 1500),
            buckets,
        }
    }
}

impl PolicyTable {
    /// Resolve the policy for a bucket, falling back to the `default` entry.
    pub fn policy_for(&self, bucket: Bucket) -> &ModelPolicy {
        self.buckets.get(&bucket).unwrap_or(&self.default)
    }

    /// Resolve the policy for a bucket name; unknown names get the default.
    pub fn policy_for_name(&self, name: &str) -> &ModelPolicy {
        match name.parse::<Bucket>() {
            Ok(bucket) => self.policy_for(bucket),
            Err(_) => &self.default,
        }
    }

    /// Build the table from defaults, an optional YAML file and the process
    /// environment.
    #[instrument(level = "info", skip_all)]
    pub fn load(policy_file: Option<&Path>) -> Result<Self> {
        let mut table = Self::default();
        if let Some(path) = policy_file {
            let yaml = std::fs::read_to_string(path)?;
            table.apply_yaml(&yaml)?;
            info!(path = %path.display(), "Applied policy file");
        }
        table.apply_env(|key| std::env::var(key).ok());
        Ok(table)
    }

    /// Apply overrides from a YAML document keyed by bucket name.
    ///
    /// ```yaml
    /// sports:
    ///   model: gpt-4.1-mini
    ///   max_words: 90
    /// ```
    pub fn apply_yaml(&mut self, yaml: &str) -> Result<()> {
        let overrides: HashMap<String, PolicyOverride> =
            serde_yaml::from_str(yaml).map_err(|e| Error::Config(e.to_string()))?;
        for (name, patch) in overrides {
            let bucket = name.parse::<Bucket>().map_err(Error::Config)?;
            let policy = self.entry_mut(bucket);
            if let Some(model) = patch.model {
                policy.model_id = model;
            }
            if let Some(words) = patch.max_words {
                policy.max_output_words = words;
            }
            if let Some(tokens) = patch.max_tokens {
                policy.max_output_tokens = tokens;
            }
        }
        Ok(())
    }

    /// Apply overrides read through `lookup`, normally `std::env::var`.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for bucket in Bucket::ALL {
            let suffix = bucket.as_str().to_uppercase();
            let policy = self.entry_mut(bucket);
            if let Some(model) = lookup(&format!("OPENAI_MODEL_{suffix}")) {
                policy.model_id = model;
            }
            if let Some(words) = parse_number(&lookup, &format!("MAX_WORDS_{suffix}")) {
                policy.max_output_words = words;
            }
            if let Some(tokens) = parse_number(&lookup, &format!("MAX_TOKENS_{suffix}")) {
                policy.max_output_tokens = tokens;
            }
        }
    }

    fn entry_mut(&mut self, bucket: Bucket) -> &mut ModelPolicy {
        if bucket == Bucket::Default {
            return &mut self.default;
        }
        let default = self.default.clone();
        self.buckets.entry(bucket).or_insert(default)
    }
}

fn parse_number<F>(lookup: &F, key: &str) -> Option<u32>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, value = %raw, error = %e, "Ignoring non-numeric policy override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_bucket_resolves_to_a_full_policy() {
        let table = PolicyTable::default();
        for bucket in Bucket::ALL {
            let policy = table.policy_for(bucket);
            assert!(!policy.model_id.is_empty());
            assert!(policy.max_output_words > 0);
            assert!(policy.max_output_tokens > 0);
        }
    }

    #[test]
    fn test_unknown_name_gets_default_policy() {
        let table = PolicyTable::default();
        assert_eq!(
            table.policy_for_name("nonexistent-bucket"),
            table.policy_for(Bucket::Default)
        );
        assert_eq!(table.policy_for(Bucket::Default).model_id, "gpt-4.1-mini");
    }

    #[test]
    fn test_geopolitics_defaults() {
        let table = PolicyTable::default();
        assert_eq!(
            table.policy_for_name("geopolitics"),
            &ModelPolicy::new("gpt-4.1", 200, 3000)
        );
        assert_eq!(
            table.policy_for(Bucket::Sports),
            &ModelPolicy::new("gpt-4.1-nano", 70, 1000)
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut table = PolicyTable::default();
        let env = HashMap::from([
            ("OPENAI_MODEL_SPORTS".to_string(), "gpt-4o".to_string()),
            ("MAX_WORDS_SPORTS".to_string(), "55".to_string()),
            ("MAX_TOKENS_DEFAULT".to_string(), "not-a-number".to_string()),
        ]);
        table.apply_env(|key| env.get(key).cloned());

        let sports = table.policy_for(Bucket::Sports);
        assert_eq!(sports.model_id, "gpt-4o");
        assert_eq!(sports.max_output_words, 55);
        assert_eq!(sports.max_output_tokens, 1000);
        assert_eq!(table.policy_for(Bucket::Default).max_output_tokens, 1500);
    }

    #[test]
    fn test_yaml_overrides() {
        let mut table = PolicyTable::default();
        table
            .apply_yaml("culture:\n  model: gpt-4.1-mini\n  max_tokens: 1200\ndefault:\n  max_words: 80\n")
            .unwrap();
        let culture = table.policy_for(Bucket::Culture);
        assert_eq!(culture.model_id, "gpt-4.1-mini");
        assert_eq!(culture.max_output_tokens, 1200);
        assert_eq!(culture.max_output_words, 70);
        assert_eq!(table.policy_for(Bucket::Default).max_output_words, 80);
    }

    #[test]
    fn test_yaml_with_unknown_bucket_is_rejected() {
        let mut table = PolicyTable::default();
        assert!(table.apply_yaml("weather:\n  model: x\n").is_err());
    }
}
