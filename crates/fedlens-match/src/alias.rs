use crate::text::normalize_name;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Synthetic scores assigned to text-match confidence tiers when blending
/// with vector similarity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TextMatchScores {
    pub high: f32,
    pub medium: f32,
    pub low: f32,
}

impl Default for TextMatchScores {
    fn default() -> Self {
        Self {
            high: 0.85,
            medium: 0.70,
            low: 0.55,
        }
    }
}

/// Externally-maintained matching configuration.
///
/// The alias table maps a canonical company key to the name fragments known
/// to belong to that family. It is curated data, not derived from the
/// record sets, so deployments are expected to supply a fresher copy via
/// [`MatchConfig::from_json_file`]; the built-in default only covers the
/// large multi-brand vendors.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchConfig {
    /// canonical company -> known aliases (brands, products, subsidiaries).
    pub company_aliases: BTreeMap<String, Vec<String>>,
    /// Generic participant classes never proposed as vendor candidates.
    pub excluded_participants: Vec<String>,
    /// Minimum stored vector-similarity score considered a hit.
    pub vector_score_threshold: f32,
    pub text_match_scores: TextMatchScores,
}

impl Default for MatchConfig {
    fn default() -> Self {
        let families: [(&str, &[&str]); 10] = [
            (
                "microsoft",
                &["microsoft", "azure", "openai", "copilot", "github"],
            ),
            (
                "google",
                &["google", "alphabet", "gemini", "vertex", "deepmind"],
            ),
            ("amazon", &["amazon", "aws", "bedrock"]),
            ("anthropic", &["anthropic", "claude"]),
            ("meta", &["meta", "facebook", "llama"]),
            ("ibm", &["ibm", "watson", "watsonx"]),
            ("oracle", &["oracle"]),
            ("salesforce", &["salesforce", "slack", "mulesoft"]),
            ("palantir", &["palantir", "foundry", "gotham"]),
            ("nvidia", &["nvidia"]),
        ];
        let company_aliases = families
            .into_iter()
            .map(|(canonical, aliases)| {
                (
                    canonical.to_string(),
                    aliases.iter().map(|a| a.to_string()).collect(),
                )
            })
            .collect();

        Self {
            company_aliases,
            excluded_participants: [
                "victims",
                "users",
                "employees",
                "applicants",
                "customers",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            vector_score_threshold: 0.70,
            text_match_scores: TextMatchScores::default(),
        }
    }
}

impl MatchConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read match config '{}'", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse match config '{}'", path.display()))?;
        Ok(config)
    }

    /// Resolve a raw name to its canonical company family, if any alias
    /// occurs inside the normalized name.
    pub fn canonical_company(&self, raw_name: &str) -> Option<&str> {
        let normalized = normalize_name(raw_name);
        if normalized.is_empty() {
            return None;
        }
        for (canonical, aliases) in &self.company_aliases {
            for alias in aliases {
                let alias_norm = normalize_name(alias);
                if !alias_norm.is_empty() && normalized.contains(&alias_norm) {
                    return Some(canonical.as_str());
                }
            }
        }
        None
    }

    /// Generic participant classes ("victims", "users", ...) are filtered
    /// out before entity-to-product matching runs.
    pub fn is_excluded_participant(&self, raw_name: &str) -> bool {
        let normalized = normalize_name(raw_name);
        self.excluded_participants
            .iter()
            .any(|p| normalize_name(p) == normalized)
    }
}
