//! Organization-name matching heuristics for cross-record linking.
//!
//! Two paths are exposed:
//!
//! * [`text::match_names`] decides whether two raw name strings refer to the
//!   same real-world organization, returning a [`Confidence`] tier. It
//!   combines string normalization with a curated company-alias table
//!   ([`alias::MatchConfig`]) so multi-brand vendors ("Azure", "Copilot",
//!   "GitHub") all resolve to one family.
//! * [`hybrid::rank_related`] blends precomputed vector-similarity scores
//!   with text-match confidences into a single ranked candidate list for
//!   "related records" views.
//!
//! The alias table, participant exclusion list, and score thresholds are
//! configuration data; [`alias::MatchConfig::default`] carries the built-in
//! curated set and a JSON file can override it.

pub mod alias;
pub mod hybrid;
pub mod text;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Confidence tier for a name match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Confidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Confidence::High),
            "medium" => Ok(Confidence::Medium),
            "low" => Ok(Confidence::Low),
            other => Err(format!("unknown confidence tier: {other}")),
        }
    }
}

/// Outcome of comparing two organization names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameMatch {
    pub confidence: Confidence,
    /// Human-readable explanation, stored alongside generated match rows.
    pub reason: String,
}
