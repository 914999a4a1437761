use crate::alias::MatchConfig;
use crate::{Confidence, NameMatch};

/// Shortest contained-name length that still counts as a medium-confidence
/// substring hit; 3–4 significant characters only earn low confidence.
const SUBSTRING_MEDIUM_LEN: usize = 5;
const SUBSTRING_LOW_LEN: usize = 3;

/// Normalize an organization name for comparison: lowercase, drop every
/// non-alphanumeric character (keeping word separation), collapse
/// whitespace runs.
pub fn normalize_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        if ch.is_alphanumeric() {
            for lower in ch.to_lowercase() {
                out.push(lower);
            }
            last_was_space = false;
        } else if !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Decide whether two raw names refer to the same organization.
///
/// Check order: exact, prefix, substring containment, then the alias table.
/// Alias-table hits short-circuit to high confidence even for short or
/// ambiguous strings; that is a deliberate precision/recall tradeoff for
/// known multi-brand vendors, not an oversight.
pub fn match_names(a: &str, b: &str, config: &MatchConfig) -> Option<NameMatch> {
    let na = normalize_name(a);
    let nb = normalize_name(b);
    if na.is_empty() || nb.is_empty() {
        return None;
    }

    if na == nb {
        return Some(NameMatch {
            confidence: Confidence::High,
            reason: "exact match".to_string(),
        });
    }

    if na.starts_with(&nb) || nb.starts_with(&na) {
        return Some(NameMatch {
            confidence: Confidence::High,
            reason: "prefix match".to_string(),
        });
    }

    let (shorter, longer) = if na.len() <= nb.len() {
        (&na, &nb)
    } else {
        (&nb, &na)
    };
    if longer.contains(shorter.as_str()) {
        let significant = shorter.chars().filter(|c| !c.is_whitespace()).count();
        if significant >= SUBSTRING_MEDIUM_LEN {
            return Some(NameMatch {
                confidence: Confidence::Medium,
                reason: "substring match".to_string(),
            });
        }
        if significant >= SUBSTRING_LOW_LEN {
            return Some(NameMatch {
                confidence: Confidence::Low,
                reason: "substring match (low specificity)".to_string(),
            });
        }
        // Under 3 significant characters a containment hit is noise.
    }

    if let (Some(ca), Some(cb)) = (config.canonical_company(a), config.canonical_company(b)) {
        if ca == cb {
            return Some(NameMatch {
                confidence: Confidence::High,
                reason: format!("company family match: {ca}"),
            });
        }
    }

    None
}
