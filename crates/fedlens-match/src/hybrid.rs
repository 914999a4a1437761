use crate::alias::MatchConfig;
use crate::Confidence;
use serde::{Deserialize, Serialize};

/// A precomputed vector-similarity candidate for a (source, target) pair.
#[derive(Debug, Clone)]
pub struct VectorHit {
    pub target_id: String,
    pub score: f32,
}

/// A text-heuristic candidate for the same source.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub target_id: String,
    pub confidence: Confidence,
    pub reason: String,
}

/// Which signal produced a ranked match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Vector,
    Text,
    Hybrid,
}

impl MatchSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchSource::Vector => "vector",
            MatchSource::Text => "text",
            MatchSource::Hybrid => "hybrid",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedMatch {
    pub target_id: String,
    pub score: f32,
    pub source: MatchSource,
    pub confidence: Option<Confidence>,
    pub reason: Option<String>,
}

/// Blend vector-similarity hits with text-match hits into one ranked list.
///
/// Vector hits below the configured threshold are dropped. Text confidences
/// map to synthetic scores (high/medium/low). A pair surfaced by both
/// signals is relabeled `hybrid` and keeps the vector score, which is the
/// more informative of the two. Sorted descending by score, truncated to
/// `limit`.
pub fn rank_related(
    vector_hits: Vec<VectorHit>,
    text_hits: Vec<TextHit>,
    config: &MatchConfig,
    limit: usize,
) -> Vec<RankedMatch> {
    let mut merged: Vec<RankedMatch> = Vec::with_capacity(vector_hits.len() + text_hits.len());

    for hit in vector_hits {
        if hit.score < config.vector_score_threshold {
            continue;
        }
        merged.push(RankedMatch {
            target_id: hit.target_id,
            score: hit.score,
            source: MatchSource::Vector,
            confidence: None,
            reason: None,
        });
    }

    for hit in text_hits {
        let synthetic = match hit.confidence {
            Confidence::High => config.text_match_scores.high,
            Confidence::Medium => config.text_match_scores.medium,
            Confidence::Low => config.text_match_scores.low,
        };
        if let Some(existing) = merged.iter_mut().find(|m| m.target_id == hit.target_id) {
            // Vector score wins; the text side contributes its label.
            existing.source = MatchSource::Hybrid;
            existing.confidence = Some(hit.confidence);
            existing.reason = Some(hit.reason);
        } else {
            merged.push(RankedMatch {
                target_id: hit.target_id,
                score: synthetic,
                source: MatchSource::Text,
                confidence: Some(hit.confidence),
                reason: Some(hit.reason),
            });
        }
    }

    merged.sort_by(|a, b| b.score.total_cmp(&a.score));
    merged.truncate(limit);
    merged
}
