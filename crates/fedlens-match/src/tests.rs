use crate::alias::MatchConfig;
use crate::hybrid::{rank_related, MatchSource, TextHit, VectorHit};
use crate::text::{match_names, normalize_name};
use crate::Confidence;

fn config() -> MatchConfig {
    MatchConfig::default()
}

#[test]
fn normalize_strips_punctuation_and_case() {
    assert_eq!(normalize_name("Micro$oft, Inc.!"), "micro oft inc");
    assert_eq!(normalize_name("  AWS   GovCloud  "), "aws govcloud");
    assert_eq!(normalize_name("___"), "");
}

#[test]
fn identical_names_match_high() {
    let m = match_names("Palantir Technologies", "palantir technologies", &config()).unwrap();
    assert_eq!(m.confidence, Confidence::High);
    assert_eq!(m.reason, "exact match");
}

#[test]
fn prefix_relation_matches_high() {
    let m = match_names("Booz Allen", "Booz Allen Hamilton Inc", &config()).unwrap();
    assert_eq!(m.confidence, Confidence::High);
    assert_eq!(m.reason, "prefix match");
}

#[test]
fn interior_substring_matches_medium() {
    let m = match_names("Deloitte", "US Deloitte Consulting LLP", &config()).unwrap();
    assert_eq!(m.confidence, Confidence::Medium);
}

#[test]
fn short_substring_only_earns_low() {
    // "sas" is contained in the longer name but carries little specificity.
    let m = match_names("SAS", "Federal SAS Analytics Office", &config()).unwrap();
    assert_eq!(m.confidence, Confidence::Low);
}

#[test]
fn company_family_matches_without_shared_substring() {
    // "Azure" and "OpenAI" share no substring but both belong to the
    // microsoft family.
    let m = match_names("Azure", "OpenAI", &config()).unwrap();
    assert_eq!(m.confidence, Confidence::High);
    assert_eq!(m.reason, "company family match: microsoft");
}

#[test]
fn family_match_spec_example() {
    let m = match_names("Azure", "Microsoft Corporation", &config()).unwrap();
    assert_eq!(m.confidence, Confidence::High);
    assert_eq!(m.reason, "company family match: microsoft");

    assert!(match_names("Acme Consulting Group", "Azure", &config()).is_none());
}

#[test]
fn unrelated_names_do_not_match() {
    assert!(match_names("General Dynamics", "Leidos", &config()).is_none());
    assert!(match_names("", "Leidos", &config()).is_none());
}

#[test]
fn generic_participants_are_excluded() {
    let cfg = config();
    for name in ["victims", "Users", "EMPLOYEES", "applicants", "customers"] {
        assert!(cfg.is_excluded_participant(name), "{name} should be excluded");
    }
    // Exclusion is an exact class check, not a substring one.
    assert!(!cfg.is_excluded_participant("Microsoft customers division"));
    assert!(!cfg.is_excluded_participant("Anthropic"));
}

#[test]
fn excluded_participant_is_still_excluded_if_aliased() {
    // Even if a curated table ever listed a generic class as an alias, the
    // exclusion check runs first in the link scripts; the config call
    // itself must keep reporting the exclusion.
    let mut cfg = config();
    cfg.company_aliases
        .get_mut("microsoft")
        .unwrap()
        .push("users".to_string());
    assert!(cfg.is_excluded_participant("users"));
}

#[test]
fn hybrid_pair_keeps_vector_score() {
    let cfg = config();
    let ranked = rank_related(
        vec![VectorHit {
            target_id: "p1".into(),
            score: 0.91,
        }],
        vec![TextHit {
            target_id: "p1".into(),
            confidence: Confidence::High,
            reason: "exact match".into(),
        }],
        &cfg,
        10,
    );
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].source, MatchSource::Hybrid);
    assert!((ranked[0].score - 0.91).abs() < f32::EPSILON);
    assert_eq!(ranked[0].confidence, Some(Confidence::High));
}

#[test]
fn vector_hits_below_threshold_are_dropped() {
    let cfg = config();
    let ranked = rank_related(
        vec![
            VectorHit {
                target_id: "weak".into(),
                score: 0.69,
            },
            VectorHit {
                target_id: "strong".into(),
                score: 0.70,
            },
        ],
        vec![],
        &cfg,
        10,
    );
    assert_eq!(ranked.len(), 1);
    assert_eq!(ranked[0].target_id, "strong");
}

#[test]
fn ranking_sorts_descending_and_truncates() {
    let cfg = config();
    let ranked = rank_related(
        vec![VectorHit {
            target_id: "v".into(),
            score: 0.75,
        }],
        vec![
            TextHit {
                target_id: "t-high".into(),
                confidence: Confidence::High,
                reason: "exact match".into(),
            },
            TextHit {
                target_id: "t-low".into(),
                confidence: Confidence::Low,
                reason: "substring match (low specificity)".into(),
            },
        ],
        &cfg,
        2,
    );
    assert_eq!(ranked.len(), 2);
    assert_eq!(ranked[0].target_id, "t-high"); // 0.85
    assert_eq!(ranked[1].target_id, "v"); // 0.75
}

#[test]
fn match_config_round_trips_through_json() {
    let cfg = config();
    let json = serde_json::to_string(&cfg).unwrap();
    let parsed: MatchConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.company_aliases, cfg.company_aliases);
    assert_eq!(parsed.excluded_participants, cfg.excluded_participants);
}

#[test]
fn partial_match_config_fills_defaults() {
    let parsed: MatchConfig =
        serde_json::from_str(r#"{"vector_score_threshold": 0.8}"#).unwrap();
    assert!((parsed.vector_score_threshold - 0.8).abs() < f32::EPSILON);
    assert!(parsed.company_aliases.contains_key("microsoft"));
}
