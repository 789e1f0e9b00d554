//! Fuzzy matcher - scores every catalog entity against a target phrase.
//!
//! Scoring blends Jaro-Winkler similarity with token-set overlap, adds a
//! bonus for substring containment, and penalizes large length mismatches.
//! An entity's score is the maximum over its friendly name, aliases, and
//! area-expanded combinations. Recomputed fresh on every call; scores are
//! comparable only within one pass.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use relay_common::types::{CatalogEntity, MatchResult, Verb};

use crate::catalog::CatalogSnapshot;
use crate::intent::normalize;
use crate::resolver;

/// Weight of the character-level similarity in the blended score
const SEQUENCE_WEIGHT: f64 = 0.55;

/// Weight of the token-set overlap in the blended score
const TOKEN_WEIGHT: f64 = 0.45;

/// Bonus when one phrase contains the other verbatim
const CONTAINMENT_BONUS: f64 = 0.08;

/// Token-count difference tolerated before the length penalty kicks in
const LENGTH_TOLERANCE: usize = 2;

/// Penalty per token of mismatch beyond the tolerance window
const LENGTH_PENALTY: f64 = 0.04;

fn token_set(s: &str) -> HashSet<&str> {
    s.split_whitespace().collect()
}

fn token_overlap(a: &str, b: &str) -> f64 {
    let a_set = token_set(a);
    let b_set = token_set(b);
    if a_set.is_empty() || b_set.is_empty() {
        return 0.0;
    }
    let intersection = a_set.intersection(&b_set).count();
    let union = a_set.union(&b_set).count();
    intersection as f64 / union.max(1) as f64
}

/// Blended similarity of two normalized phrases, in [0, 1].
fn similarity(a: &str, b: &str) -> f64 {
    SEQUENCE_WEIGHT * strsim::jaro_winkler(a, b) + TOKEN_WEIGHT * token_overlap(a, b)
}

/// Score one candidate phrase against the target.
fn phrase_score(target: &str, candidate: &str) -> f64 {
    let mut score = similarity(target, candidate);

    if target.contains(candidate) || candidate.contains(target) {
        score += CONTAINMENT_BONUS;
    }

    let target_len = target.split_whitespace().count();
    let candidate_len = candidate.split_whitespace().count();
    let diff = target_len.abs_diff(candidate_len);
    if diff > LENGTH_TOLERANCE {
        score -= LENGTH_PENALTY * (diff - LENGTH_TOLERANCE) as f64;
    }

    score.clamp(0.0, 1.0)
}

/// All phrases an entity can be addressed by: friendly name, aliases, and
/// area-expanded combinations ("office" + "light" and back).
pub fn candidate_phrases(entity: &CatalogEntity) -> Vec<String> {
    let name = normalize(&entity.friendly_name);
    let mut phrases = BTreeSet::new();
    phrases.insert(name.clone());

    for alias in &entity.aliases {
        phrases.insert(normalize(alias));
    }

    if let Some(area) = &entity.area {
        let area = normalize(area);
        if !area.is_empty() {
            // "office light" in area "office" is also addressable as "light"
            if let Some(short) = name.strip_prefix(&format!("{} ", area)) {
                phrases.insert(short.trim().to_string());
            }
            if !name.starts_with(&format!("{} ", area)) {
                phrases.insert(format!("{} {}", area, name));
            }
        }
    }

    phrases.retain(|p| !p.is_empty());
    phrases.into_iter().collect()
}

fn best_phrase(target: &str, entity: &CatalogEntity) -> (f64, String) {
    let mut best_score = 0.0;
    let mut best_alias = String::new();
    for phrase in candidate_phrases(entity) {
        let score = phrase_score(target, &phrase);
        if score > best_score {
            best_score = score;
            best_alias = phrase;
        }
    }
    (best_score, best_alias)
}

/// Rank every entity in the snapshot against the target phrase, best first.
///
/// Ties break deterministically: verb-compatible domain first, then
/// lexicographic entity id, so identical inputs always produce the same
/// winner.
pub fn rank(target_phrase: &str, snapshot: &CatalogSnapshot, verb: Verb) -> Vec<MatchResult> {
    let target = normalize(target_phrase);

    let mut results: Vec<MatchResult> = snapshot
        .entities
        .iter()
        .map(|entity| {
            let (score, matched_alias) = best_phrase(&target, entity);
            MatchResult {
                entity: entity.clone(),
                score,
                matched_alias,
            }
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| {
                let a_compatible = resolver::supports(verb, a.entity.domain);
                let b_compatible = resolver::supports(verb, b.entity.domain);
                b_compatible.cmp(&a_compatible)
            })
            .then_with(|| a.entity.id.cmp(&b.entity.id))
    });

    results
}
