//! Tiered entity resolution.
//!
//! ## Resolution Order
//!
//! 1. Case-insensitive canonical name match (Exact, single result)
//! 2. Case-insensitive alias match (Exact, single result)
//! 3. Fuzzy ranking of every candidate on normalized forms
//!
//! The first tier that produces a result wins. Authoritative hits are never
//! re-ranked against fuzzy scores of other candidates.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, trace};
use tradewind_core::defaults::MEDIUM_CONFIDENCE_THRESHOLD;
use tradewind_core::{
    CanonicalEntity, EntityKind, EntityRegistry, MatchOrigin, MatchResult, Result,
};

use crate::normalize::normalize;
use crate::similarity::similarity;

/// Resolve `raw_name` against an in-memory registry snapshot.
///
/// Returns at most `limit` results, best first. Never fails.
pub fn resolve(raw_name: &str, candidates: &[CanonicalEntity], limit: usize) -> Vec<MatchResult> {
    if limit == 0 {
        return Vec::new();
    }
    let key = raw_name.trim().to_lowercase();

    if let Some(hit) = candidates.iter().find(|c| c.name.to_lowercase() == key) {
        return vec![MatchResult::exact(hit.clone(), MatchOrigin::ExactName)];
    }
    if let Some(hit) = candidates.iter().find(|c| c.has_alias(&key)) {
        return vec![MatchResult::exact(hit.clone(), MatchOrigin::Alias)];
    }
    fuzzy_rank(raw_name, candidates, limit)
}

/// Fuzzy tier only: score every candidate by its best name or alias
/// similarity, drop scores under the Medium threshold, and keep the top
/// `limit` in descending score with registry order breaking ties.
pub fn fuzzy_rank(raw_name: &str, candidates: &[CanonicalEntity], limit: usize) -> Vec<MatchResult> {
    let needle = normalize(raw_name);
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut scored: Vec<(f64, &CanonicalEntity)> = candidates
        .iter()
        .filter_map(|candidate| {
            let best = std::iter::once(&candidate.name)
                .chain(candidate.aliases.iter())
                .map(|s| normalize(s))
                .filter(|s| !s.is_empty())
                .map(|s| similarity(&needle, &s))
                .fold(None, |acc: Option<f64>, score| {
                    Some(acc.map_or(score, |a| a.max(score)))
                })?;
            trace!(candidate = %candidate.name, score = best, "fuzzy score");
            (best >= MEDIUM_CONFIDENCE_THRESHOLD).then_some((best, candidate))
        })
        .collect();

    // sort_by is stable, so equal scores keep registry order
    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored
        .into_iter()
        .take(limit)
        .map(|(score, entity)| MatchResult::fuzzy(entity.clone(), score))
        .collect()
}

/// Resolver backed by the canonical registry.
///
/// Exact and alias tiers use indexed point lookups; only when both miss is
/// the full candidate list fetched for fuzzy ranking.
#[derive(Clone)]
pub struct EntityResolver {
    registry: Arc<dyn EntityRegistry>,
}

impl EntityResolver {
    pub fn new(registry: Arc<dyn EntityRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<dyn EntityRegistry> {
        &self.registry
    }

    /// Resolve a raw name of the given kind. Errors only when the registry
    /// itself fails.
    #[instrument(skip(self), fields(subsystem = "search", component = "resolver"))]
    pub async fn resolve(
        &self,
        kind: EntityKind,
        raw_name: &str,
        limit: usize,
    ) -> Result<Vec<MatchResult>> {
        let start = Instant::now();
        if limit == 0 {
            return Ok(Vec::new());
        }
        let name = raw_name.trim();

        if let Some(hit) = self.registry.get_by_exact_name(kind, name).await? {
            debug!(entity_id = hit.id, "exact name match");
            return Ok(vec![MatchResult::exact(hit, MatchOrigin::ExactName)]);
        }
        if let Some(hit) = self.registry.get_by_alias(kind, name).await? {
            debug!(entity_id = hit.id, "alias match");
            return Ok(vec![MatchResult::exact(hit, MatchOrigin::Alias)]);
        }

        let candidates = self.registry.list_candidates(kind).await?;
        let matches = fuzzy_rank(raw_name, &candidates, limit);
        debug!(
            result_count = matches.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            candidates = candidates.len(),
            "fuzzy resolution complete"
        );
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradewind_core::{Confidence, EntityMetadata};

    fn item(id: i64, name: &str, aliases: &[&str]) -> CanonicalEntity {
        CanonicalEntity {
            id,
            kind: EntityKind::Item,
            name: name.to_string(),
            display_name: name.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            metadata: EntityMetadata::Item {
                is_tagged: false,
                tags: Vec::new(),
            },
        }
    }

    #[test]
    fn test_exact_name_case_insensitive() {
        let reg = vec![item(1, "Cannon", &[]), item(2, "Cannonball", &[])];
        let out = resolve("cANNON", &reg, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_id(), Some(1));
        assert_eq!(out[0].confidence, Confidence::Exact);
        assert_eq!(out[0].origin, Some(MatchOrigin::ExactName));
        assert_eq!(out[0].score, 1.0);
    }

    #[test]
    fn test_alias_match() {
        let reg = vec![item(1, "Port Royal", &["Port Royale"])];
        let out = resolve("port royale", &reg, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].origin, Some(MatchOrigin::Alias));
        assert_eq!(out[0].confidence, Confidence::Exact);
    }

    #[test]
    fn test_exact_short_circuits_fuzzy_decoy() {
        // "Rum" is an exact hit; "Rums" would be a strong fuzzy decoy for "rum"
        // under normalization but must never be ranked.
        let reg = vec![item(1, "Rums", &[]), item(2, "RUM", &[])];
        let out = resolve("rum", &reg, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_id(), Some(2));
        assert_eq!(out[0].origin, Some(MatchOrigin::ExactName));
    }

    #[test]
    fn test_exact_name_wins_over_alias_of_other_entity() {
        let reg = vec![item(1, "Planks", &["Wood"]), item(2, "Wood", &[])];
        let out = resolve("wood", &reg, 5);
        assert_eq!(out[0].entity_id(), Some(2));
        assert_eq!(out[0].origin, Some(MatchOrigin::ExactName));
    }

    #[test]
    fn test_fuzzy_tiers_and_threshold() {
        let reg = vec![
            item(1, "Canon", &[]),
            item(2, "Cannons", &[]),
            item(3, "Sugar", &[]),
        ];
        let out = resolve("Cannon", &reg, 5);
        // "cannon" vs "cannons": 1 edit / 7 -> 0.857 (High)
        // "cannon" vs "canon": 1 edit / 6 -> 0.833 (Medium)
        // "sugar" is discarded
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].entity_id(), Some(2));
        assert_eq!(out[0].confidence, Confidence::High);
        assert_eq!(out[1].entity_id(), Some(1));
        assert_eq!(out[1].confidence, Confidence::Medium);
        assert!(out.iter().all(|m| m.origin == Some(MatchOrigin::Fuzzy)));
    }

    #[test]
    fn test_fuzzy_high_tier() {
        let reg = vec![item(1, "Port Royal", &[])];
        let out = resolve("Port Royall!", &reg, 5);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].confidence, Confidence::High);
        assert!(out[0].score >= 0.85);
    }

    #[test]
    fn test_fuzzy_perfect_normalized_score_is_high_not_exact() {
        let reg = vec![item(1, "St. John's", &[])];
        let out = resolve("st johns", &reg, 5);
        assert_eq!(out[0].score, 1.0);
        assert_eq!(out[0].confidence, Confidence::High);
        assert_eq!(out[0].origin, Some(MatchOrigin::Fuzzy));
    }

    #[test]
    fn test_fuzzy_uses_best_alias_score() {
        let reg = vec![item(1, "Iron Ingot", &["Iron Bar"])];
        let out = resolve("iron bars", &reg, 5);
        assert_eq!(out.len(), 1);
        assert!(out[0].score > 0.85);
    }

    #[test]
    fn test_fuzzy_ties_keep_registry_order() {
        let reg = vec![item(7, "Rope", &[]), item(3, "Rose", &[]), item(5, "Robe", &[])];
        let out = resolve("Rode", &reg, 5);
        let ids: Vec<_> = out.iter().filter_map(|m| m.entity_id()).collect();
        assert_eq!(ids, vec![7, 3, 5]);
    }

    #[test]
    fn test_limit_truncates() {
        let reg: Vec<_> = (1..=20).map(|i| item(i, "Rope", &[])).collect();
        assert_eq!(resolve("Ropes", &reg, 5).len(), 5);
        assert!(resolve("Ropes", &reg, 0).is_empty());
    }

    #[test]
    fn test_empty_normalized_name_never_scored() {
        let reg = vec![item(1, "---", &[]), item(2, "Rope", &[])];
        assert!(resolve("!!!", &reg, 5).is_empty());
        // a candidate that normalizes to empty is skipped, not matched
        assert_eq!(resolve("Rope!", &reg, 5)[0].entity_id(), Some(2));
        assert_eq!(resolve("Rope!", &reg, 5).len(), 1);
    }

    #[test]
    fn test_tier_monotonicity() {
        let reg = vec![
            item(1, "Gunpowder", &[]),
            item(2, "Gun Powder", &[]),
            item(3, "Gunpowdr", &[]),
            item(4, "Powder", &[]),
            item(5, "Gun", &[]),
        ];
        for raw in ["gunpowder barrel", "gun pwder", "powdr", "gunpow"] {
            for m in fuzzy_rank(raw, &reg, 10) {
                assert!(m.score >= MEDIUM_CONFIDENCE_THRESHOLD);
                if m.score >= 0.85 {
                    assert_eq!(m.confidence, Confidence::High);
                } else {
                    assert_eq!(m.confidence, Confidence::Medium);
                }
            }
        }
    }
}
