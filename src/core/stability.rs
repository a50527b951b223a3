use crate::core::score_table::ScoreTable;
use crate::models::{BlockingPair, Matching, PairScore, StabilityReport};

/// Check a matching for blocking pairs
///
/// Reads scores through the same table the matcher builds, with the
/// threshold and side assignment recorded in the matching. A pair blocks
/// when both members strictly prefer each other to their current partners;
/// being unmatched is worse than any acceptable partner.
///
/// # Arguments
/// * `matching` - Matching to check; also supplies sides and threshold
/// * `scores` - The directed scores the matching was computed from
///
/// # Returns
/// StabilityReport listing blocking pairs in id order
pub fn validate_stability(matching: &Matching, scores: &[PairScore]) -> StabilityReport {
    let table = ScoreTable::build(scores, matching.min_score, matching);
    let partners_of_b = matching.partners_of_b();

    let current = |id: usize, partner: Option<&str>| -> Option<f64> {
        partner.map(|p| {
            table
                .index_of(p)
                .and_then(|p| table.score_at(id, p))
                .unwrap_or(0.0)
        })
    };
    let prefers = |score: f64, held: Option<f64>| held.map_or(true, |h| score > h);

    let mut violations = Vec::new();
    for (ia, ib) in table.pair_indices() {
        let (a, b) = (table.id(ia), table.id(ib));
        let partner_of_a = matching.pairs.get(a).map(String::as_str);
        if partner_of_a == Some(b) {
            continue;
        }
        let partner_of_b = partners_of_b.get(b).copied();

        let (Some(score_ab), Some(score_ba)) = (table.score_at(ia, ib), table.score_at(ib, ia)) else {
            continue;
        };

        if prefers(score_ab, current(ia, partner_of_a)) && prefers(score_ba, current(ib, partner_of_b)) {
            violations.push(BlockingPair {
                a: a.to_string(),
                b: b.to_string(),
                partner_of_a: partner_of_a.map(str::to_string),
                partner_of_b: partner_of_b.map(str::to_string),
                score_ab,
                score_ba,
            });
        }
    }

    if violations.is_empty() {
        tracing::debug!(pairs = matching.len(), "Matching is stable");
    } else {
        for v in &violations {
            tracing::warn!(
                a = %v.a,
                b = %v.b,
                score_ab = v.score_ab,
                score_ba = v.score_ba,
                "Blocking pair"
            );
        }
    }

    StabilityReport {
        stable: violations.is_empty(),
        violations,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stable::compute_stable_matching;
    use crate::models::Side;
    use std::collections::{BTreeMap, BTreeSet};

    fn classifier(id: &str) -> Option<Side> {
        match id.chars().next() {
            Some('m') => Some(Side::A),
            Some('w') => Some(Side::B),
            _ => None,
        }
    }

    fn scores() -> Vec<PairScore> {
        vec![
            PairScore::bare("m1", "w1", 0.9),
            PairScore::bare("m1", "w2", 0.4),
            PairScore::bare("m2", "w1", 0.5),
            PairScore::bare("m2", "w2", 0.8),
            PairScore::bare("w1", "m1", 0.9),
            PairScore::bare("w1", "m2", 0.3),
            PairScore::bare("w2", "m1", 0.2),
            PairScore::bare("w2", "m2", 0.7),
        ]
    }

    #[test]
    fn test_computed_matching_is_stable() {
        let matching = compute_stable_matching(&scores(), &classifier, 0.0);
        let report = validate_stability(&matching, &scores());
        assert!(report.stable);
        assert!(report.violations.is_empty());
    }

    #[test]
    fn test_detects_blocking_pair() {
        // both couples would rather swap partners
        let matching = Matching::new(
            BTreeMap::from([
                ("m1".to_string(), "w2".to_string()),
                ("m2".to_string(), "w1".to_string()),
            ]),
            BTreeSet::new(),
            BTreeSet::new(),
            true,
            0.0,
        );

        let report = validate_stability(&matching, &scores());
        assert!(!report.stable);
        assert_eq!(report.violations.len(), 2);

        let v = &report.violations[0];
        assert_eq!((v.a.as_str(), v.b.as_str()), ("m1", "w1"));
        assert_eq!(v.partner_of_a.as_deref(), Some("w2"));
        assert_eq!(v.partner_of_b.as_deref(), Some("m2"));
        assert_eq!((v.score_ab, v.score_ba), (0.9, 0.9));
        assert_eq!(report.violations[1].a, "m2");
        assert_eq!(report.violations[1].b, "w2");
    }

    #[test]
    fn test_unmatched_pair_blocks() {
        let matching = Matching::new(
            BTreeMap::new(),
            BTreeSet::from(["m1".to_string()]),
            BTreeSet::from(["w1".to_string()]),
            true,
            0.0,
        );
        let report = validate_stability(&matching, &[PairScore::bare("m1", "w1", 0.5)]);
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn test_pairs_below_threshold_never_block() {
        let matching = Matching::new(
            BTreeMap::new(),
            BTreeSet::from(["m1".to_string()]),
            BTreeSet::from(["w1".to_string()]),
            true,
            0.6,
        );
        let report = validate_stability(&matching, &[PairScore::bare("m1", "w1", 0.5)]);
        assert!(report.stable);
    }
}
