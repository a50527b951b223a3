use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::models::domain::{Gender, Profile};
use crate::models::score::PairScore;

/// Side of the two-sided market
///
/// Side A proposes during deferred acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    A,
    B,
}

impl Side {
    /// Conventional gender partition: men propose
    pub fn of_gender(gender: Gender) -> Side {
        match gender {
            Gender::Male => Side::A,
            Gender::Female => Side::B,
        }
    }
}

/// Assigns ids to a side; `None` means the id takes no part in the run
pub trait SideClassifier {
    fn side_of(&self, id: &str) -> Option<Side>;
}

impl<F> SideClassifier for F
where
    F: Fn(&str) -> Option<Side>,
{
    fn side_of(&self, id: &str) -> Option<Side> {
        self(id)
    }
}

/// Side lookup table built from a profile population
#[derive(Debug, Clone, Default)]
pub struct ProfileSides {
    sides: HashMap<String, Side>,
}

impl ProfileSides {
    pub fn from_profiles<'a, I, F>(profiles: I, partition: F) -> Self
    where
        I: IntoIterator<Item = &'a Profile>,
        F: Fn(&Profile) -> Side,
    {
        let sides = profiles
            .into_iter()
            .map(|p| (p.id.clone(), partition(p)))
            .collect();
        Self { sides }
    }

    pub fn len(&self) -> usize {
        self.sides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sides.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Side)> + '_ {
        self.sides.iter().map(|(id, side)| (id.as_str(), *side))
    }
}

impl SideClassifier for ProfileSides {
    fn side_of(&self, id: &str) -> Option<Side> {
        self.sides.get(id).copied()
    }
}

/// Result of a stable matching run
///
/// `pairs` maps each matched side-A id to its side-B partner; the mapping is
/// injective, so it is a partial bijection between the two sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    pub pairs: BTreeMap<String, String>,
    #[serde(rename = "unmatchedA")]
    pub unmatched_a: BTreeSet<String>,
    #[serde(rename = "unmatchedB")]
    pub unmatched_b: BTreeSet<String>,
    pub converged: bool,
    pub proposals: usize,
    #[serde(rename = "minScore")]
    pub min_score: f64,
}

impl Matching {
    pub fn new(
        pairs: BTreeMap<String, String>,
        unmatched_a: BTreeSet<String>,
        unmatched_b: BTreeSet<String>,
        converged: bool,
        min_score: f64,
    ) -> Self {
        Self {
            pairs,
            unmatched_a,
            unmatched_b,
            converged,
            proposals: 0,
            min_score,
        }
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Record every roster id that is not matched as unmatched on its side
    ///
    /// Ids with no acceptable pair never reach the proposal rounds; this makes
    /// the matching partition the whole roster.
    pub fn complete_roster(&mut self, roster: &ProfileSides) {
        let matched_b: BTreeSet<&str> = self.pairs.values().map(String::as_str).collect();
        let mut missing_a = Vec::new();
        let mut missing_b = Vec::new();
        for (id, side) in roster.iter() {
            match side {
                Side::A if !self.pairs.contains_key(id) => missing_a.push(id.to_string()),
                Side::B if !matched_b.contains(id) => missing_b.push(id.to_string()),
                _ => {}
            }
        }
        self.unmatched_a.extend(missing_a);
        self.unmatched_b.extend(missing_b);
    }

    /// Partner of `id`, looked up on either side
    pub fn partner_of(&self, id: &str) -> Option<&str> {
        if let Some(b) = self.pairs.get(id) {
            return Some(b.as_str());
        }
        self.pairs
            .iter()
            .find(|(_, b)| b.as_str() == id)
            .map(|(a, _)| a.as_str())
    }

    /// Reverse index: side-B id -> side-A partner
    pub fn partners_of_b(&self) -> HashMap<&str, &str> {
        self.pairs
            .iter()
            .map(|(a, b)| (b.as_str(), a.as_str()))
            .collect()
    }

    /// True when no id appears as a partner more than once and no matched id
    /// is also listed as unmatched
    pub fn is_partial_bijection(&self) -> bool {
        let mut seen_b = BTreeSet::new();
        for (a, b) in &self.pairs {
            if !seen_b.insert(b.as_str()) || self.pairs.contains_key(b) {
                return false;
            }
            if self.unmatched_a.contains(a) || self.unmatched_b.contains(b) {
                return false;
            }
        }
        true
    }

    /// Matched pairs with their (symmetrized) score, best first
    pub fn ranked_pairs(&self, scores: &[PairScore]) -> Vec<(String, String, f64)> {
        let lookup: HashMap<(&str, &str), f64> = scores
            .iter()
            .map(|s| ((s.requester_id.as_str(), s.candidate_id.as_str()), s.total))
            .collect();

        let mut ranked: Vec<(String, String, f64)> = self
            .pairs
            .iter()
            .map(|(a, b)| {
                let score = lookup
                    .get(&(a.as_str(), b.as_str()))
                    .or_else(|| lookup.get(&(b.as_str(), a.as_str())))
                    .copied()
                    .unwrap_or(0.0);
                (a.clone(), b.clone(), score)
            })
            .collect();

        ranked.sort_by(|x, y| {
            y.2.partial_cmp(&x.2)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| x.0.cmp(&y.0))
        });
        ranked
    }
}

/// The matching itself knows which side every participant was on
impl SideClassifier for Matching {
    fn side_of(&self, id: &str) -> Option<Side> {
        if self.pairs.contains_key(id) || self.unmatched_a.contains(id) {
            return Some(Side::A);
        }
        if self.unmatched_b.contains(id) || self.pairs.values().any(|b| b == id) {
            return Some(Side::B);
        }
        None
    }
}

/// A pair that would both rather be with each other than with their partners
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockingPair {
    pub a: String,
    pub b: String,
    #[serde(rename = "scoreAB")]
    pub score_ab: f64,
    #[serde(rename = "scoreBA")]
    pub score_ba: f64,
    #[serde(rename = "partnerOfA")]
    pub partner_of_a: Option<String>,
    #[serde(rename = "partnerOfB")]
    pub partner_of_b: Option<String>,
}

/// Outcome of a stability check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityReport {
    pub stable: bool,
    pub violations: Vec<BlockingPair>,
}
