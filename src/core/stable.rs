//! Population-wide stable assignment by deferred acceptance.
//!
//! Side A proposes. Every side-A id walks its preference list from the top;
//! each side-B id holds on to the best proposal received so far and releases
//! the previous holder when a better one arrives. With strict preference
//! lists this yields the side-A-optimal stable matching, independent of the
//! order in which free proposers are served.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use crate::core::score_table::{ScoreTable, TieBreak};
use crate::models::{Matching, PairScore, SideClassifier};

/// Deferred-acceptance matcher
#[derive(Debug, Clone)]
pub struct StableMatcher {
    min_score: f64,
    tie_break: TieBreak,
    proposal_cap: Option<usize>,
}

impl StableMatcher {
    pub fn new(min_score: f64) -> Self {
        Self {
            min_score,
            tie_break: TieBreak::default(),
            proposal_cap: None,
        }
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Override the proposal budget (default |A| x |B|)
    pub fn with_proposal_cap(mut self, cap: usize) -> Self {
        self.proposal_cap = Some(cap);
        self
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    /// Run deferred acceptance over `scores`
    ///
    /// # Arguments
    /// * `scores` - Directed pair scores; a missing direction reads as its reverse
    /// * `classifier` - Side of each id; ids without a side are ignored
    ///
    /// # Returns
    /// Matching over every id with a cross-side score
    pub fn compute<C>(&self, scores: &[PairScore], classifier: &C) -> Matching
    where
        C: SideClassifier + ?Sized,
    {
        let run_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("stable_matching", run_id = %run_id);
        let _guard = span.enter();

        let table = ScoreTable::build(scores, self.min_score, classifier);
        let matching = self.run(&table);

        if matching.converged {
            tracing::info!(
                pairs = matching.len(),
                unmatched_a = matching.unmatched_a.len(),
                unmatched_b = matching.unmatched_b.len(),
                proposals = matching.proposals,
                "Stable matching complete"
            );
        } else {
            tracing::warn!(
                pairs = matching.len(),
                proposals = matching.proposals,
                "Proposal budget exhausted before convergence, returning partial matching"
            );
        }
        matching
    }

    fn run(&self, table: &ScoreTable) -> Matching {
        let prefs = table.ranked_indices(&self.tie_break);

        // rank[b][a] = position of a in b's list
        let rank: Vec<HashMap<usize, usize>> = prefs
            .iter()
            .map(|list| list.iter().enumerate().map(|(i, &a)| (a, i)).collect())
            .collect();

        let mut proposers: Vec<usize> = table
            .side_a()
            .iter()
            .filter_map(|a| table.index_of(a))
            .collect();
        proposers.sort_by(|&x, &y| self.tie_break.compare(table.id(x), table.id(y)));
        let mut free: VecDeque<usize> = proposers.into_iter().collect();

        let cap = self
            .proposal_cap
            .unwrap_or(table.side_a().len() * table.side_b().len());
        let mut next = vec![0usize; prefs.len()];
        let mut held: Vec<Option<usize>> = vec![None; prefs.len()];
        let mut proposals = 0usize;
        let mut converged = true;

        while let Some(a) = free.pop_front() {
            let list = &prefs[a];
            if next[a] >= list.len() {
                // exhausted: stays unmatched
                continue;
            }
            if proposals >= cap {
                free.push_front(a);
                converged = false;
                break;
            }

            let b = list[next[a]];
            next[a] += 1;
            proposals += 1;

            let Some(a_rank) = rank[b].get(&a).copied() else {
                free.push_front(a);
                continue;
            };

            match held[b] {
                None => held[b] = Some(a),
                Some(current) => {
                    let current_rank = rank[b].get(&current).copied().unwrap_or(usize::MAX);
                    if a_rank < current_rank {
                        held[b] = Some(a);
                        free.push_back(current);
                    } else {
                        free.push_front(a);
                    }
                }
            }
        }

        let pairs: BTreeMap<String, String> = held
            .iter()
            .enumerate()
            .filter_map(|(b, a)| a.map(|a| (table.id(a).to_string(), table.id(b).to_string())))
            .collect();
        let matched_b: BTreeSet<&str> = pairs.values().map(String::as_str).collect();
        let unmatched_a: BTreeSet<String> = table
            .side_a()
            .iter()
            .filter(|a| !pairs.contains_key(*a))
            .cloned()
            .collect();
        let unmatched_b: BTreeSet<String> = table
            .side_b()
            .iter()
            .filter(|b| !matched_b.contains(b.as_str()))
            .cloned()
            .collect();

        let mut matching = Matching::new(pairs, unmatched_a, unmatched_b, converged, self.min_score);
        matching.proposals = proposals;
        matching
    }
}

impl Default for StableMatcher {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Stable matching with the default tie-break and proposal budget
///
/// # Arguments
/// * `scores` - Directed pair scores; a missing direction reads as its reverse
/// * `classifier` - Side of each id; side A proposes
/// * `min_score` - Pairs with any scored direction below this are unacceptable
///
/// # Returns
/// Matching with pairs, unmatched ids and convergence flag
pub fn compute_stable_matching<C>(scores: &[PairScore], classifier: &C, min_score: f64) -> Matching
where
    C: SideClassifier + ?Sized,
{
    StableMatcher::new(min_score).compute(scores, classifier)
}
