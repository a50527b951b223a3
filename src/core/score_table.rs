use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::models::{PairScore, Side, SideClassifier};

/// Total order used to break score ties between ids
#[derive(Clone)]
pub struct TieBreak(Arc<dyn Fn(&str, &str) -> Ordering + Send + Sync>);

impl TieBreak {
    pub fn new<F>(compare: F) -> Self
    where
        F: Fn(&str, &str) -> Ordering + Send + Sync + 'static,
    {
        Self(Arc::new(compare))
    }

    /// Plain id order
    pub fn lexicographic() -> Self {
        Self::new(|a, b| a.cmp(b))
    }

    #[inline]
    pub fn compare(&self, a: &str, b: &str) -> Ordering {
        (self.0)(a, b)
    }
}

impl Default for TieBreak {
    fn default() -> Self {
        Self::lexicographic()
    }
}

impl fmt::Debug for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TieBreak")
    }
}

/// Directed scores between the two sides, shared by matcher and validator
///
/// A pair is acceptable when at least one direction was scored and no scored
/// direction falls below the threshold. A missing direction reads as its
/// reverse. Ids are interned once; every lookup after `build` works on
/// indices.
#[derive(Debug, Clone, Default)]
pub struct ScoreTable {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    sides: Vec<Side>,
    directed: HashMap<(usize, usize), f64>,
    side_a: BTreeSet<String>,
    side_b: BTreeSet<String>,
}

impl ScoreTable {
    pub fn build<C>(scores: &[PairScore], min_score: f64, classifier: &C) -> Self
    where
        C: SideClassifier + ?Sized,
    {
        let mut table = Self::default();
        let mut seen: HashMap<&str, Option<usize>> = HashMap::new();
        let mut raw: HashMap<(usize, usize), f64> = HashMap::new();
        for score in scores {
            let from = table.place(&score.requester_id, classifier, &mut seen);
            let to = table.place(&score.candidate_id, classifier, &mut seen);
            let (Some(from), Some(to)) = (from, to) else {
                continue;
            };
            if table.sides[from] == table.sides[to] {
                tracing::debug!(
                    from = %score.requester_id,
                    to = %score.candidate_id,
                    "Ignoring score between ids on the same side"
                );
                continue;
            }
            for i in [from, to] {
                match table.sides[i] {
                    Side::A => table.side_a.insert(table.ids[i].clone()),
                    Side::B => table.side_b.insert(table.ids[i].clone()),
                };
            }

            let total = if score.total.is_finite() { score.total } else { 0.0 };
            let entry = raw.entry((from, to)).or_insert(total);
            *entry = entry.max(total);
        }

        let unplaced: BTreeSet<&str> = seen
            .iter()
            .filter(|(_, slot)| slot.is_none())
            .map(|(id, _)| *id)
            .collect();
        if !unplaced.is_empty() {
            tracing::warn!(count = unplaced.len(), ids = ?unplaced, "Ids without a side were ignored");
        }

        table.directed = raw
            .iter()
            .filter(|((from, to), total)| {
                **total >= min_score && raw.get(&(*to, *from)).map_or(true, |r| *r >= min_score)
            })
            .map(|(key, total)| (*key, *total))
            .collect();
        table
    }

    /// Intern `id` on first sight; `None` when the classifier has no side for it
    fn place<'s, C>(&mut self, id: &'s str, classifier: &C, seen: &mut HashMap<&'s str, Option<usize>>) -> Option<usize>
    where
        C: SideClassifier + ?Sized,
    {
        if let Some(slot) = seen.get(id) {
            return *slot;
        }
        let slot = classifier.side_of(id).map(|side| {
            let i = self.ids.len();
            self.ids.push(id.to_string());
            self.index.insert(id.to_string(), i);
            self.sides.push(side);
            i
        });
        seen.insert(id, slot);
        slot
    }

    /// Score `from` gives `to`, falling back to the reverse direction
    pub fn score(&self, from: &str, to: &str) -> Option<f64> {
        let (Some(&from), Some(&to)) = (self.index.get(from), self.index.get(to)) else {
            return None;
        };
        self.score_at(from, to)
    }

    /// Index-based [`Self::score`]
    #[inline]
    pub fn score_at(&self, from: usize, to: usize) -> Option<f64> {
        self.directed
            .get(&(from, to))
            .or_else(|| self.directed.get(&(to, from)))
            .copied()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Id behind an index handed out by this table
    pub fn id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    pub fn side_a(&self) -> &BTreeSet<String> {
        &self.side_a
    }

    pub fn side_b(&self) -> &BTreeSet<String> {
        &self.side_b
    }

    /// Acceptable pairs as `(side A index, side B index)`, in id order
    pub fn pair_indices(&self) -> Vec<(usize, usize)> {
        let mut pairs: Vec<(usize, usize)> = self
            .directed
            .keys()
            .map(|&(from, to)| if self.sides[from] == Side::A { (from, to) } else { (to, from) })
            .collect();
        pairs.sort_unstable_by(|x, y| {
            self.ids[x.0]
                .cmp(&self.ids[y.0])
                .then_with(|| self.ids[x.1].cmp(&self.ids[y.1]))
        });
        pairs.dedup();
        pairs
    }

    /// Acceptable pairs as `(side A id, side B id)`, in id order
    pub fn pairs(&self) -> Vec<(String, String)> {
        self.pair_indices()
            .into_iter()
            .map(|(a, b)| (self.ids[a].clone(), self.ids[b].clone()))
            .collect()
    }

    /// Ranked acceptable counterparts per index; ids outside both sides get
    /// an empty list
    ///
    /// Higher score first; equal scores ordered by `tie_break`. Sort keys are
    /// computed once per entry.
    pub fn ranked_indices(&self, tie_break: &TieBreak) -> Vec<Vec<usize>> {
        let mut scored: Vec<Vec<(f64, usize)>> = vec![Vec::new(); self.ids.len()];
        for (a, b) in self.pair_indices() {
            if let Some(score) = self.score_at(a, b) {
                scored[a].push((score, b));
            }
            if let Some(score) = self.score_at(b, a) {
                scored[b].push((score, a));
            }
        }

        scored
            .into_iter()
            .map(|mut list| {
                list.sort_by(|(sx, x), (sy, y)| {
                    sy.partial_cmp(sx)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| tie_break.compare(&self.ids[*x], &self.ids[*y]))
                });
                list.into_iter().map(|(_, id)| id).collect()
            })
            .collect()
    }

    /// Ranked acceptable counterparts for every id on either side
    pub fn preference_lists(&self, tie_break: &TieBreak) -> HashMap<String, Vec<String>> {
        let ranked = self.ranked_indices(tie_break);
        self.side_a
            .iter()
            .chain(&self.side_b)
            .filter_map(|id| {
                let list = &ranked[self.index_of(id)?];
                Some((id.clone(), list.iter().map(|&i| self.ids[i].clone()).collect()))
            })
            .collect()
    }
}
