use std::fmt;
use std::sync::Arc;

use crate::models::{
    Community, HardConstraints, Profile, ReligiosityLevel, Side,
};
use crate::services::{normalize_text, GeoDistance};

/// Why a candidate failed the hard constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectReason {
    SelfMatch,
    SameSide,
    Age,
    Distance,
    Smoking,
    Community,
    Religiosity,
    Language,
}

impl RejectReason {
    pub fn code(self) -> &'static str {
        match self {
            RejectReason::SelfMatch => "self",
            RejectReason::SameSide => "same_side",
            RejectReason::Age => "age",
            RejectReason::Distance => "distance",
            RejectReason::Smoking => "smoking",
            RejectReason::Community => "community",
            RejectReason::Religiosity => "religiosity",
            RejectReason::Language => "language",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Assigns a profile to its side of the market
pub type SidePartition = Arc<dyn Fn(&Profile) -> Side + Send + Sync>;

/// Hard-constraint filter
///
/// Checks run in a fixed order (age, distance, smoking, community,
/// religiosity, language) and the first failing one is reported.
#[derive(Clone)]
pub struct ConstraintFilter {
    distance: Arc<dyn GeoDistance>,
    fallback_distance_km: f64,
    partition: Option<SidePartition>,
}

impl ConstraintFilter {
    pub fn new(distance: Arc<dyn GeoDistance>) -> Self {
        Self {
            distance,
            fallback_distance_km: 0.0,
            partition: Some(Arc::new(|p: &Profile| Side::of_gender(p.gender))),
        }
    }

    /// Distance assumed when the provider cannot answer
    pub fn with_fallback_distance(mut self, km: f64) -> Self {
        self.fallback_distance_km = km.max(0.0);
        self
    }

    /// Replace the side partition; `None` lets any two profiles pair
    pub fn with_partition(mut self, partition: Option<SidePartition>) -> Self {
        self.partition = partition;
        self
    }

    /// Side of `profile` under the configured partition
    pub fn side_of(&self, profile: &Profile) -> Option<Side> {
        self.partition.as_ref().map(|partition| partition(profile))
    }

    /// Distance between two location keys, falling back on provider failure
    pub fn distance_km(&self, from: &str, to: &str) -> f64 {
        if same_location(from, to) {
            return 0.0;
        }
        match self.distance.distance_km(from, to) {
            Ok(km) if km.is_finite() && km >= 0.0 => km,
            Ok(km) => {
                tracing::warn!(from, to, km, "Distance provider returned an invalid value");
                self.fallback_distance_km
            }
            Err(e) => {
                tracing::warn!(
                    from,
                    to,
                    fallback_km = self.fallback_distance_km,
                    "Distance lookup failed: {}",
                    e
                );
                self.fallback_distance_km
            }
        }
    }

    /// Check `candidate` against the requester's hard constraints
    pub fn eligible(
        &self,
        candidate: &Profile,
        requester: &Profile,
        constraints: &HardConstraints,
    ) -> Result<(), RejectReason> {
        if !within_age_range(candidate.age, constraints) {
            return Err(RejectReason::Age);
        }

        if let Some(max_km) = constraints.max_distance_km {
            let km = self.distance_km(&requester.location, &candidate.location);
            if km > f64::from(max_km) {
                return Err(RejectReason::Distance);
            }
        }

        if !matches_smoking(candidate.smoking, constraints) {
            return Err(RejectReason::Smoking);
        }

        if !community_allowed(candidate.community, constraints) {
            return Err(RejectReason::Community);
        }

        if !religiosity_allowed(candidate.religiosity, constraints) {
            return Err(RejectReason::Religiosity);
        }

        if !speaks_required_language(candidate, constraints) {
            return Err(RejectReason::Language);
        }

        Ok(())
    }

    /// Self and same-side exclusion only; no constraint is consulted
    pub fn counterpart(&self, candidate: &Profile, requester: &Profile) -> Result<(), RejectReason> {
        if candidate.id == requester.id {
            return Err(RejectReason::SelfMatch);
        }
        if let Some(partition) = &self.partition {
            if partition(candidate) == partition(requester) {
                return Err(RejectReason::SameSide);
            }
        }
        Ok(())
    }

    /// [`Self::counterpart`] followed by [`Self::eligible`]
    pub fn admit(
        &self,
        candidate: &Profile,
        requester: &Profile,
        constraints: &HardConstraints,
    ) -> Result<(), RejectReason> {
        self.counterpart(candidate, requester)?;
        self.eligible(candidate, requester, constraints)
    }

    /// Candidates from `pool` that `requester` may be matched with
    pub fn filter_population<'a>(
        &self,
        requester: &Profile,
        constraints: &HardConstraints,
        pool: &'a [Profile],
    ) -> Vec<&'a Profile> {
        let passed: Vec<&Profile> = pool
            .iter()
            .filter(|candidate| self.admit(candidate, requester, constraints).is_ok())
            .collect();

        tracing::debug!(
            requester = %requester.id,
            pool = pool.len(),
            passed = passed.len(),
            "Filtered candidate pool"
        );
        passed
    }

    /// Every rejected candidate with the reason it was rejected
    pub fn explain_population<'a>(
        &self,
        requester: &Profile,
        constraints: &HardConstraints,
        pool: &'a [Profile],
    ) -> Vec<(&'a Profile, RejectReason)> {
        pool.iter()
            .filter_map(|candidate| {
                self.admit(candidate, requester, constraints)
                    .err()
                    .map(|reason| (candidate, reason))
            })
            .collect()
    }
}

impl fmt::Debug for ConstraintFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConstraintFilter")
            .field("fallback_distance_km", &self.fallback_distance_km)
            .field("partitioned", &self.partition.is_some())
            .finish()
    }
}

/// Two location keys naming the same place
#[inline]
pub fn same_location(a: &str, b: &str) -> bool {
    normalize_text(a).to_lowercase() == normalize_text(b).to_lowercase()
}

#[inline]
pub fn within_age_range(age: u8, constraints: &HardConstraints) -> bool {
    if let Some(min) = constraints.min_age {
        if age < min {
            return false;
        }
    }
    if let Some(max) = constraints.max_age {
        if age > max {
            return false;
        }
    }
    true
}

#[inline]
pub fn matches_smoking(smoking: bool, constraints: &HardConstraints) -> bool {
    constraints.smoking.map_or(true, |required| required == smoking)
}

#[inline]
pub fn community_allowed(community: Community, constraints: &HardConstraints) -> bool {
    constraints
        .allowed_communities()
        .map_or(true, |allowed| allowed.contains(&community))
}

#[inline]
pub fn religiosity_allowed(level: ReligiosityLevel, constraints: &HardConstraints) -> bool {
    constraints
        .allowed_religiosity()
        .map_or(true, |allowed| allowed.contains(&level))
}

/// Passes when the candidate speaks at least one required language
#[inline]
pub fn speaks_required_language(candidate: &Profile, constraints: &HardConstraints) -> bool {
    constraints
        .required_languages()
        .map_or(true, |required| {
            required.iter().any(|lang| candidate.languages.contains(lang))
        })
}
