//! Symmetric compatibility tables for categorical profile attributes.
//!
//! A table is built from explicit `(x, y, score)` entries and rejected at
//! construction unless every ordered pair of the key domain is present, every
//! score lies in [0, 1], and `table[x][y] == table[y][x]`. Lookups afterwards
//! are infallible.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::error::MatchError;
use crate::models::{Community, ReligiosityLevel};

const SYMMETRY_EPSILON: f64 = 1e-9;

/// Weight of the community table in the religious component
pub const COMMUNITY_SHARE: f64 = 0.6;
/// Weight of the religiosity table in the religious component
pub const RELIGIOSITY_SHARE: f64 = 0.4;

/// Finite categorical domain usable as a matrix axis
pub trait MatrixKey: Copy + Debug + PartialEq + 'static {
    const DOMAIN: &'static [Self];

    fn index(self) -> usize;
}

impl MatrixKey for Community {
    const DOMAIN: &'static [Self] = &Community::ALL;

    fn index(self) -> usize {
        self as usize
    }
}

impl MatrixKey for ReligiosityLevel {
    const DOMAIN: &'static [Self] = &ReligiosityLevel::ALL;

    fn index(self) -> usize {
        self as usize
    }
}

/// One configured cell of a compatibility table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatrixEntry<K> {
    pub a: K,
    pub b: K,
    pub score: f64,
}

/// Validated, immutable symmetric lookup table
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityTable<K: MatrixKey> {
    values: Vec<f64>,
    _key: std::marker::PhantomData<K>,
}

impl<K: MatrixKey> CompatibilityTable<K> {
    pub fn from_entries<I>(name: &'static str, entries: I) -> Result<Self, MatchError>
    where
        I: IntoIterator<Item = MatrixEntry<K>>,
    {
        let n = K::DOMAIN.len();
        let mut cells: Vec<Option<f64>> = vec![None; n * n];

        for entry in entries {
            if !entry.score.is_finite() || !(0.0..=1.0).contains(&entry.score) {
                return Err(MatchError::Config(format!(
                    "{} matrix: score {} for {:?}/{:?} outside [0, 1]",
                    name, entry.score, entry.a, entry.b
                )));
            }
            let cell = &mut cells[entry.a.index() * n + entry.b.index()];
            if let Some(existing) = cell {
                if (*existing - entry.score).abs() > SYMMETRY_EPSILON {
                    return Err(MatchError::Config(format!(
                        "{} matrix: conflicting entries for {:?}/{:?}",
                        name, entry.a, entry.b
                    )));
                }
            }
            *cell = Some(entry.score);
        }

        let mut values = Vec::with_capacity(n * n);
        for &x in K::DOMAIN {
            for &y in K::DOMAIN {
                let forward = cells[x.index() * n + y.index()].ok_or_else(|| {
                    MatchError::Config(format!("{} matrix: missing entry {:?}/{:?}", name, x, y))
                })?;
                let backward = cells[y.index() * n + x.index()].ok_or_else(|| {
                    MatchError::Config(format!("{} matrix: missing entry {:?}/{:?}", name, y, x))
                })?;
                if (forward - backward).abs() > SYMMETRY_EPSILON {
                    return Err(MatchError::Config(format!(
                        "{} matrix: asymmetric entries {:?}/{:?} ({} vs {})",
                        name, x, y, forward, backward
                    )));
                }
                values.push(forward);
            }
        }

        Ok(Self {
            values,
            _key: std::marker::PhantomData,
        })
    }

    /// Build from upper-triangle rows (diagonal included), mirroring each cell
    pub fn from_upper_triangle(name: &'static str, rows: &[&[f64]]) -> Result<Self, MatchError> {
        let domain = K::DOMAIN;
        if rows.len() != domain.len() {
            return Err(MatchError::Config(format!(
                "{} matrix: expected {} rows, got {}",
                name,
                domain.len(),
                rows.len()
            )));
        }
        let mut entries = Vec::with_capacity(domain.len() * domain.len());
        for (i, row) in rows.iter().enumerate() {
            if row.len() != domain.len() - i {
                return Err(MatchError::Config(format!(
                    "{} matrix: row {} has {} cells, expected {}",
                    name,
                    i,
                    row.len(),
                    domain.len() - i
                )));
            }
            for (offset, &score) in row.iter().enumerate() {
                let (a, b) = (domain[i], domain[i + offset]);
                entries.push(MatrixEntry { a, b, score });
                entries.push(MatrixEntry { a: b, b: a, score });
            }
        }
        Self::from_entries(name, entries)
    }

    #[inline]
    pub fn get(&self, a: K, b: K) -> f64 {
        self.values[a.index() * K::DOMAIN.len() + b.index()]
    }
}

/// Community and religiosity tables used by the religious component
#[derive(Debug, Clone, PartialEq)]
pub struct CompatibilityMatrices {
    community: CompatibilityTable<Community>,
    religiosity: CompatibilityTable<ReligiosityLevel>,
}

impl CompatibilityMatrices {
    pub fn new(
        community: CompatibilityTable<Community>,
        religiosity: CompatibilityTable<ReligiosityLevel>,
    ) -> Self {
        Self {
            community,
            religiosity,
        }
    }

    /// The built-in tables
    pub fn standard() -> Result<Self, MatchError> {
        // Lithuanian, Hasidic, Sephardic, ModernOrthodox, NationalReligious
        let community = CompatibilityTable::from_upper_triangle(
            "community",
            &[
                &[1.0, 0.6, 0.7, 0.4, 0.5],
                &[1.0, 0.5, 0.3, 0.4],
                &[1.0, 0.6, 0.7],
                &[1.0, 0.8],
                &[1.0],
            ],
        )?;
        // VeryStrict, Strict, Moderate, Flexible
        let religiosity = CompatibilityTable::from_upper_triangle(
            "religiosity",
            &[&[1.0, 0.8, 0.4, 0.2], &[1.0, 0.7, 0.4], &[1.0, 0.8], &[1.0]],
        )?;
        Ok(Self::new(community, religiosity))
    }

    pub fn community_table(&self) -> &CompatibilityTable<Community> {
        &self.community
    }

    pub fn religiosity_table(&self) -> &CompatibilityTable<ReligiosityLevel> {
        &self.religiosity
    }

    pub fn community(&self, a: Community, b: Community) -> f64 {
        self.community.get(a, b)
    }

    pub fn religiosity(&self, a: ReligiosityLevel, b: ReligiosityLevel) -> f64 {
        self.religiosity.get(a, b)
    }

    /// Blend of community and religiosity affinity
    pub fn religious(
        &self,
        community: (Community, Community),
        religiosity: (ReligiosityLevel, ReligiosityLevel),
    ) -> f64 {
        COMMUNITY_SHARE * self.community(community.0, community.1)
            + RELIGIOSITY_SHARE * self.religiosity(religiosity.0, religiosity.1)
    }
}
