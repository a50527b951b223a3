use std::collections::{BTreeMap, HashMap};

use crate::core::distance::{Coordinates, DistanceMethod};
use crate::error::MatchError;
use crate::services::provider::{GeoDistance, ProviderError};

/// Location-name to coordinates table
///
/// Names are matched case-insensitively after whitespace normalization.
#[derive(Debug, Clone, Default)]
pub struct Gazetteer {
    places: HashMap<String, Coordinates>,
    method: DistanceMethod,
}

impl Gazetteer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method(mut self, method: DistanceMethod) -> Self {
        self.method = method;
        self
    }

    /// Build from `name -> [latitude, longitude]`
    pub fn from_table(table: &BTreeMap<String, [f64; 2]>) -> Result<Self, MatchError> {
        let mut gazetteer = Self::new();
        for (name, [lat, lon]) in table {
            gazetteer.insert(name, Coordinates::new(*lat, *lon)?);
        }
        Ok(gazetteer)
    }

    pub fn insert(&mut self, name: &str, coordinates: Coordinates) {
        self.places.insert(Self::key(name), coordinates);
    }

    pub fn resolve(&self, name: &str) -> Option<Coordinates> {
        self.places.get(&Self::key(name)).copied()
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    fn key(name: &str) -> String {
        crate::services::similarity::normalize_text(name).to_lowercase()
    }
}

impl GeoDistance for Gazetteer {
    fn distance_km(&self, location_a: &str, location_b: &str) -> Result<f64, ProviderError> {
        let a = self
            .resolve(location_a)
            .ok_or_else(|| ProviderError::UnknownLocation(location_a.to_string()))?;
        let b = self
            .resolve(location_b)
            .ok_or_else(|| ProviderError::UnknownLocation(location_b.to_string()))?;
        Ok(self.method.distance_km(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gazetteer() -> Gazetteer {
        let table = BTreeMap::from([
            ("Jerusalem".to_string(), [31.7683, 35.2137]),
            ("Bnei Brak".to_string(), [32.0807, 34.8338]),
        ]);
        Gazetteer::from_table(&table).unwrap()
    }

    #[test]
    fn test_resolves_case_insensitively() {
        let g = gazetteer();
        assert!(g.resolve("  jerusalem ").is_some());
        assert!(g.resolve("BNEI   BRAK").is_some());
        assert_eq!(g.len(), 2);
    }

    #[test]
    fn test_distance_between_known_places() {
        let d = gazetteer().distance_km("Jerusalem", "Bnei Brak").unwrap();
        assert!(d > 40.0 && d < 70.0, "got {}", d);
    }

    #[test]
    fn test_haversine_method_close_to_geodesic() {
        let geodesic = gazetteer().distance_km("Jerusalem", "Bnei Brak").unwrap();
        let haversine = gazetteer()
            .with_method(DistanceMethod::Haversine)
            .distance_km("Jerusalem", "Bnei Brak")
            .unwrap();
        assert_ne!(geodesic, haversine);
        assert!((geodesic - haversine).abs() < 1.0);
    }

    #[test]
    fn test_unknown_location_is_an_error() {
        let err = gazetteer().distance_km("Jerusalem", "Atlantis").unwrap_err();
        assert!(matches!(err, ProviderError::UnknownLocation(name) if name == "Atlantis"));
    }

    #[test]
    fn test_invalid_table_rejected() {
        let table = BTreeMap::from([("Nowhere".to_string(), [123.0, 0.0])]);
        assert!(Gazetteer::from_table(&table).is_err());
    }
}
