use geo::{GeodesicDistance, Point};
use serde::{Deserialize, Serialize};

use crate::error::MatchError;

/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Resolved location in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MatchError> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(MatchError::Config(format!(
                "coordinates out of range: ({}, {})",
                latitude, longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    fn point(&self) -> Point<f64> {
        Point::new(self.longitude, self.latitude)
    }
}

/// How a distance between two coordinates is computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMethod {
    /// Ellipsoidal (Karney) distance
    #[default]
    Geodesic,
    /// Great-circle distance on a spherical earth
    Haversine,
}

impl DistanceMethod {
    pub fn distance_km(self, a: Coordinates, b: Coordinates) -> f64 {
        match self {
            DistanceMethod::Geodesic => geodesic_distance(a, b),
            DistanceMethod::Haversine => haversine_distance(a, b),
        }
    }
}

/// Geodesic distance between two points in kilometers
#[inline]
pub fn geodesic_distance(a: Coordinates, b: Coordinates) -> f64 {
    a.point().geodesic_distance(&b.point()) / 1000.0
}

/// Calculate the Haversine distance between two points in kilometers
#[inline]
pub fn haversine_distance(a: Coordinates, b: Coordinates) -> f64 {
    let lat1_rad = a.latitude.to_radians();
    let lat2_rad = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * c
}
