//! Haversine distance matrix provider (fallback when the routing service is
//! unavailable).
//!
//! Uses great-circle distance. Less accurate than road routing but always
//! available, and symmetric by construction.

use crate::error::ProviderError;
use crate::matrix::DistanceMatrix;
use crate::models::Location;
use crate::traits::DistanceMatrixProvider;

/// Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers.
pub fn haversine_km(from: Location, to: Location) -> f64 {
    let lat1_rad = from.lat.to_radians();
    let lat2_rad = to.lat.to_radians();
    let delta_lat = (to.lat - from.lat).to_radians();
    let delta_lng = (to.lng - from.lng).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Haversine-based distance matrix provider.
#[derive(Debug, Clone, Copy, Default)]
pub struct HaversineMatrix;

impl HaversineMatrix {
    /// Computes the full matrix. Only the upper triangle is evaluated and
    /// mirrored, so the result is exactly symmetric with a zero diagonal.
    pub fn compute(&self, locations: &[Location]) -> DistanceMatrix {
        let n = locations.len();
        let mut matrix = DistanceMatrix::new(n);

        for i in 0..n {
            for j in i + 1..n {
                let km = haversine_km(locations[i], locations[j]);
                matrix.set(i, j, km);
                matrix.set(j, i, km);
            }
        }

        matrix
    }
}

impl DistanceMatrixProvider for HaversineMatrix {
    fn matrix_for(&self, locations: &[Location]) -> Result<DistanceMatrix, ProviderError> {
        Ok(self.compute(locations))
    }
}
