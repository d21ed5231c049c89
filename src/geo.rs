//! Geo provider: remote routing distances and addresses with a local fallback.
//!
//! Neither operation fails. A remote failure is logged and replaced by the
//! great-circle matrix or a `"(lat, lng)"` placeholder address.

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::GeoCache;
use crate::haversine::HaversineMatrix;
use crate::matrix::DistanceMatrix;
use crate::models::Location;
use crate::ors::OrsClient;
use crate::traits::{DistanceMatrixProvider, ReverseGeocoder};

#[derive(Clone, Default)]
pub struct GeoProvider {
    remote: Option<Arc<dyn DistanceMatrixProvider>>,
    geocoder: Option<Arc<dyn ReverseGeocoder>>,
    fallback: HaversineMatrix,
    cache: Option<Arc<GeoCache>>,
}

impl GeoProvider {
    /// Great-circle distances and placeholder addresses only.
    pub fn offline() -> Self {
        Self::default()
    }

    /// OpenRouteService for both distances and addresses.
    pub fn with_ors(client: OrsClient) -> Self {
        let client = Arc::new(client);
        Self {
            remote: Some(client.clone()),
            geocoder: Some(client),
            ..Self::default()
        }
    }

    pub fn with_matrix_provider(mut self, provider: Arc<dyn DistanceMatrixProvider>) -> Self {
        self.remote = Some(provider);
        self
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn ReverseGeocoder>) -> Self {
        self.geocoder = Some(geocoder);
        self
    }

    pub fn with_cache(mut self, cache: Arc<GeoCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn cache(&self) -> Option<&Arc<GeoCache>> {
        self.cache.as_ref()
    }

    /// Symmetric kilometre matrix with a zero diagonal, fully populated.
    pub fn distance_matrix(&self, locations: &[Location]) -> Arc<DistanceMatrix> {
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.matrix(locations)) {
            return hit;
        }

        if let Some(remote) = &self.remote {
            match remote.matrix_for(locations) {
                Ok(matrix) if matrix.size() == locations.len() && matrix.is_well_formed() => {
                    info!(locations = locations.len(), "using remote distance matrix");
                    let matrix = matrix.symmetrized();
                    return match &self.cache {
                        Some(cache) => cache.store_matrix(locations, matrix),
                        None => Arc::new(matrix),
                    };
                }
                Ok(matrix) => warn!(
                    expected = locations.len(),
                    got = matrix.size(),
                    "remote distance matrix unusable, falling back to haversine"
                ),
                Err(err) => warn!(error = %err, "remote distance matrix failed, falling back to haversine"),
            }
        }

        Arc::new(self.fallback.compute(locations))
    }

    /// Address for a location, or `"(lat, lng)"` when it cannot be resolved.
    pub fn reverse_geocode(&self, location: Location) -> String {
        if let Some(hit) = self.cache.as_ref().and_then(|cache| cache.address(location)) {
            return hit.to_string();
        }

        let Some(geocoder) = &self.geocoder else {
            return location.placeholder_address();
        };

        match geocoder.address_for(location) {
            Ok(address) => {
                if let Some(cache) = &self.cache {
                    cache.store_address(location, &address);
                }
                address
            }
            Err(err) => {
                warn!(lat = location.lat, lng = location.lng, error = %err, "reverse geocode failed");
                location.placeholder_address()
            }
        }
    }
}

impl std::fmt::Debug for GeoProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeoProvider")
            .field("remote", &self.remote.is_some())
            .field("geocoder", &self.geocoder.is_some())
            .field("cache", &self.cache.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::error::ProviderError;

    struct FailingProvider;

    impl DistanceMatrixProvider for FailingProvider {
        fn matrix_for(&self, _locations: &[Location]) -> Result<DistanceMatrix, ProviderError> {
            Err(ProviderError::Malformed("service down".to_string()))
        }
    }

    impl ReverseGeocoder for FailingProvider {
        fn address_for(&self, _location: Location) -> Result<String, ProviderError> {
            Err(ProviderError::MissingCredentials)
        }
    }

    /// Returns an asymmetric matrix and counts calls.
    #[derive(Default)]
    struct CountingProvider {
        calls: AtomicUsize,
    }

    impl DistanceMatrixProvider for CountingProvider {
        fn matrix_for(&self, locations: &[Location]) -> Result<DistanceMatrix, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let n = locations.len();
            let mut matrix = DistanceMatrix::new(n);
            for i in 0..n {
                for j in 0..n {
                    if i != j {
                        matrix.set(i, j, (i * 10 + j) as f64);
                    }
                }
            }
            Ok(matrix)
        }
    }

    struct WrongSizeProvider;

    impl DistanceMatrixProvider for WrongSizeProvider {
        fn matrix_for(&self, _locations: &[Location]) -> Result<DistanceMatrix, ProviderError> {
            Ok(DistanceMatrix::new(1))
        }
    }

    fn locations() -> Vec<Location> {
        vec![
            Location::new(10.0, 106.0),
            Location::new(10.01, 106.01),
            Location::new(10.02, 106.0),
        ]
    }

    #[test]
    fn test_failing_remote_falls_back_to_haversine() {
        let geo = GeoProvider::offline().with_matrix_provider(Arc::new(FailingProvider));
        let matrix = geo.distance_matrix(&locations());
        assert_eq!(*matrix, HaversineMatrix.compute(&locations()));
        assert!(matrix.is_symmetric());
    }

    #[test]
    fn test_wrong_size_remote_falls_back() {
        let geo = GeoProvider::offline().with_matrix_provider(Arc::new(WrongSizeProvider));
        let matrix = geo.distance_matrix(&locations());
        assert_eq!(matrix.size(), 3);
        assert!(matrix.get(0, 1) > 0.0);
    }

    #[test]
    fn test_remote_matrix_is_symmetrized() {
        let geo = GeoProvider::offline().with_matrix_provider(Arc::new(CountingProvider::default()));
        let matrix = geo.distance_matrix(&locations());
        assert!(matrix.is_symmetric());
        // (1 + 10) / 2
        assert_eq!(matrix.get(0, 1), 5.5);
    }

    #[test]
    fn test_cached_matrix_skips_remote_call() {
        let provider = Arc::new(CountingProvider::default());
        let geo = GeoProvider::offline()
            .with_matrix_provider(provider.clone())
            .with_cache(Arc::new(GeoCache::new()));

        let first = geo.distance_matrix(&locations());
        let second = geo.distance_matrix(&locations());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_fallback_results_are_not_cached() {
        let cache = Arc::new(GeoCache::new());
        let geo = GeoProvider::offline()
            .with_matrix_provider(Arc::new(FailingProvider))
            .with_cache(cache.clone());
        geo.distance_matrix(&locations());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reverse_geocode_placeholder() {
        let location = Location::new(10.0, 106.5);
        assert_eq!(GeoProvider::offline().reverse_geocode(location), "(10, 106.5)");

        let geo = GeoProvider::offline().with_geocoder(Arc::new(FailingProvider));
        assert_eq!(geo.reverse_geocode(location), "(10, 106.5)");
    }
}
