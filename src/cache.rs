//! Shared cache for remote geo results.
//!
//! Entries are immutable `Arc` snapshots: a writer replaces the entry for a
//! key, readers clone the `Arc` and never observe a partially written value.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::matrix::DistanceMatrix;
use crate::models::Location;

/// Decimal places used when keying matrices by their coordinate list.
const MATRIX_KEY_DECIMALS: usize = 6;

/// Decimal places used when keying reverse-geocoded addresses.
const ADDRESS_KEY_DECIMALS: usize = 5;

#[derive(Debug, Default)]
pub struct GeoCache {
    matrices: RwLock<HashMap<String, Arc<DistanceMatrix>>>,
    addresses: RwLock<HashMap<String, Arc<str>>>,
}

impl GeoCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matrix(&self, locations: &[Location]) -> Option<Arc<DistanceMatrix>> {
        let key = matrix_key(locations);
        let hit = self.matrices.read().get(&key).cloned();
        if hit.is_some() {
            debug!(locations = locations.len(), "distance matrix cache hit");
        }
        hit
    }

    pub fn store_matrix(&self, locations: &[Location], matrix: DistanceMatrix) -> Arc<DistanceMatrix> {
        let matrix = Arc::new(matrix);
        self.matrices
            .write()
            .insert(matrix_key(locations), Arc::clone(&matrix));
        matrix
    }

    pub fn address(&self, location: Location) -> Option<Arc<str>> {
        self.addresses.read().get(&address_key(location)).cloned()
    }

    pub fn store_address(&self, location: Location, address: &str) -> Arc<str> {
        let address: Arc<str> = Arc::from(address);
        self.addresses
            .write()
            .insert(address_key(location), Arc::clone(&address));
        address
    }

    pub fn len(&self) -> usize {
        self.matrices.read().len() + self.addresses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn rounded(location: Location, decimals: usize) -> String {
    format!("{:.*},{:.*}", decimals, location.lat, decimals, location.lng)
}

/// Location order is part of the key: matrix rows follow it.
fn matrix_key(locations: &[Location]) -> String {
    locations
        .iter()
        .map(|loc| rounded(*loc, MATRIX_KEY_DECIMALS))
        .collect::<Vec<_>>()
        .join(";")
}

fn address_key(location: Location) -> String {
    rounded(location, ADDRESS_KEY_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix_round_trip_and_order_sensitivity() {
        let cache = GeoCache::new();
        let a = Location::new(10.0, 106.0);
        let b = Location::new(10.01, 106.01);
        let mut matrix = DistanceMatrix::new(2);
        matrix.set(0, 1, 1.5);
        matrix.set(1, 0, 1.5);

        cache.store_matrix(&[a, b], matrix.clone());
        assert_eq!(cache.matrix(&[a, b]).as_deref(), Some(&matrix));
        assert!(cache.matrix(&[b, a]).is_none());
    }

    #[test]
    fn test_replacing_entry_keeps_old_snapshot_intact() {
        let cache = GeoCache::new();
        let a = Location::new(10.0, 106.0);

        let first = cache.store_matrix(&[a], DistanceMatrix::new(1));
        let second = cache.store_matrix(&[a], DistanceMatrix::new(1));
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(first.size(), 1);
        assert!(Arc::ptr_eq(&cache.matrix(&[a]).unwrap(), &second));
    }

    #[test]
    fn test_address_key_rounds_coordinates() {
        let cache = GeoCache::new();
        cache.store_address(Location::new(10.000001, 106.0), "Ben Thanh Market");
        assert_eq!(
            cache.address(Location::new(10.0, 106.0)).as_deref(),
            Some("Ben Thanh Market")
        );
        assert_eq!(cache.len(), 1);
    }
}
