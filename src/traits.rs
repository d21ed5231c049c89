//! Seams between the planner and its collaborators.
//!
//! Geo providers and the routing search sit behind these traits so remote
//! services and search algorithms can be swapped without touching model
//! construction or itinerary reconstruction.

use std::time::Duration;

use crate::error::{PlanError, ProviderError};
use crate::matrix::DistanceMatrix;
use crate::model::OptimizationModel;
use crate::models::Location;
use crate::solver::Solution;

/// Provides a distance matrix in kilometres for a set of locations.
///
/// The matrix is indexed by the provided location order.
pub trait DistanceMatrixProvider: Send + Sync {
    fn matrix_for(&self, locations: &[Location]) -> Result<DistanceMatrix, ProviderError>;
}

/// Resolves coordinates to a human-readable address.
pub trait ReverseGeocoder: Send + Sync {
    fn address_for(&self, location: Location) -> Result<String, ProviderError>;
}

/// Per-invocation search parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveParameters {
    /// Multiplier applied to scaled distances in the arc cost.
    pub distance_cost_weight: f64,
    /// Hard wall-clock bound on the search.
    pub time_limit: Duration,
}

impl Default for SolveParameters {
    fn default() -> Self {
        Self {
            distance_cost_weight: 1.0,
            time_limit: Duration::from_secs(3),
        }
    }
}

/// Single-vehicle routing search over an [`OptimizationModel`].
pub trait RoutingSolver: Send + Sync {
    fn solve(
        &self,
        model: &OptimizationModel,
        params: &SolveParameters,
    ) -> Result<Solution, PlanError>;
}
