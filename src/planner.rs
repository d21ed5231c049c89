//! Planning pipeline: model building, routing search, itinerary reconstruction.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::GeoCache;
use crate::config::PlannerConfig;
use crate::error::PlanError;
use crate::geo::GeoProvider;
use crate::itinerary::{ItineraryBuilder, Plan};
use crate::model::{ModelBuilder, OptimizationModel};
use crate::models::PlanRequest;
use crate::ors::OrsClient;
use crate::solver::GuidedLocalSearch;
use crate::traits::{RoutingSolver, SolveParameters};
use crate::variants::PlanVariant;

/// Stateless planner; share it across threads and requests.
pub struct Planner<S = GuidedLocalSearch> {
    builder: ModelBuilder,
    solver: S,
    itinerary: ItineraryBuilder,
    time_limit: Duration,
    distance_cost_weight: f64,
    variants: Vec<PlanVariant>,
}

impl Planner<GuidedLocalSearch> {
    /// Wires the geo provider from configuration: OpenRouteService when an API
    /// key is present, great-circle distances otherwise.
    pub fn from_config(config: &PlannerConfig) -> Self {
        let mut geo = match config.ors.api_key {
            Some(_) => match OrsClient::new(config.ors.clone()) {
                Ok(client) => GeoProvider::with_ors(client),
                Err(err) => {
                    warn!(error = %err, "could not build routing client, using haversine distances");
                    GeoProvider::offline()
                }
            },
            None => {
                info!("no routing API key configured, using haversine distances");
                GeoProvider::offline()
            }
        };
        if config.cache_enabled {
            geo = geo.with_cache(Arc::new(GeoCache::new()));
        }

        Self::new(
            config,
            Arc::new(geo),
            GuidedLocalSearch::new(config.solve.clone()),
        )
    }
}

impl<S: RoutingSolver> Planner<S> {
    pub fn new(config: &PlannerConfig, geo: Arc<GeoProvider>, solver: S) -> Self {
        Self {
            builder: ModelBuilder::new(geo.clone(), config.scaling.clone()),
            solver,
            itinerary: ItineraryBuilder::new(geo, config.itinerary.clone()),
            time_limit: Duration::from_secs(config.time_limit_secs),
            distance_cost_weight: config.distance_cost_weight,
            variants: config.variants.clone(),
        }
    }

    /// Weightings used by [`crate::variants::PlanVariantGenerator::from_planner`].
    pub fn variants(&self) -> &[PlanVariant] {
        &self.variants
    }

    pub fn build_model(&self, request: &PlanRequest) -> Result<OptimizationModel, PlanError> {
        self.builder.build(request)
    }

    /// Solves a prepared model at the given distance weight and reconstructs
    /// the trip.
    pub fn plan_model(
        &self,
        model: &OptimizationModel,
        distance_cost_weight: f64,
    ) -> Result<Plan, PlanError> {
        let params = SolveParameters {
            distance_cost_weight,
            time_limit: self.time_limit,
        };
        let solution = self.solver.solve(model, &params)?;
        let plan = self.itinerary.reconstruct(model, &solution);

        if !plan.is_fully_covered() {
            warn!(groups = ?plan.uncovered_groups(), "plan leaves required groups uncovered");
        }
        info!(cost = plan.cost, distance_km = plan.distance, stops = plan.waypoints.len(), "plan produced");
        Ok(plan)
    }

    /// Single plan at the configured distance weight.
    pub fn plan(&self, request: &PlanRequest) -> Result<Plan, PlanError> {
        let model = self.build_model(request)?;
        self.plan_model(&model, self.distance_cost_weight)
    }
}
