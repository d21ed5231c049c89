//! Trade-off variants: the same request solved under several distance weights.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::PlanError;
use crate::itinerary::Plan;
use crate::models::PlanRequest;
use crate::planner::Planner;
use crate::traits::RoutingSolver;

/// A named distance-cost weighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanVariant {
    pub name: String,
    /// Cost units per scaled distance unit (metre with default scaling).
    pub distance_cost_weight: f64,
}

impl PlanVariant {
    pub fn new(name: impl Into<String>, distance_cost_weight: f64) -> Self {
        Self {
            name: name.into(),
            distance_cost_weight,
        }
    }

    /// Ignore distance, moderate distance penalty, distance-dominant.
    pub fn defaults() -> Vec<PlanVariant> {
        vec![
            PlanVariant::new("price_only", 0.0),
            PlanVariant::new("balanced", 0.5),
            PlanVariant::new("nearest", 500.0),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum VariantOutcome {
    Planned(Plan),
    Failed { error: PlanError },
}

/// One variant's result, tagged with its position and name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariantPlan {
    pub id: usize,
    pub variant: String,
    pub distance_cost_weight: f64,
    #[serde(flatten)]
    pub outcome: VariantOutcome,
}

impl VariantPlan {
    pub fn plan(&self) -> Option<&Plan> {
        match &self.outcome {
            VariantOutcome::Planned(plan) => Some(plan),
            VariantOutcome::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&PlanError> {
        match &self.outcome {
            VariantOutcome::Planned(_) => None,
            VariantOutcome::Failed { error } => Some(error),
        }
    }
}

pub struct PlanVariantGenerator<'a, S> {
    planner: &'a Planner<S>,
    variants: Vec<PlanVariant>,
}

impl<'a, S: RoutingSolver> PlanVariantGenerator<'a, S> {
    pub fn new(planner: &'a Planner<S>, variants: Vec<PlanVariant>) -> Self {
        Self { planner, variants }
    }

    /// Uses the weightings the planner was configured with.
    pub fn from_planner(planner: &'a Planner<S>) -> Self {
        Self::new(planner, planner.variants().to_vec())
    }

    pub fn variants(&self) -> &[PlanVariant] {
        &self.variants
    }

    /// Builds the model once and solves every variant independently.
    ///
    /// Request errors (missing input, invalid location, infeasible group)
    /// apply to all weightings and are returned directly. A variant whose
    /// search fails contributes a failed entry; the others are unaffected.
    pub fn generate_plans(&self, request: &PlanRequest) -> Result<Vec<VariantPlan>, PlanError> {
        let model = self.planner.build_model(request)?;

        let plans: Vec<VariantPlan> = self
            .variants
            .par_iter()
            .enumerate()
            .map(|(id, variant)| {
                let outcome = match self.planner.plan_model(&model, variant.distance_cost_weight) {
                    Ok(plan) => VariantOutcome::Planned(plan),
                    Err(error) => {
                        warn!(variant = %variant.name, error = %error, "variant failed");
                        VariantOutcome::Failed { error }
                    }
                };
                VariantPlan {
                    id,
                    variant: variant.name.clone(),
                    distance_cost_weight: variant.distance_cost_weight,
                    outcome,
                }
            })
            .collect();

        info!(
            variants = plans.len(),
            failed = plans.iter().filter(|p| p.error().is_some()).count(),
            "plan variants generated"
        );
        Ok(plans)
    }
}
