//! shopping-planner core
//!
//! Plans a single multi-stop shopping trip: pick one store offering for each
//! required item group and order the stops, trading item prices against
//! travel distance.

pub mod traits;
pub mod error;
pub mod models;
pub mod matrix;
pub mod haversine;
pub mod ors;
pub mod cache;
pub mod geo;
pub mod model;
pub mod solver;
pub mod itinerary;
pub mod planner;
pub mod variants;
pub mod catalog;
pub mod config;

pub use config::PlannerConfig;
pub use error::{ErrorKind, PlanError, SolverStatus};
pub use itinerary::Plan;
pub use models::{Location, PlanRequest, RequiredGroup, StoreInput};
pub use planner::Planner;
pub use variants::{PlanVariant, PlanVariantGenerator, VariantPlan};
