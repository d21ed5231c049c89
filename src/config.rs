//! Planner configuration with environment overrides.

use std::str::FromStr;

use tracing::warn;

use crate::itinerary::ItineraryOptions;
use crate::model::CostScaling;
use crate::ors::OrsConfig;
use crate::solver::SolveOptions;
use crate::variants::PlanVariant;

pub const ENV_ORS_API_KEY: &str = "ORS_API_KEY";
pub const ENV_ORS_BASE_URL: &str = "ORS_BASE_URL";
pub const ENV_TIME_LIMIT_SECS: &str = "PLANNER_TIME_LIMIT_SECS";
pub const ENV_AVERAGE_SPEED_KMH: &str = "PLANNER_AVERAGE_SPEED_KMH";
pub const ENV_DISTANCE_COST_WEIGHT: &str = "PLANNER_DISTANCE_COST_WEIGHT";

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub ors: OrsConfig,
    pub scaling: CostScaling,
    pub solve: SolveOptions,
    pub itinerary: ItineraryOptions,
    /// Wall-clock budget for a single routing search.
    pub time_limit_secs: u64,
    /// Weight used by `Planner::plan`.
    pub distance_cost_weight: f64,
    pub variants: Vec<PlanVariant>,
    /// Memoise distance matrices and addresses across requests.
    pub cache_enabled: bool,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            ors: OrsConfig::default(),
            scaling: CostScaling::default(),
            solve: SolveOptions::default(),
            itinerary: ItineraryOptions::default(),
            time_limit_secs: 3,
            distance_cost_weight: 0.5,
            variants: PlanVariant::defaults(),
            cache_enabled: true,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Defaults overridden by whatever `lookup` returns. Values that fail to
    /// parse are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(key) = lookup(ENV_ORS_API_KEY).filter(|key| !key.trim().is_empty()) {
            config.ors.api_key = Some(key);
        }
        if let Some(url) = lookup(ENV_ORS_BASE_URL).filter(|url| !url.trim().is_empty()) {
            config.ors.base_url = url;
        }
        if let Some(secs) = parsed(&lookup, ENV_TIME_LIMIT_SECS) {
            config.time_limit_secs = secs;
        }
        if let Some(speed) = parsed::<f64, _>(&lookup, ENV_AVERAGE_SPEED_KMH) {
            if speed.is_finite() && speed > 0.0 {
                config.itinerary.average_speed_kmh = speed;
            } else {
                warn!(setting = ENV_AVERAGE_SPEED_KMH, speed, "ignoring non-positive speed");
            }
        }
        if let Some(weight) = parsed::<f64, _>(&lookup, ENV_DISTANCE_COST_WEIGHT) {
            if weight.is_finite() && weight >= 0.0 {
                config.distance_cost_weight = weight;
            } else {
                warn!(setting = ENV_DISTANCE_COST_WEIGHT, weight, "ignoring negative weight");
            }
        }

        config
    }
}

fn parsed<T, F>(lookup: &F, name: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(setting = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}
