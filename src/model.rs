//! Optimization model construction.
//!
//! Node 0 is the depot (the shopper's position, location 0). Every other node
//! is a task: "buy this candidate item at this store". Tasks are numbered from
//! 1 in store-key order, then item-id order within a store.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::PlanError;
use crate::geo::GeoProvider;
use crate::matrix::DistanceMatrix;
use crate::models::{Location, PlanRequest, RequiredGroup, parse_number};

/// Largest scaled price accepted. Keeps route costs and the penalty well
/// inside `i64`.
pub const MAX_SCALED_PRICE: f64 = 1e12;

/// Converts kilometres and prices into the integer units seen by the solver.
#[derive(Debug, Clone)]
pub struct CostScaling {
    /// Scaled distance units per kilometre (1000 = metres).
    pub distance_units_per_km: f64,
    /// Multiplier applied to item prices.
    pub price_scale: f64,
    /// Lower bound on the penalty for leaving a group uncovered.
    pub min_penalty: i64,
}

impl Default for CostScaling {
    fn default() -> Self {
        Self {
            distance_units_per_km: 1000.0,
            price_scale: 1.0,
            min_penalty: 1_000_000,
        }
    }
}

/// A candidate purchase bound to its store location.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskNode {
    pub node: usize,
    pub item_id: String,
    pub store_id: String,
    /// Original (unscaled) price.
    pub price: f64,
    pub location: usize,
    pub group: usize,
}

#[derive(Debug, Clone)]
pub struct OptimizationModel {
    /// Unique physical locations; index 0 is the depot.
    pub locations: Vec<Location>,
    /// Store address (or key) for each location; `None` for the depot.
    pub location_labels: Vec<Option<String>>,
    /// Task `i` is node `i + 1`.
    pub tasks: Vec<TaskNode>,
    /// Task nodes per required group, in node order.
    pub group_nodes: Vec<Vec<usize>>,
    pub groups: Vec<RequiredGroup>,
    pub distances_km: Arc<DistanceMatrix>,
    /// Row-major scaled distances between locations.
    pub scaled_distances: Vec<i64>,
    /// Scaled price per node; `scaled_prices[0] == 0`.
    pub scaled_prices: Vec<i64>,
    /// Penalty for an uncovered group at distance weight 1.
    pub scaled_penalty: i64,
    pub min_penalty: i64,
}

impl OptimizationModel {
    pub const DEPOT: usize = 0;

    pub fn node_count(&self) -> usize {
        self.tasks.len() + 1
    }

    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    pub fn task(&self, node: usize) -> Option<&TaskNode> {
        node.checked_sub(1).and_then(|index| self.tasks.get(index))
    }

    /// Location index of a node; the depot sits at location 0.
    pub fn location_of(&self, node: usize) -> usize {
        self.task(node).map_or(0, |task| task.location)
    }

    pub fn group_of(&self, node: usize) -> Option<usize> {
        self.task(node).map(|task| task.group)
    }

    pub fn scaled_distance(&self, from_location: usize, to_location: usize) -> i64 {
        self.scaled_distances[from_location * self.locations.len() + to_location]
    }

    pub fn scaled_node_distance(&self, from_node: usize, to_node: usize) -> i64 {
        self.scaled_distance(self.location_of(from_node), self.location_of(to_node))
    }

    pub fn max_scaled_edge(&self) -> i64 {
        self.scaled_distances.iter().copied().max().unwrap_or(0)
    }

    pub fn max_scaled_price(&self) -> i64 {
        self.scaled_prices.iter().copied().max().unwrap_or(0)
    }

    /// Penalty that dominates every route cost reachable at the given distance
    /// weight: `max(min, 2 × (maxEdge × weight × nodes + maxPrice × groups) + 1)`.
    pub fn penalty_for(&self, distance_cost_weight: f64) -> i64 {
        let max_edge = (self.max_scaled_edge() as f64 * distance_cost_weight.max(0.0)).ceil() as i64;
        let estimate = max_edge
            .saturating_mul(self.node_count() as i64)
            .saturating_add(self.max_scaled_price().saturating_mul(self.groups.len() as i64));
        self.min_penalty
            .max(estimate.saturating_mul(2).saturating_add(1))
    }
}

pub struct ModelBuilder {
    geo: Arc<GeoProvider>,
    scaling: CostScaling,
}

impl ModelBuilder {
    pub fn new(geo: Arc<GeoProvider>, scaling: CostScaling) -> Self {
        Self { geo, scaling }
    }

    pub fn scaling(&self) -> &CostScaling {
        &self.scaling
    }

    pub fn build(&self, request: &PlanRequest) -> Result<OptimizationModel, PlanError> {
        request.ensure_complete()?;
        let groups = &request.groups;

        let user = request
            .user_loc
            .as_ref()
            .and_then(|raw| raw.parse())
            .ok_or_else(|| {
                PlanError::invalid_location(format!("user location {:?}", request.user_loc))
            })?;

        let mut locations = vec![user];
        let mut location_labels: Vec<Option<String>> = vec![None];
        let mut location_cache: HashMap<(u64, u64), usize> = HashMap::new();
        location_cache.insert(user.exact_key(), 0);

        let mut tasks: Vec<TaskNode> = Vec::new();
        let mut group_nodes: Vec<Vec<usize>> = vec![Vec::new(); groups.len()];

        for (store_id, store) in &request.stores {
            let Some(store_location) = store.location() else {
                warn!(store = %store_id, "skipping store with invalid coordinates");
                continue;
            };

            let location = *location_cache
                .entry(store_location.exact_key())
                .or_insert_with(|| {
                    locations.push(store_location);
                    location_labels.push(Some(
                        store.address.clone().unwrap_or_else(|| store_id.clone()),
                    ));
                    locations.len() - 1
                });

            for (item_id, raw_price) in &store.items {
                let Some(price) = parse_number(raw_price) else {
                    warn!(store = %store_id, item = %item_id, price = %raw_price, "skipping item with invalid price");
                    continue;
                };
                if (price * self.scaling.price_scale).abs() > MAX_SCALED_PRICE {
                    warn!(store = %store_id, item = %item_id, price, "skipping item with out-of-range price");
                    continue;
                }

                // First matching group claims the item.
                let Some(group) = groups.iter().position(|g| g.contains(item_id)) else {
                    continue;
                };

                let node = tasks.len() + 1;
                tasks.push(TaskNode {
                    node,
                    item_id: item_id.clone(),
                    store_id: store_id.clone(),
                    price,
                    location,
                    group,
                });
                group_nodes[group].push(node);
            }
        }

        if let Some(index) = groups
            .iter()
            .zip(&group_nodes)
            .position(|(group, nodes)| !group.is_empty() && nodes.is_empty())
        {
            return Err(PlanError::InfeasibleGroup {
                index,
                label: groups[index].label(),
            });
        }

        let distances_km = self.geo.distance_matrix(&locations);
        let scaled_distances = distances_km
            .rows()
            .into_iter()
            .flatten()
            .map(|km| (km * self.scaling.distance_units_per_km).round() as i64)
            .collect();

        let scaled_prices = std::iter::once(0)
            .chain(
                tasks
                    .iter()
                    .map(|task| (task.price * self.scaling.price_scale).round() as i64),
            )
            .collect();

        let mut model = OptimizationModel {
            locations,
            location_labels,
            tasks,
            group_nodes,
            groups: groups.clone(),
            distances_km,
            scaled_distances,
            scaled_prices,
            scaled_penalty: 0,
            min_penalty: self.scaling.min_penalty,
        };
        model.scaled_penalty = model.penalty_for(1.0);

        info!(
            nodes = model.node_count(),
            locations = model.location_count(),
            groups = model.groups.len(),
            penalty = model.scaled_penalty,
            "optimization model prepared"
        );

        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::StoreInput;
    use serde_json::Value;

    fn builder() -> ModelBuilder {
        ModelBuilder::new(Arc::new(GeoProvider::offline()), CostScaling::default())
    }

    fn scenario() -> PlanRequest {
        PlanRequest::new(Location::new(10.0, 106.0))
            .with_store(
                "StoreA",
                StoreInput::at(10.01, 106.01)
                    .with_item("milk_a", 20000.0)
                    .with_item("bread_a", 15000.0),
            )
            .with_store("StoreB", StoreInput::at(10.02, 106.0).with_item("milk_b", 18000.0))
            .with_group(["milk_a", "milk_b"])
            .with_group(["bread_a"])
    }

    #[test]
    fn test_nodes_and_locations() {
        let model = builder().build(&scenario()).unwrap();

        assert_eq!(model.location_count(), 3);
        assert_eq!(model.node_count(), 4);
        assert_eq!(model.location_of(0), 0);
        // StoreA items in id order: bread_a, milk_a
        assert_eq!(model.task(1).unwrap().item_id, "bread_a");
        assert_eq!(model.task(2).unwrap().item_id, "milk_a");
        assert_eq!(model.task(3).unwrap().item_id, "milk_b");
        assert_eq!(model.group_nodes, vec![vec![2, 3], vec![1]]);
        assert_eq!(model.scaled_prices, vec![0, 15000, 20000, 18000]);
        assert!(model.tasks.iter().all(|task| task.location != 0));
        assert_eq!(model.location_labels[1].as_deref(), Some("StoreA"));
    }

    #[test]
    fn test_stores_sharing_coordinates_share_a_location() {
        let request = scenario().with_store(
            "StoreA2",
            StoreInput::at(10.01, 106.01)
                .with_address("2 Le Loi")
                .with_item("milk_a", 19000.0),
        );
        let model = builder().build(&request).unwrap();
        assert_eq!(model.location_count(), 3);
        let task = model.tasks.iter().find(|t| t.store_id == "StoreA2").unwrap();
        assert_eq!(task.location, 1);
        // First store at the location keeps the label
        assert_eq!(model.location_labels[1].as_deref(), Some("StoreA"));
    }

    #[test]
    fn test_invalid_store_and_price_are_skipped() {
        let mut broken = StoreInput::at(0.0, 0.0).with_item("milk_a", 1.0);
        broken.lat = Value::from("not a number");
        let mut request = scenario().with_store("Broken", broken);
        request
            .stores
            .get_mut("StoreB")
            .unwrap()
            .items
            .insert("milk_c".to_string(), Value::from("free"));
        request.groups[0] = RequiredGroup::new(["milk_a", "milk_b", "milk_c"]);

        let model = builder().build(&request).unwrap();
        assert_eq!(model.location_count(), 3);
        assert!(model.tasks.iter().all(|t| t.store_id != "Broken"));
        assert!(model.tasks.iter().all(|t| t.item_id != "milk_c"));
    }

    #[test]
    fn test_first_matching_group_claims_item() {
        let request = PlanRequest::new(Location::new(10.0, 106.0))
            .with_store("StoreA", StoreInput::at(10.01, 106.01).with_item("milk_a", 1.0))
            .with_store("StoreB", StoreInput::at(10.02, 106.0).with_item("milk_b", 1.0))
            .with_group(["milk_a"])
            .with_group(["milk_a", "milk_b"]);
        let model = builder().build(&request).unwrap();
        assert_eq!(model.group_nodes, vec![vec![1], vec![2]]);
        assert_eq!(model.task(1).unwrap().group, 0);
    }

    #[test]
    fn test_infeasible_group_is_named() {
        let request = PlanRequest::new(Location::new(10.0, 106.0))
            .with_store("StoreA", StoreInput::at(10.01, 106.01).with_item("milk_a", 1.0))
            .with_group(["milk_a"])
            .with_group(["eggs_x"]);
        let err = builder().build(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InfeasibleGroup);
        assert_eq!(
            err,
            PlanError::InfeasibleGroup {
                index: 1,
                label: "eggs_x".to_string()
            }
        );
    }

    #[test]
    fn test_invalid_user_location() {
        let mut request = scenario();
        request.user_loc = Some(crate::models::RawLocation {
            lat: Value::from("north"),
            lng: Value::from(106.0),
        });
        let err = builder().build(&request).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidLocation);
    }

    #[test]
    fn test_penalty_dominates_route_costs() {
        let model = builder().build(&scenario()).unwrap();
        let max_edge = model.max_scaled_edge();
        let worst = max_edge * model.node_count() as i64
            + model.max_scaled_price() * model.groups.len() as i64;
        assert!(model.scaled_penalty > worst);
        assert!(model.scaled_penalty >= 1_000_000);

        let heavy = model.penalty_for(500.0);
        assert!(heavy > max_edge * 500 * model.node_count() as i64);
        assert!(heavy > model.scaled_penalty);
    }

    #[test]
    fn test_scaled_distances_follow_matrix() {
        let model = builder().build(&scenario()).unwrap();
        let km = model.distances_km.get(0, 2);
        assert_eq!(model.scaled_distance(0, 2), (km * 1000.0).round() as i64);
        assert_eq!(model.scaled_distance(2, 0), model.scaled_distance(0, 2));
        assert_eq!(model.scaled_node_distance(2, 1), 0);
    }

    #[test]
    fn test_out_of_range_price_is_skipped() {
        let request = PlanRequest::new(Location::new(10.0, 106.0))
            .with_store(
                "StoreA",
                StoreInput::at(10.01, 106.01)
                    .with_item("x", 1e19)
                    .with_item("y", 1000.0),
            )
            .with_group(["x"])
            .with_group(["y"]);
        let err = builder().build(&request).unwrap_err();
        assert_eq!(
            err,
            PlanError::InfeasibleGroup {
                index: 0,
                label: "x".to_string()
            }
        );

        let request = request.with_store("StoreB", StoreInput::at(10.02, 106.0).with_item("x", 5000.0));
        let model = builder().build(&request).unwrap();
        assert_eq!(model.tasks.len(), 2);
        assert!(model.max_scaled_price() <= MAX_SCALED_PRICE as i64);
    }
}
