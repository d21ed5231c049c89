//! Itinerary reconstruction from a solver route.

use std::sync::Arc;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::debug;

use crate::geo::GeoProvider;
use crate::model::OptimizationModel;
use crate::models::Location;
use crate::solver::Solution;

#[derive(Debug, Clone)]
pub struct ItineraryOptions {
    /// Assumed average travel speed used to derive leg durations.
    pub average_speed_kmh: f64,
    /// Count the final leg back to the start in distance and duration.
    pub include_return_leg: bool,
}

impl Default for ItineraryOptions {
    fn default() -> Self {
        Self {
            average_speed_kmh: 25.0,
            include_return_leg: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Coverage {
    Covered,
    NotCovered,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupCoverage {
    pub group: usize,
    pub label: String,
    pub status: Coverage,
}

impl GroupCoverage {
    pub fn key(&self) -> String {
        format!("group{}", self.group)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurchasedItem {
    pub item_id: String,
    pub store_id: String,
    pub price: f64,
}

/// A computed shopping trip. Distance is in kilometres, duration in whole
/// minutes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Plan {
    pub start: String,
    pub end: String,
    pub cost: f64,
    pub distance: f64,
    #[serde(rename = "duration")]
    pub duration_minutes: u64,
    pub coordinates: Vec<Location>,
    pub waypoints: Vec<String>,
    #[serde(serialize_with = "serialize_coverage")]
    pub coverage: Vec<GroupCoverage>,
    pub purchased_items: Vec<PurchasedItem>,
    /// Solver objective in scaled units.
    pub objective: i64,
}

impl Plan {
    pub fn is_fully_covered(&self) -> bool {
        self.coverage
            .iter()
            .all(|group| group.status == Coverage::Covered)
    }

    pub fn uncovered_groups(&self) -> Vec<usize> {
        self.coverage
            .iter()
            .filter(|group| group.status == Coverage::NotCovered)
            .map(|group| group.group)
            .collect()
    }

    pub fn coverage_of(&self, group: usize) -> Option<Coverage> {
        self.coverage.get(group).map(|group| group.status)
    }
}

#[allow(clippy::ptr_arg)]
fn serialize_coverage<S: Serializer>(
    coverage: &Vec<GroupCoverage>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(coverage.len()))?;
    for group in coverage {
        map.serialize_entry(&group.key(), &group.status)?;
    }
    map.end()
}

pub struct ItineraryBuilder {
    geo: Arc<GeoProvider>,
    options: ItineraryOptions,
}

impl ItineraryBuilder {
    pub fn new(geo: Arc<GeoProvider>, options: ItineraryOptions) -> Self {
        Self { geo, options }
    }

    pub fn options(&self) -> &ItineraryOptions {
        &self.options
    }

    pub fn reconstruct(&self, model: &OptimizationModel, solution: &Solution) -> Plan {
        let start = self.geo.reverse_geocode(model.locations[OptimizationModel::DEPOT]);

        let mut coordinates = vec![model.locations[OptimizationModel::DEPOT]];
        let mut waypoints = vec![start.clone()];
        let mut purchased_items = Vec::new();
        let mut last_waypoint = OptimizationModel::DEPOT;
        let mut end: Option<String> = None;
        let mut distance_km = 0.0;
        let mut duration_secs = 0;

        debug!(route = ?solution.route, "reconstructing itinerary");

        let legs = solution.route.len().saturating_sub(1);
        for (leg, pair) in solution.route.windows(2).enumerate() {
            let (from, to) = (pair[0], pair[1]);

            let is_return_leg = to == OptimizationModel::DEPOT && leg + 1 == legs;
            if !is_return_leg || self.options.include_return_leg {
                let km = model
                    .distances_km
                    .get(model.location_of(from), model.location_of(to));
                distance_km += km;
                duration_secs += self.leg_seconds(km);
            }

            let Some(task) = model.task(to) else {
                continue;
            };
            purchased_items.push(PurchasedItem {
                item_id: task.item_id.clone(),
                store_id: task.store_id.clone(),
                price: task.price,
            });

            let address = self.address_of(model, task.location, &start);
            // Consecutive tasks at one location are a single stop.
            if task.location != last_waypoint {
                coordinates.push(model.locations[task.location]);
                waypoints.push(address.clone());
                last_waypoint = task.location;
            }
            end = Some(address);
        }

        let coverage = verify_coverage(model, &purchased_items);
        let cost = purchased_items.iter().map(|item| item.price).sum::<f64>();

        Plan {
            end: end.unwrap_or_else(|| start.clone()),
            start,
            cost: round2(cost),
            distance: round2(distance_km),
            duration_minutes: duration_secs / 60,
            coordinates,
            waypoints,
            coverage,
            purchased_items,
            objective: solution.objective,
        }
    }

    fn leg_seconds(&self, km: f64) -> u64 {
        if self.options.average_speed_kmh <= 0.0 {
            return 0;
        }
        (km / self.options.average_speed_kmh * 3600.0) as u64
    }

    fn address_of(&self, model: &OptimizationModel, location: usize, start: &str) -> String {
        if location == OptimizationModel::DEPOT {
            return start.to_string();
        }
        model
            .location_labels
            .get(location)
            .cloned()
            .flatten()
            .unwrap_or_else(|| model.locations[location].placeholder_address())
    }
}

/// Marks each group covered when a purchased item belongs to it. An item
/// counts for the first group listing it only.
fn verify_coverage(model: &OptimizationModel, purchased: &[PurchasedItem]) -> Vec<GroupCoverage> {
    let mut covered = vec![false; model.groups.len()];
    for item in purchased {
        if let Some(group) = model.groups.iter().position(|g| g.contains(&item.item_id)) {
            covered[group] = true;
        }
    }

    model
        .groups
        .iter()
        .zip(covered)
        .enumerate()
        .map(|(index, (group, covered))| GroupCoverage {
            group: index,
            label: group.label(),
            status: if covered {
                Coverage::Covered
            } else {
                Coverage::NotCovered
            },
        })
        .collect()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
