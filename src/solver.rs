//! Routing search over an optimization model.
//!
//! One vehicle leaves the depot and visits task nodes. Each required group is
//! a disjunction: visit at most one of its nodes, or pay the model penalty.
//! The objective is weighted travel plus the accumulated price of visited
//! nodes plus penalties. The search builds a first route by cheapest arc and
//! improves it with guided local search until the iteration cap or the time
//! limit is reached.

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::error::{PlanError, SolverStatus};
use crate::model::OptimizationModel;
use crate::traits::{RoutingSolver, SolveParameters};

const DEPOT: usize = OptimizationModel::DEPOT;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Maximum guided local search rounds after the first local optimum.
    pub max_iterations: usize,
    /// Scales the arc-penalty weight relative to the mean arc cost.
    pub lambda_coefficient: f64,
    /// Count the leg back to the depot in the objective.
    pub closed_tour: bool,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            lambda_coefficient: 0.1,
            closed_tour: false,
        }
    }
}

/// Best-found node visitation order.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Starts at the depot and ends at the depot (the vehicle's end node).
    pub route: Vec<usize>,
    /// Objective value in scaled units, penalties included.
    pub objective: i64,
    pub status: SolverStatus,
    /// Guided local search rounds performed.
    pub iterations: usize,
}

impl Solution {
    /// Task nodes in visiting order, without the depot at either end.
    pub fn visited_tasks(&self) -> &[usize] {
        match self.route.len() {
            0..=2 => &[],
            len => &self.route[1..len - 1],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GuidedLocalSearch {
    options: SolveOptions,
}

impl GuidedLocalSearch {
    pub fn new(options: SolveOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SolveOptions {
        &self.options
    }
}

impl RoutingSolver for GuidedLocalSearch {
    fn solve(
        &self,
        model: &OptimizationModel,
        params: &SolveParameters,
    ) -> Result<Solution, PlanError> {
        if let Err(reason) = validate(model) {
            warn!(reason = %reason, "rejecting malformed optimization model");
            return Err(PlanError::NoSolution {
                status: SolverStatus::Invalid,
            });
        }

        let deadline = Instant::now().checked_add(params.time_limit);
        let costs = RouteCosts::new(model, params.distance_cost_weight, self.options.closed_tour);

        let mut current = construct(&costs, deadline)?;
        debug!(route = ?current, "initial route from cheapest arc");

        let plain = |route: &[usize]| costs.total(route) as f64;
        local_search(&costs, &mut current, &plain, deadline);

        let mut best = current.clone();
        let mut best_cost = costs.total(&best);
        let mut penalties: HashMap<(usize, usize), u32> = HashMap::new();
        let mut lambda = 0.0;
        let mut iterations = 0;

        for _ in 0..self.options.max_iterations {
            if expired(deadline) {
                break;
            }

            let arcs: Vec<(usize, usize)> = route_arcs(&current, costs.closed_tour).collect();
            let utilities: Vec<f64> = arcs
                .iter()
                .map(|&(from, to)| {
                    let times_penalized = penalties.get(&(from, to)).copied().unwrap_or(0);
                    costs.arc(from, to) as f64 / (1.0 + times_penalized as f64)
                })
                .collect();
            let max_utility = utilities.iter().copied().fold(0.0, f64::max);
            if max_utility <= 0.0 {
                // No arc carries cost; the local optimum is final.
                break;
            }

            if lambda == 0.0 {
                let travel = arcs
                    .iter()
                    .fold(0i64, |sum, &(from, to)| sum.saturating_add(costs.arc(from, to)));
                lambda = self.options.lambda_coefficient * travel as f64 / arcs.len() as f64;
            }

            for (arc, utility) in arcs.iter().zip(&utilities) {
                if *utility >= max_utility {
                    *penalties.entry(*arc).or_insert(0) += 1;
                }
            }

            let guided = |route: &[usize]| {
                let guidance: u32 = route_arcs(route, costs.closed_tour)
                    .map(|arc| penalties.get(&arc).copied().unwrap_or(0))
                    .sum();
                costs.total(route) as f64 + lambda * guidance as f64
            };
            local_search(&costs, &mut current, &guided, deadline);
            iterations += 1;

            let cost = costs.total(&current);
            if cost < best_cost {
                best = current.clone();
                best_cost = cost;
            }
        }

        local_search(&costs, &mut best, &plain, deadline);
        let objective = costs.total(&best);

        let mut route = Vec::with_capacity(best.len() + 2);
        route.push(DEPOT);
        route.extend_from_slice(&best);
        route.push(DEPOT);

        info!(
            status = %SolverStatus::Success,
            objective,
            iterations,
            visited = best.len(),
            uncovered = costs.uncovered(&best),
            "solver finished"
        );

        Ok(Solution {
            route,
            objective,
            status: SolverStatus::Success,
            iterations,
        })
    }
}

/// Cost evaluation for one solve: weighted arcs, prices, and group penalties.
struct RouteCosts<'a> {
    model: &'a OptimizationModel,
    weight: f64,
    penalty: i64,
    closed_tour: bool,
}

impl<'a> RouteCosts<'a> {
    fn new(model: &'a OptimizationModel, weight: f64, closed_tour: bool) -> Self {
        let weight = weight.max(0.0);
        Self {
            model,
            weight,
            penalty: model.penalty_for(weight),
            closed_tour,
        }
    }

    fn arc(&self, from: usize, to: usize) -> i64 {
        (self.model.scaled_node_distance(from, to) as f64 * self.weight).round() as i64
    }

    fn covered(&self, route: &[usize]) -> Vec<bool> {
        let mut covered = vec![false; self.model.groups.len()];
        for group in route.iter().filter_map(|&node| self.model.group_of(node)) {
            covered[group] = true;
        }
        covered
    }

    /// Groups with candidates that the route leaves unvisited. Groups without
    /// candidates carry no disjunction.
    fn uncovered(&self, route: &[usize]) -> usize {
        let covered = self.covered(route);
        self.model
            .group_nodes
            .iter()
            .zip(&covered)
            .filter(|(nodes, covered)| !nodes.is_empty() && !**covered)
            .count()
    }

    fn total(&self, route: &[usize]) -> i64 {
        let travel = route_arcs(route, self.closed_tour)
            .fold(0i64, |sum, (from, to)| sum.saturating_add(self.arc(from, to)));
        let items = route
            .iter()
            .fold(0i64, |sum, &node| sum.saturating_add(self.model.scaled_prices[node]));
        travel
            .saturating_add(items)
            .saturating_add(self.penalty.saturating_mul(self.uncovered(route) as i64))
    }
}

/// Arcs of a route that starts at the depot; the closing arc back to the depot
/// is included only for closed tours.
fn route_arcs(route: &[usize], closed_tour: bool) -> impl Iterator<Item = (usize, usize)> + '_ {
    let closing = if closed_tour {
        route.last().map(|&last| (last, DEPOT))
    } else {
        None
    };
    std::iter::once(DEPOT)
        .chain(route.iter().copied())
        .zip(route.iter().copied())
        .chain(closing)
}

fn expired(deadline: Option<Instant>) -> bool {
    deadline.is_some_and(|deadline| Instant::now() >= deadline)
}

fn validate(model: &OptimizationModel) -> Result<(), String> {
    let locations = model.location_count();
    if locations == 0 {
        return Err("no depot location".to_string());
    }
    if model.distances_km.size() != locations || model.scaled_distances.len() != locations * locations {
        return Err("distance matrix does not match locations".to_string());
    }
    if model.scaled_prices.len() != model.node_count() || model.scaled_prices[DEPOT] != 0 {
        return Err("scaled prices do not match nodes".to_string());
    }
    if model.group_nodes.len() != model.groups.len() {
        return Err("group node lists do not match groups".to_string());
    }
    for (index, task) in model.tasks.iter().enumerate() {
        if task.node != index + 1 || task.location >= locations || task.group >= model.groups.len() {
            return Err(format!("task node {} is inconsistent", index + 1));
        }
    }
    for (group, nodes) in model.group_nodes.iter().enumerate() {
        if nodes.iter().any(|&node| model.group_of(node) != Some(group)) {
            return Err(format!("group {} lists a foreign node", group));
        }
    }
    Ok(())
}

/// Extends the route from its last node along the cheapest arc (arc plus item
/// price) to a node of a group not yet covered.
fn construct(costs: &RouteCosts<'_>, deadline: Option<Instant>) -> Result<Vec<usize>, PlanError> {
    let model = costs.model;
    let mut route = Vec::new();
    let mut covered = vec![false; model.groups.len()];
    let mut last = DEPOT;

    loop {
        if expired(deadline) {
            return Err(PlanError::NoSolution {
                status: SolverStatus::FailTimeout,
            });
        }

        let next = model
            .tasks
            .iter()
            .filter(|task| !covered[task.group])
            .min_by_key(|task| (costs.arc(last, task.node).saturating_add(model.scaled_prices[task.node]), task.node));

        let Some(task) = next else {
            break;
        };
        covered[task.group] = true;
        route.push(task.node);
        last = task.node;
    }

    Ok(route)
}

// ============================================================================
// Local Search Operators
// ============================================================================

/// Applies the first improving candidate, if any, and updates the cost.
fn accept_first<F, I>(route: &mut Vec<usize>, cost: &mut f64, eval: &F, candidates: I) -> bool
where
    F: Fn(&[usize]) -> f64,
    I: IntoIterator<Item = Vec<usize>>,
{
    for candidate in candidates {
        let candidate_cost = eval(&candidate);
        if candidate_cost < *cost - 1e-9 {
            *route = candidate;
            *cost = candidate_cost;
            return true;
        }
    }
    false
}

/// Replace a visited node with another candidate of the same group.
fn swap_candidate_improve<F>(costs: &RouteCosts<'_>, route: &mut Vec<usize>, cost: &mut f64, eval: &F) -> bool
where
    F: Fn(&[usize]) -> f64,
{
    let model = costs.model;
    let current = route.clone();
    let candidates = (0..current.len()).flat_map(|position| {
        let node = current[position];
        let alternatives = model
            .group_of(node)
            .map(|group| model.group_nodes[group].as_slice())
            .unwrap_or(&[]);
        let current = &current;
        alternatives
            .iter()
            .filter(move |&&alternative| alternative != node)
            .map(move |&alternative| {
                let mut candidate = current.clone();
                candidate[position] = alternative;
                candidate
            })
    });
    accept_first(route, cost, eval, candidates)
}

/// Move one node to another position.
fn relocate_improve<F>(route: &mut Vec<usize>, cost: &mut f64, eval: &F) -> bool
where
    F: Fn(&[usize]) -> f64,
{
    let current = route.clone();
    let n = current.len();
    let candidates = (0..n).flat_map(|from| {
        let current = &current;
        (0..n).filter(move |&to| to != from).map(move |to| {
            let mut candidate = current.clone();
            let node = candidate.remove(from);
            candidate.insert(to, node);
            candidate
        })
    });
    accept_first(route, cost, eval, candidates)
}

/// 2-opt: reverse a segment of the route.
fn two_opt_improve<F>(route: &mut Vec<usize>, cost: &mut f64, eval: &F) -> bool
where
    F: Fn(&[usize]) -> f64,
{
    if route.len() < 2 {
        return false;
    }
    let current = route.clone();
    let n = current.len();
    let candidates = (0..n - 1).flat_map(|i| {
        let current = &current;
        (i + 1..n).map(move |j| {
            let mut candidate = current.clone();
            candidate[i..=j].reverse();
            candidate
        })
    });
    accept_first(route, cost, eval, candidates)
}

/// Insert a candidate of an uncovered group at any position.
fn insert_improve<F>(costs: &RouteCosts<'_>, route: &mut Vec<usize>, cost: &mut f64, eval: &F) -> bool
where
    F: Fn(&[usize]) -> f64,
{
    let model = costs.model;
    let covered = costs.covered(route);
    let current = route.clone();
    let candidates = model
        .group_nodes
        .iter()
        .enumerate()
        .filter(|(group, _)| !covered[*group])
        .flat_map(|(_, nodes)| nodes.iter().copied())
        .flat_map(|node| {
            let current = &current;
            (0..=current.len()).map(move |position| {
                let mut candidate = current.clone();
                candidate.insert(position, node);
                candidate
            })
        });
    accept_first(route, cost, eval, candidates)
}

/// Skip a node, leaving its group to the disjunction penalty.
fn drop_improve<F>(route: &mut Vec<usize>, cost: &mut f64, eval: &F) -> bool
where
    F: Fn(&[usize]) -> f64,
{
    let current = route.clone();
    let candidates = (0..current.len()).map(|position| {
        let mut candidate = current.clone();
        candidate.remove(position);
        candidate
    });
    accept_first(route, cost, eval, candidates)
}

/// Run operators until none improves or the deadline passes.
fn local_search<F>(costs: &RouteCosts<'_>, route: &mut Vec<usize>, eval: &F, deadline: Option<Instant>)
where
    F: Fn(&[usize]) -> f64,
{
    let mut cost = eval(route);
    loop {
        if expired(deadline) {
            break;
        }

        let improved = swap_candidate_improve(costs, route, &mut cost, eval)
            || relocate_improve(route, &mut cost, eval)
            || two_opt_improve(route, &mut cost, eval)
            || insert_improve(costs, route, &mut cost, eval)
            || drop_improve(route, &mut cost, eval);

        if !improved {
            break;
        }
    }
}
