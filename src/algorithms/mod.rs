// Batch selection strategies and the helpers they share

pub mod arbiter;
pub mod brute_force;
pub mod dynamic;
pub mod genetic;
pub mod grader;
pub mod greedy;

use std::cmp::Ordering;

use crate::error::StrategyError;
use crate::models::{Batch, GeoPoint, Order, RouteMetrics, BATCH_SIZE};
use crate::oracle::TravelCostOracle;

/// What a strategy variant tries to minimize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Criterion {
    Time,
    Distance,
    Discount,
}

/// Trait for batch selection strategies
pub trait OptimizationStrategy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    fn criterion(&self) -> Criterion;

    /// Picks up to `BATCH_SIZE - 1` orders from `pool` and routes them
    /// together with `mandatory`. `pool` must not contain `mandatory`.
    fn optimize(
        &self,
        pool: &[Order],
        mandatory: &Order,
        oracle: &TravelCostOracle,
    ) -> Result<Batch, StrategyError>;
}

/// Lexicographic route score, lower is better
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct RouteScore(pub f64, pub f64);

impl RouteScore {
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0
            .total_cmp(&other.0)
            .then_with(|| self.1.total_cmp(&other.1))
    }
}

impl Criterion {
    /// Score of a route under this criterion
    ///
    /// Time: (total time, discounts). Discount: (discounts, total time).
    /// Distance: (distance between consecutive orders, total time).
    pub fn score(&self, metrics: &RouteMetrics<'_>, route: &[Order]) -> RouteScore {
        match self {
            Criterion::Time => RouteScore(
                metrics.total_time(route),
                metrics.discount_count(route) as f64,
            ),
            Criterion::Discount => RouteScore(
                metrics.discount_count(route) as f64,
                metrics.total_time(route),
            ),
            Criterion::Distance => {
                RouteScore(metrics.chain_distance(route), metrics.total_time(route))
            }
        }
    }

    /// Cost of a single leg: distance for `Distance`, travel time otherwise
    pub fn leg_cost(&self, oracle: &TravelCostOracle, from: GeoPoint, to: GeoPoint) -> f64 {
        match self {
            Criterion::Distance => oracle.distance(from, to),
            Criterion::Time | Criterion::Discount => oracle.time(from, to),
        }
    }
}

/// Number of pool orders a full batch needs besides the mandatory one
pub const COMPANIONS: usize = BATCH_SIZE - 1;

/// Checks the common preconditions of every strategy
pub fn check_pool(pool: &[Order], mandatory: &Order, required: usize) -> Result<(), StrategyError> {
    if pool.iter().any(|order| order.id() == mandatory.id()) {
        return Err(StrategyError::MandatoryInPool(mandatory.id()));
    }
    if pool.len() < required {
        return Err(StrategyError::InsufficientOrders {
            required,
            available: pool.len(),
        });
    }
    Ok(())
}

/// All `k`-combinations of `orders`, in lexicographic index order
pub fn combinations(orders: &[Order], k: usize) -> Vec<Vec<Order>> {
    fn collect(
        orders: &[Order],
        k: usize,
        start: usize,
        current: &mut Vec<Order>,
        all: &mut Vec<Vec<Order>>,
    ) {
        if current.len() == k {
            all.push(current.clone());
            return;
        }
        for i in start..orders.len() {
            current.push(orders[i].clone());
            collect(orders, k, i + 1, current, all);
            current.pop();
        }
    }

    let mut all = Vec::new();
    if k <= orders.len() {
        collect(orders, k, 0, &mut Vec::with_capacity(k), &mut all);
    }
    all
}

/// Visits every permutation of `orders` by in-place swapping
pub fn for_each_permutation<F: FnMut(&[Order])>(orders: &mut [Order], mut visit: F) {
    fn permute<F: FnMut(&[Order])>(orders: &mut [Order], k: usize, visit: &mut F) {
        if k + 1 >= orders.len() {
            visit(orders);
            return;
        }
        for i in k..orders.len() {
            orders.swap(i, k);
            permute(orders, k + 1, visit);
            orders.swap(k, i);
        }
    }

    permute(orders, 0, &mut visit);
}
