// Exhaustive search over order permutations

use tracing::debug;

use crate::algorithms::{
    check_pool, combinations, for_each_permutation, Criterion, OptimizationStrategy, RouteScore,
    COMPANIONS,
};
use crate::error::StrategyError;
use crate::models::{Batch, Order, RouteMetrics};
use crate::oracle::TravelCostOracle;

/// Order of `orders` with the smallest total delivery time
///
/// Tries all n! permutations; keep n small.
pub fn brute_force_time(orders: &[Order], oracle: &TravelCostOracle) -> Vec<Order> {
    let metrics = RouteMetrics::new(oracle);
    best_permutation(orders, |route| metrics.total_time(route))
}

/// Order of `orders` with the fewest discount legs
pub fn brute_force_discount(orders: &[Order], oracle: &TravelCostOracle) -> Vec<Order> {
    let metrics = RouteMetrics::new(oracle);
    best_permutation(orders, |route| metrics.discount_count(route) as f64)
}

/// First permutation reaching the minimum of `cost`
fn best_permutation<F: Fn(&[Order]) -> f64>(orders: &[Order], cost: F) -> Vec<Order> {
    let mut working = orders.to_vec();
    let mut best = orders.to_vec();
    let mut best_cost = f64::MAX;

    for_each_permutation(&mut working, |route: &[Order]| {
        let current = cost(route);
        if current < best_cost {
            best_cost = current;
            best = route.to_vec();
        }
    });

    best
}

/// Exhaustive batch selection with the mandatory order delivered first
///
/// Every combination of up to four pool orders is tried in every order.
pub struct BruteForce {
    criterion: Criterion,
}

impl BruteForce {
    /// Minimizes total delivery time
    pub fn time_oriented() -> Self {
        Self {
            criterion: Criterion::Time,
        }
    }

    /// Minimizes discount count, then total delivery time
    pub fn discount_oriented() -> Self {
        Self {
            criterion: Criterion::Discount,
        }
    }

    /// Minimizes the distance between consecutive orders
    pub fn distance_oriented() -> Self {
        Self {
            criterion: Criterion::Distance,
        }
    }
}

impl OptimizationStrategy for BruteForce {
    fn name(&self) -> &'static str {
        match self.criterion {
            Criterion::Time => "brute_force_time",
            Criterion::Discount => "brute_force_discount",
            Criterion::Distance => "brute_force_distance",
        }
    }

    fn criterion(&self) -> Criterion {
        self.criterion
    }

    fn optimize(
        &self,
        pool: &[Order],
        mandatory: &Order,
        oracle: &TravelCostOracle,
    ) -> Result<Batch, StrategyError> {
        check_pool(pool, mandatory, 0)?;

        let metrics = RouteMetrics::new(oracle);
        let companions = COMPANIONS.min(pool.len());

        let mut best: Option<(RouteScore, Vec<Order>)> = None;
        let mut route = Vec::with_capacity(companions + 1);

        for mut combination in combinations(pool, companions) {
            for_each_permutation(&mut combination, |permutation: &[Order]| {
                route.clear();
                route.push(mandatory.clone());
                route.extend_from_slice(permutation);

                let score = self.criterion.score(&metrics, &route);
                let improves = best
                    .as_ref()
                    .map_or(true, |(best_score, _)| score.total_cmp(best_score).is_lt());
                if improves {
                    best = Some((score, route.clone()));
                }
            });
        }

        let (score, orders) = best.unwrap_or_else(|| (RouteScore(0.0, 0.0), vec![mandatory.clone()]));
        debug!(strategy = self.name(), ?score, "exhaustive search done");

        Batch::new(orders, mandatory)
    }
}
