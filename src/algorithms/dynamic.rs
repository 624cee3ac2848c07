// Subset dynamic programming over batches containing the mandatory order

use std::collections::HashMap;

use tracing::debug;

use crate::algorithms::{check_pool, combinations, Criterion, OptimizationStrategy, COMPANIONS};
use crate::error::StrategyError;
use crate::models::{Batch, Order, OrderId, RouteMetrics};
use crate::oracle::TravelCostOracle;

/// Cheapest path through a subset ending at a given order, and the order before it
#[derive(Debug, Clone, Copy)]
struct PathEntry {
    cost: f64,
    previous: OrderId,
}

/// Sorted ids identifying a subset
type SubsetKey = Vec<OrderId>;

fn key_of(ids: impl IntoIterator<Item = OrderId>) -> SubsetKey {
    let mut key: Vec<OrderId> = ids.into_iter().collect();
    key.sort_unstable();
    key
}

/// Minimum-cost path from the mandatory order through four pool orders
///
/// The table is indexed by (subset, last order), subsets always containing
/// the mandatory order m: `cost({m}, m) = 0` and `cost(S, last) = min over
/// prev in S - last of cost(S - last, prev) + leg(prev, last)`. Subsets are
/// enumerated explicitly, which is only affordable for the small pools this
/// tier serves.
pub struct SubsetDynamic {
    criterion: Criterion,
}

impl SubsetDynamic {
    /// Leg cost is the driving distance
    pub fn distance_oriented() -> Self {
        Self {
            criterion: Criterion::Distance,
        }
    }

    /// Leg cost is 1 for a discount leg, 0 otherwise
    pub fn discount_oriented() -> Self {
        Self {
            criterion: Criterion::Discount,
        }
    }

    fn leg(&self, oracle: &TravelCostOracle, from: &Order, to: &Order) -> f64 {
        match self.criterion {
            Criterion::Discount => {
                let metrics = RouteMetrics::new(oracle);
                if metrics.is_discount_leg(from.location(), to.location()) {
                    1.0
                } else {
                    0.0
                }
            }
            criterion => criterion.leg_cost(oracle, from.location(), to.location()),
        }
    }

    /// Batch and path cost of the optimal subset
    pub fn optimize_with_cost(
        &self,
        pool: &[Order],
        mandatory: &Order,
        oracle: &TravelCostOracle,
    ) -> Result<(Batch, f64), StrategyError> {
        check_pool(pool, mandatory, COMPANIONS)?;

        let by_id: HashMap<OrderId, &Order> = pool
            .iter()
            .chain(std::iter::once(mandatory))
            .map(|order| (order.id(), order))
            .collect();

        let mut memo: HashMap<(SubsetKey, OrderId), PathEntry> = HashMap::new();
        memo.insert(
            (vec![mandatory.id()], mandatory.id()),
            PathEntry {
                cost: 0.0,
                previous: mandatory.id(),
            },
        );

        let mut best_full: Option<(SubsetKey, OrderId, f64)> = None;

        for size in 2..=COMPANIONS + 1 {
            for companions in combinations(pool, size - 1) {
                let subset = key_of(
                    companions
                        .iter()
                        .map(Order::id)
                        .chain(std::iter::once(mandatory.id())),
                );

                for last in &companions {
                    let rest = key_of(subset.iter().copied().filter(|id| *id != last.id()));

                    let mut best: Option<PathEntry> = None;
                    for &previous in &rest {
                        // Paths of two or more orders never end at the mandatory one
                        if rest.len() > 1 && previous == mandatory.id() {
                            continue;
                        }
                        let Some(entry) = memo.get(&(rest.clone(), previous)) else {
                            continue;
                        };

                        let cost = entry.cost + self.leg(oracle, by_id[&previous], last);
                        if best.map_or(true, |b| cost < b.cost) {
                            best = Some(PathEntry { cost, previous });
                        }
                    }

                    if let Some(entry) = best {
                        if size == COMPANIONS + 1
                            && best_full.as_ref().map_or(true, |(_, _, cost)| entry.cost < *cost)
                        {
                            best_full = Some((subset.clone(), last.id(), entry.cost));
                        }
                        memo.insert((subset.clone(), last.id()), entry);
                    }
                }
            }
        }

        let (mut subset, mut last, cost) = best_full.ok_or(StrategyError::InsufficientOrders {
            required: COMPANIONS,
            available: pool.len(),
        })?;
        debug!(
            strategy = self.name(),
            states = memo.len(),
            cost,
            "subset table filled"
        );

        // Walk back through the previous-order links
        let mut path = Vec::with_capacity(COMPANIONS + 1);
        while subset.len() > 1 {
            let Some(entry) = memo.get(&(subset.clone(), last)) else {
                break;
            };
            path.push(by_id[&last].clone());
            subset.retain(|id| *id != last);
            last = entry.previous;
        }
        path.push(mandatory.clone());
        path.reverse();

        Ok((Batch::new(path, mandatory)?, cost))
    }
}

impl OptimizationStrategy for SubsetDynamic {
    fn name(&self) -> &'static str {
        match self.criterion {
            Criterion::Discount => "dynamic_discount",
            Criterion::Time => "dynamic_time",
            Criterion::Distance => "dynamic_distance",
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
        self.optimize_with_cost(pool, mandatory, oracle)
            .map(|(batch, _)| batch)
    }
}
