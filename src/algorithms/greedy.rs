// Nearest-neighbor batch construction

use tracing::debug;

use crate::algorithms::{check_pool, Criterion, OptimizationStrategy, COMPANIONS};
use crate::error::StrategyError;
use crate::models::{Batch, Order};
use crate::oracle::TravelCostOracle;

/// Starts at the mandatory order and keeps driving to the closest pending order
pub struct Greedy {
    criterion: Criterion,
}

impl Greedy {
    /// Closest by travel time
    pub fn time_oriented() -> Self {
        Self {
            criterion: Criterion::Time,
        }
    }

    /// Closest by driving distance
    pub fn distance_oriented() -> Self {
        Self {
            criterion: Criterion::Distance,
        }
    }
}

impl OptimizationStrategy for Greedy {
    fn name(&self) -> &'static str {
        match self.criterion {
            Criterion::Distance => "greedy_distance",
            Criterion::Time | Criterion::Discount => "greedy_time",
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
        check_pool(pool, mandatory, COMPANIONS)?;

        let mut selected = Vec::with_capacity(COMPANIONS + 1);
        selected.push(mandatory.clone());
        let mut remaining = pool.to_vec();

        for _ in 0..COMPANIONS {
            let current = selected[selected.len() - 1].location();

            let mut closest: Option<(usize, f64)> = None;
            for (index, candidate) in remaining.iter().enumerate() {
                let cost = self.criterion.leg_cost(oracle, current, candidate.location());
                if closest.map_or(true, |(_, best)| cost < best) {
                    closest = Some((index, cost));
                }
            }

            // Pool size was checked, a candidate always exists
            if let Some((index, cost)) = closest {
                let next = remaining.remove(index);
                debug!(strategy = self.name(), order = next.id(), cost, "picked closest order");
                selected.push(next);
            }
        }

        Batch::new(selected, mandatory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GeoPoint, OrderId};
    use chrono::Utc;

    fn order(id: OrderId, lat: f64, lon: f64) -> Order {
        Order::new(id, GeoPoint::new(lat, lon), Utc::now())
    }

    #[test]
    fn test_greedy_requires_four_orders() {
        let oracle = TravelCostOracle::geometric(GeoPoint::new(48.7117, 2.1657));
        let mandatory = order(0, 48.71, 2.16);
        let pool = vec![order(1, 48.72, 2.17), order(2, 48.73, 2.18), order(3, 48.74, 2.19)];

        assert_eq!(
            Greedy::time_oriented().optimize(&pool, &mandatory, &oracle),
            Err(StrategyError::InsufficientOrders {
                required: 4,
                available: 3
            })
        );
    }

    #[test]
    fn test_greedy_follows_the_chain() {
        let oracle = TravelCostOracle::geometric(GeoPoint::new(48.7117, 2.1657));
        let mandatory = order(0, 48.70, 2.10);
        // Each stop is nearest to the previous one; the decoy sits far away
        let pool = vec![
            order(4, 48.70, 2.14),
            order(9, 48.95, 2.50),
            order(2, 48.70, 2.12),
            order(1, 48.70, 2.11),
            order(3, 48.70, 2.13),
        ];

        for strategy in [Greedy::time_oriented(), Greedy::distance_oriented()] {
            let batch = strategy.optimize(&pool, &mandatory, &oracle).unwrap();
            assert_eq!(batch.ids(), vec![0, 1, 2, 3, 4]);
        }
    }
}
