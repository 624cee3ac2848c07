// Pending order pool shared by the couriers

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::algorithms::arbiter::Arbiter;
use crate::error::SelectionError;
use crate::models::{Grade, Order, OrderSet};
use crate::oracle::TravelCostOracle;

/// Hands out one batch per call, built around the most urgent pending order
///
/// The pool lock is held for the whole selection so two couriers never
/// receive the same order.
pub struct Dispatcher {
    arbiter: Arc<Arbiter>,
    pending: Mutex<OrderSet>,
}

impl Dispatcher {
    pub fn new(arbiter: Arc<Arbiter>) -> Self {
        Self {
            arbiter,
            pending: Mutex::new(OrderSet::new()),
        }
    }

    pub fn submit(&self, order: Order) {
        debug!(order = order.id(), "order submitted");
        self.pending.lock().insert(order);
    }

    pub fn submit_all(&self, orders: impl IntoIterator<Item = Order>) {
        self.pending.lock().extend(orders);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Critical order with the largest urgency
    ///
    /// With `drain` set, the most urgent order is returned even when none is
    /// critical yet, so the pool can be emptied.
    pub fn most_critical(
        pool: &OrderSet,
        oracle: &TravelCostOracle,
        now: DateTime<Utc>,
        drain: bool,
    ) -> Option<Order> {
        pool.iter()
            .map(|order| (order.urgency(oracle, now), order))
            .filter(|(_, order)| drain || order.is_critical(oracle, now))
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, order)| order.clone())
    }

    /// Next batch to deliver, or `None` when no order needs a courier yet
    pub fn next_batch(
        &self,
        now: DateTime<Utc>,
        drain: bool,
    ) -> Result<Option<(Vec<Order>, Grade)>, SelectionError> {
        let mut pool = self.pending.lock();
        let Some(mandatory) = Self::most_critical(&pool, self.arbiter.oracle(), now, drain) else {
            return Ok(None);
        };

        let mandatory_id = mandatory.id();
        let (batch, grade) = self.arbiter.select_batch(&mut pool, mandatory)?;
        info!(
            mandatory = mandatory_id,
            size = batch.len(),
            grade,
            remaining = pool.len(),
            "batch dispatched"
        );
        Ok(Some((batch, grade)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizerConfig;
    use crate::models::{GeoPoint, OrderId};
    use chrono::Duration;

    fn depot() -> GeoPoint {
        GeoPoint::new(48.7117294, 2.165678)
    }

    fn order(id: OrderId, lat: f64, lon: f64, age_minutes: i64, now: DateTime<Utc>) -> Order {
        Order::new(id, GeoPoint::new(lat, lon), now - Duration::minutes(age_minutes))
    }

    fn dispatcher() -> Dispatcher {
        let oracle = Arc::new(TravelCostOracle::geometric(depot()));
        let arbiter = Arc::new(Arbiter::new(oracle, &OptimizerConfig::default()));
        Dispatcher::new(arbiter)
    }

    #[test]
    fn test_most_critical_picks_largest_urgency() {
        let now = Utc::now();
        let oracle = TravelCostOracle::geometric(depot());
        let pool: OrderSet = vec![
            order(1, 48.712, 2.166, 29, now),
            order(2, 48.712, 2.166, 40, now),
            order(3, 48.712, 2.166, 1, now),
        ]
        .into_iter()
        .collect();

        let picked = Dispatcher::most_critical(&pool, &oracle, now, false).unwrap();
        assert_eq!(picked.id(), 2);
    }

    #[test]
    fn test_nothing_critical_waits_unless_draining() {
        let now = Utc::now();
        let oracle = TravelCostOracle::geometric(depot());
        let pool: OrderSet = vec![order(1, 48.712, 2.166, 2, now)].into_iter().collect();

        assert!(Dispatcher::most_critical(&pool, &oracle, now, false).is_none());
        assert_eq!(
            Dispatcher::most_critical(&pool, &oracle, now, true).map(|o| o.id()),
            Some(1)
        );
    }

    #[test]
    fn test_next_batch_removes_delivered_orders() {
        let now = Utc::now();
        let dispatcher = dispatcher();
        dispatcher.submit_all(vec![
            order(1, 48.70, 2.10, 45, now),
            order(2, 48.70, 2.11, 3, now),
            order(3, 48.70, 2.12, 3, now),
        ]);

        let (batch, _) = dispatcher.next_batch(now, false).unwrap().unwrap();
        assert_eq!(batch[0].id(), 1);
        assert_eq!(batch.len(), 3);
        assert_eq!(dispatcher.pending_len(), 0);
        assert!(dispatcher.next_batch(now, true).unwrap().is_none());
    }
}
