// Route models for delivery batches and their travel metrics

use std::collections::HashSet;

use crate::error::StrategyError;
use crate::models::{GeoPoint, Kilometers, Minutes, Order, OrderId, BATCH_SIZE, ORDER_MAX_WAIT};
use crate::oracle::TravelCostOracle;

/// A route-ordered group of orders delivered in one trip
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    orders: Vec<Order>,
}

impl Batch {
    /// Validates a route against the batch invariants: at most
    /// `BATCH_SIZE` orders, no duplicate ids, mandatory order present
    pub fn new(orders: Vec<Order>, mandatory: &Order) -> Result<Self, StrategyError> {
        if orders.len() > BATCH_SIZE {
            return Err(StrategyError::InvalidBatch(format!(
                "{} orders exceed the batch size of {}",
                orders.len(),
                BATCH_SIZE
            )));
        }

        let mut seen: HashSet<OrderId> = HashSet::with_capacity(orders.len());
        if let Some(duplicate) = orders.iter().find(|order| !seen.insert(order.id())) {
            return Err(StrategyError::InvalidBatch(format!(
                "order {} appears twice",
                duplicate.id()
            )));
        }

        if !seen.contains(&mandatory.id()) {
            return Err(StrategyError::InvalidBatch(format!(
                "mandatory order {} is missing",
                mandatory.id()
            )));
        }

        Ok(Self { orders })
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn ids(&self) -> Vec<OrderId> {
        self.orders.iter().map(Order::id).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn into_orders(self) -> Vec<Order> {
        self.orders
    }
}

/// Aggregated travel metrics of a route starting at the depot
///
/// A route is walked depot -> first -> ... -> last; there is no return leg.
#[derive(Clone, Copy)]
pub struct RouteMetrics<'a> {
    oracle: &'a TravelCostOracle,
}

impl<'a> RouteMetrics<'a> {
    pub fn new(oracle: &'a TravelCostOracle) -> Self {
        Self { oracle }
    }

    /// Travel time of every leg, the depot leg first
    pub fn leg_times(&self, route: &[Order]) -> Vec<Minutes> {
        self.stops(route)
            .windows(2)
            .map(|leg| self.oracle.time(leg[0], leg[1]))
            .collect()
    }

    /// Total delivery time of the route
    pub fn total_time(&self, route: &[Order]) -> Minutes {
        self.leg_times(route).iter().sum()
    }

    /// Total driving distance of the route, depot leg included
    pub fn total_distance(&self, route: &[Order]) -> Kilometers {
        self.stops(route)
            .windows(2)
            .map(|leg| self.oracle.distance(leg[0], leg[1]))
            .sum()
    }

    /// Distance between consecutive orders only, ignoring the depot leg
    pub fn chain_distance(&self, route: &[Order]) -> Kilometers {
        route
            .windows(2)
            .map(|leg| self.oracle.distance(leg[0].location(), leg[1].location()))
            .sum()
    }

    /// Number of legs long enough to owe the customer a discount
    pub fn discount_count(&self, route: &[Order]) -> usize {
        self.leg_times(route)
            .into_iter()
            .filter(|time| *time >= ORDER_MAX_WAIT)
            .count()
    }

    /// Whether the leg from `from` to `to` is discount-eligible
    pub fn is_discount_leg(&self, from: GeoPoint, to: GeoPoint) -> bool {
        self.oracle.time(from, to) >= ORDER_MAX_WAIT
    }

    fn stops(&self, route: &[Order]) -> Vec<GeoPoint> {
        std::iter::once(self.oracle.depot())
            .chain(route.iter().map(Order::location))
            .collect()
    }
}
