// Order model representing a pending delivery request

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::models::{GeoPoint, Minutes, OrderId, CRITICAL_THRESHOLD};
use crate::oracle::TravelCostOracle;

/// A delivery request placed by a customer
///
/// Two orders are the same order when their ids match, whatever their
/// location or timestamp. Subset and permutation bookkeeping in the
/// strategies relies on this.
#[derive(Debug, Clone)]
pub struct Order {
    id: OrderId,
    location: GeoPoint,
    created_at: DateTime<Utc>,
}

impl Order {
    /// Creates a new order
    pub fn new(id: OrderId, location: GeoPoint, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            location,
            created_at,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn location(&self) -> GeoPoint {
        self.location
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Moves the creation timestamp (used to age orders)
    pub fn set_created_at(&mut self, created_at: DateTime<Utc>) {
        self.created_at = created_at;
    }

    /// Minutes elapsed between creation and `now`
    pub fn minutes_waiting(&self, now: DateTime<Utc>) -> Minutes {
        (now - self.created_at).num_seconds() as f64 / 60.0
    }

    /// Waiting time plus the travel time from the depot
    pub fn urgency(&self, oracle: &TravelCostOracle, now: DateTime<Utc>) -> Minutes {
        self.minutes_waiting(now) + oracle.time(oracle.depot(), self.location)
    }

    /// Checks whether the order can no longer wait for a later trip
    pub fn is_critical(&self, oracle: &TravelCostOracle, now: DateTime<Utc>) -> bool {
        self.urgency(oracle, now) > CRITICAL_THRESHOLD
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Order {}

impl Hash for Order {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Order {} at {}", self.id, self.location)
    }
}

/// Pending orders keyed by id
///
/// Iteration follows ascending id so strategies see the pool in a stable order.
#[derive(Debug, Clone, Default)]
pub struct OrderSet {
    orders: BTreeMap<OrderId, Order>,
}

impl OrderSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an order, replacing any order with the same id
    pub fn insert(&mut self, order: Order) -> Option<Order> {
        self.orders.insert(order.id, order)
    }

    pub fn remove(&mut self, id: OrderId) -> Option<Order> {
        self.orders.remove(&id)
    }

    pub fn contains(&self, id: OrderId) -> bool {
        self.orders.contains_key(&id)
    }

    pub fn get(&self, id: OrderId) -> Option<&Order> {
        self.orders.get(&id)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Order> {
        self.orders.values()
    }

    /// Snapshot of the pool as a plain vector
    pub fn to_vec(&self) -> Vec<Order> {
        self.orders.values().cloned().collect()
    }
}

impl FromIterator<Order> for OrderSet {
    fn from_iter<I: IntoIterator<Item = Order>>(iter: I) -> Self {
        let mut set = OrderSet::new();
        for order in iter {
            set.insert(order);
        }
        set
    }
}

impl Extend<Order> for OrderSet {
    fn extend<I: IntoIterator<Item = Order>>(&mut self, iter: I) {
        for order in iter {
            self.insert(order);
        }
    }
}
