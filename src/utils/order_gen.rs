// Random order generation inside the delivery area

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::models::{GeoPoint, Order, OrderId};

/// Latitude range of the delivery area
pub const LATITUDE_RANGE: (f64, f64) = (48.6199, 48.80406);

/// Longitude range of the delivery area
pub const LONGITUDE_RANGE: (f64, f64) = (1.98761, 2.255694);

/// Orders are backdated by up to this many minutes
pub const MAX_AGE_MINUTES: i64 = 14;

/// Produces orders at random points of the delivery area with sequential ids
pub struct OrderGenerator {
    rng: StdRng,
    next_id: OrderId,
}

impl OrderGenerator {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng, next_id: 1 }
    }

    pub fn random_location(&mut self) -> GeoPoint {
        GeoPoint::new(
            self.rng.gen_range(LATITUDE_RANGE.0..=LATITUDE_RANGE.1),
            self.rng.gen_range(LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1),
        )
    }

    /// One order created between 0 and 14 minutes before `now`
    pub fn next_order(&mut self, now: DateTime<Utc>) -> Order {
        let id = self.next_id;
        self.next_id += 1;

        let location = self.random_location();
        let age = Duration::minutes(self.rng.gen_range(0..=MAX_AGE_MINUTES));
        Order::new(id, location, now - age)
    }

    pub fn generate(&mut self, count: usize, now: DateTime<Utc>) -> Vec<Order> {
        (0..count).map(|_| self.next_order(now)).collect()
    }
}
