// Models module - exports all model types

mod location;
mod order;
mod route;

// Re-export model types
pub use self::location::GeoPoint;
pub use self::order::{Order, OrderSet};
pub use self::route::{Batch, RouteMetrics};

// Common type aliases for improved code readability
pub type OrderId = u64;
pub type Minutes = f64;
pub type Kilometers = f64;
pub type Grade = i32;

/// Maximum number of orders a courier carries in one trip
pub const BATCH_SIZE: usize = 5;

/// Leg duration (minutes) from which the customer is owed a discount
pub const ORDER_MAX_WAIT: Minutes = 30.0;

/// Waiting + travel time (minutes) past which an order becomes critical
pub const CRITICAL_THRESHOLD: Minutes = 30.0;
