// Public modules
pub mod algorithms;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod oracle;
pub mod utils;

// Re-exports for convenience
pub use algorithms::arbiter::{Arbiter, Selection, Tier, TieBreakPolicy};
pub use algorithms::grader::{Assessment, Grader};
pub use algorithms::OptimizationStrategy;
pub use config::OptimizerConfig;
pub use dispatch::Dispatcher;
pub use error::{ConfigError, RoutingError, SelectionError, StrategyError};
pub use models::{Batch, GeoPoint, Order, OrderSet};
pub use oracle::TravelCostOracle;
