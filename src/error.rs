// Error types shared across the optimizer

use thiserror::Error;

use crate::models::OrderId;

/// Why a strategy could not produce a batch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyError {
    #[error("insufficient orders: need at least {required}, got {available}")]
    InsufficientOrders { required: usize, available: usize },

    #[error("mandatory order {0} must not be part of the candidate pool")]
    MandatoryInPool(OrderId),

    #[error("invalid batch: {0}")]
    InvalidBatch(String),
}

/// Why the arbiter returned no batch for this cycle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectionError {
    #[error("mandatory order {0} is not in the pending pool")]
    MandatoryMissing(OrderId),

    #[error("no strategy produced a batch for mandatory order {mandatory}: {reasons:?}")]
    NoCandidate {
        mandatory: OrderId,
        reasons: Vec<String>,
    },
}

/// Outcome of a failed routing request
#[derive(Debug, Error)]
pub enum RoutingError {
    #[error("routing provider rate limit exceeded")]
    RateLimited,

    #[error("routing provider answered with status {0}")]
    Status(u16),

    #[error("routing request failed: {0}")]
    Transport(String),

    #[error("malformed routing response: {0}")]
    Malformed(String),
}

/// Configuration could not be loaded
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}
