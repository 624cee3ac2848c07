// Utility modules: geometry, caching, routing and order generation

pub mod distance;
pub mod memo_cache;
pub mod order_gen;
pub mod routing;
