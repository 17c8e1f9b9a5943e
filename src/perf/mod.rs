//! Performance envelope: result cache, circuit breaker, batch queue, and
//! rate limiter

pub mod batch;
pub mod breaker;
pub mod cache;
pub mod rate_limit;

pub use batch::BatchQueue;
pub use breaker::{BreakerState, CircuitBreakerRegistry};
pub use cache::TtlLruCache;
pub use rate_limit::RateLimiter;
