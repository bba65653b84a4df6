//! Fault tolerance around agent calls: circuit breaking, retry with
//! backoff, error classification and fallback substitution.

pub mod circuit;
pub mod classify;
pub mod invoker;
pub mod retry;

pub use circuit::{
    CircuitBreaker, CircuitBreakerConfig, CircuitPermit, CircuitSnapshot, CircuitState,
    CircuitStateStore,
};
pub use classify::classify;
pub use invoker::FaultTolerantInvoker;
pub use retry::RetryPolicy;
