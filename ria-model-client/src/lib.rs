//! C6: uniform async request/response to an external model gateway, with
//! retries, backoff, a per-model circuit breaker, and cancellation.

pub mod client;
pub mod error;
pub mod resilience;
pub mod types;

pub use client::{HttpModelClient, ModelClient};
pub use error::ModelError;
pub use resilience::{backoff_delay, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, RetryConfig};
pub use types::{Message, ModelResponse, QueryParams, Role};
