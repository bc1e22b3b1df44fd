//! Resilient remote provisioning client.
//!
//! Wire types, circuit breaker, retry policy, and the HTTP client that
//! composes them.

mod breaker;
mod client;
mod retry;
mod types;

pub use breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use client::ProvisioningClient;
pub use retry::{RetryConfig, RetryPolicy};
pub use types::{RpcRequest, RpcResponse, PROTOCOL_VERSION};
