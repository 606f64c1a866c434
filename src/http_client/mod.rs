//! Retrying HTTP clients shared by the HTTP-based notifiers.

mod client;
mod pool;

pub use client::create_retryable_http_client;
pub use pool::{HttpClientPool, HttpClientPoolError};
