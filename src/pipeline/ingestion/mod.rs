// Outbound explorer access: request spacing and retrying client

pub mod client;
pub mod rate_limiter;

pub use client::{ResilientClient, RetryPolicy};
pub use rate_limiter::RateLimiter;
