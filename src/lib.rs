pub mod config;
pub mod constants;
pub mod convert;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod storage;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

// Persisted row shapes
pub mod domain;

pub mod jobs;
pub mod pipeline;
