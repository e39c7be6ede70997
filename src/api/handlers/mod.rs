//! HTTP handlers for API endpoints.

pub mod counters;
pub mod health;
pub mod metrics;
