//! HTTP surface: Prometheus scrape endpoint, health probe and JSON counters.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod server;
