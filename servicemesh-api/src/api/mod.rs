//! REST API server module.
//!
//! Provides HTTP endpoints for managing service credentials and for reaching
//! Uptime Kuma, Prometheus, Grafana and Proxmox VE through one surface.

pub mod error;
pub mod extract;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod routes;
pub mod server;

pub use server::{ApiServer, ApiServerConfig, AppState};
