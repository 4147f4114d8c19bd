//! servicemesh-api library crate.
//!
//! A credential store for Uptime Kuma, Prometheus, Grafana and Proxmox VE,
//! plus one adapter per service behind a single REST surface.

pub mod api;
pub mod config;
pub mod credentials;
pub mod database;
pub mod error;
pub mod integrations;
pub mod logging;

pub use error::{Error, Result};
