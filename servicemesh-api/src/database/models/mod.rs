//! Database models for servicemesh-api.
//!
//! These models map directly to the database schema.

pub mod credential;

pub use credential::*;
