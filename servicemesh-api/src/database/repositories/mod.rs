//! Repository layer for database access.
//!
//! This module implements the Repository Pattern to abstract all database interactions.

pub mod credential;

pub use credential::*;
