//! Application configuration.
//!
//! Everything is read from the environment once at startup into an [`AppConfig`]
//! that is passed explicitly to the components that need it.

mod settings;

pub use settings::{
    AppConfig, CorsOrigins, DEFAULT_API_PREFIX, DEFAULT_DATABASE_URL, SeedCredential,
};
