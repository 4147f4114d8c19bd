//! Service credential management.
//!
//! # Architecture
//!
//! - [`ServiceType`]: which upstream tool a credential targets
//! - [`Credential`]: validated endpoint plus exactly one [`AuthScheme`]
//! - [`CredentialService`]: CRUD, lookup and startup seeding over the store

mod service;
mod types;
pub mod validation;

pub use service::CredentialService;
pub use types::{
    AuthKind, AuthScheme, Credential, CredentialPatch, NewCredential, ServiceType,
};
