//! VRM API collaborator.
//!
//! Thin HTTP layer over the remote energy-monitoring cloud API: environment
//! configuration, a JSON client with token-header injection and a request
//! timeout, and typed errors that carry the endpoint path plus a truncated
//! response snippet for diagnosis.
//!
//! Everything above this crate treats it as a single capability: fetch a
//! path, get a JSON value or a typed failure.

pub mod client;
pub mod config;
pub mod error;

pub use client::VrmClient;
pub use config::VrmConfig;
pub use error::{Result, VrmError};
