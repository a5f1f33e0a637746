//! # API Shared
//!
//! Shared utilities and definitions for the PV save API.
//!
//! Contains:
//! - Wire types (`types` module) with OpenAPI schemas
//! - Shared services like `HealthService`
//! - Shared-secret token authorisation
//!
//! Used by `api-rest`.

pub mod auth;
pub mod health;
pub mod types;

pub use auth::{authorise, AuthError, TOKEN_HEADER};
pub use health::HealthService;
pub use types::*;
