//! # API Shared
//!
//! Shared utilities and definitions for the NAMASTE APIs.
//!
//! Contains:
//! - Request/response body types (`dto` module), documented for OpenAPI
//! - Shared services like `HealthService`
//! - Authentication utilities
//!
//! Used by `api-rest` and the CLI for common functionality.

pub mod auth;
pub mod dto;
pub mod health;

pub use auth::{validate_api_key, AuthError, API_KEY_HEADER, PRACTITIONER_REF_HEADER};
pub use dto::*;
pub use health::HealthService;
