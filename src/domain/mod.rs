//! # Domain Layer
//!
//! Core models, the error type, and pure services (path canonicalization
//! and matching). This layer is independent of external infrastructure.

pub mod error;
pub mod models;
pub mod services;

pub use error::*;
pub use models::*;
pub use services::*;
