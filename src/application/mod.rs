//! # Application Layer
//!
//! Collaborator ports and the use cases orchestrating them.

pub mod interfaces;
pub mod use_cases;

pub use interfaces::*;
pub use use_cases::*;
