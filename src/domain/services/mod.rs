//! Pure domain services: path canonicalization and fuzzy path matching.

mod canonical_path;
mod path_match;

pub use canonical_path::*;
pub use path_match::*;
