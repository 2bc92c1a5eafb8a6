//! # Lien
//!
//! A local code-intelligence engine: it maintains a searchable, structured
//! representation of a codebase (source files broken into chunks carrying
//! symbols, imports, exports, and complexity) and answers semantic search
//! and dependency/risk queries over it.
//!
//! ## Architecture
//!
//! - `domain`: core models (chunks, manifest, change sets, risk), the
//!   error type, and pure path services
//! - `application`: collaborator ports and use cases (indexer, change
//!   detector, dependency analyzer, search)
//! - `connector`: adapters (tree-sitter chunking, scanner, embeddings,
//!   in-memory store, git probe)

pub mod application;
pub mod config;
pub mod connector;
pub mod domain;

// Re-export commonly used types
pub use application::*;
pub use config::Config;
pub use connector::*;
pub use domain::*;
