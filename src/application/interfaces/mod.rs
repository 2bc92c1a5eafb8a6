mod chunker_service;
mod embedding_client;
mod vcs_probe;
mod vector_store;

pub use chunker_service::*;
pub use embedding_client::*;
pub use vcs_probe::*;
pub use vector_store::*;
