mod hash_embedding;

pub use hash_embedding::*;
