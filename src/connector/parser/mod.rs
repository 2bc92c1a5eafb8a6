//! AST traversal, chunking, and complexity metrics.

pub mod chunker;
pub mod dispatch;
pub mod metrics;
pub mod symbols;
pub mod template;
pub mod traverser;

pub use chunker::{Chunker, ChunkerOptions, TenantTags};
pub use dispatch::TreeSitterChunker;
pub use metrics::{compute_metrics, Metrics};
pub use symbols::{extract_file_graph, extract_symbol_details, FileGraph, SymbolDetails};
pub use template::TemplateChunker;
pub use traverser::{Declaration, Traverser};
