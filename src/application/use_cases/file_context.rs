use std::sync::Arc;

use serde::Serialize;

use crate::application::VectorStore;
use crate::domain::{clean_relative, Chunk, DomainError, ScanFilter};

/// Everything the index knows about one file: its chunks in order plus
/// aggregated structure.
#[derive(Debug, Clone, Serialize)]
pub struct FileContext {
    pub file: String,
    pub chunks: Vec<Chunk>,
    pub symbols: Vec<String>,
    pub imports: Vec<String>,
    pub exports: Vec<String>,
    pub avg_complexity: f64,
    pub max_complexity: u32,
}

pub struct FileContextUseCase {
    store: Arc<dyn VectorStore>,
}

impl FileContextUseCase {
    pub fn new(store: Arc<dyn VectorStore>) -> Self {
        Self { store }
    }

    pub async fn execute(&self, path: &str) -> Result<FileContext, DomainError> {
        let file = clean_relative(path);
        let mut chunks = self
            .store
            .scan_with_filter(&ScanFilter::for_file(&file))
            .await?;
        chunks.sort_by_key(|c| (c.start_line(), c.end_line()));

        let mut symbols = Vec::new();
        let mut imports = Vec::new();
        let mut exports = Vec::new();
        for chunk in &chunks {
            if let Some(name) = chunk.symbol_name() {
                if !symbols.contains(&name.to_string()) {
                    symbols.push(name.to_string());
                }
            }
            for import in chunk.imports().unwrap_or_default() {
                if !imports.contains(import) {
                    imports.push(import.clone());
                }
            }
            for export in chunk.exports().unwrap_or_default() {
                if !exports.contains(export) {
                    exports.push(export.clone());
                }
            }
        }

        let complexities: Vec<u32> = chunks.iter().map(|c| c.complexity()).collect();
        let avg_complexity = if complexities.is_empty() {
            0.0
        } else {
            complexities.iter().map(|&c| c as u64).sum::<u64>() as f64 / complexities.len() as f64
        };
        let max_complexity = complexities.iter().copied().max().unwrap_or(0);

        Ok(FileContext {
            file,
            chunks,
            symbols,
            imports,
            exports,
            avg_complexity,
            max_complexity,
        })
    }
}
