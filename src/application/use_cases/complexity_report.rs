use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::application::VectorStore;
use crate::config::ComplexityThresholds;
use crate::domain::{DomainError, ScanFilter};

/// One symbol over a configured threshold.
#[derive(Debug, Clone, Serialize)]
pub struct ComplexityViolation {
    pub file: String,
    pub symbol: Option<String>,
    pub start_line: u32,
    pub metric: &'static str,
    pub value: f64,
    pub threshold: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplexityReport {
    pub files_scanned: usize,
    pub violations_by_file: BTreeMap<String, Vec<ComplexityViolation>>,
}

impl ComplexityReport {
    pub fn total_violations(&self) -> usize {
        self.violations_by_file.values().map(Vec::len).sum()
    }
}

/// Scans indexed chunks and reports symbols whose metrics exceed the
/// configured thresholds.
pub struct ComplexityReportUseCase {
    store: Arc<dyn VectorStore>,
    thresholds: ComplexityThresholds,
}

impl ComplexityReportUseCase {
    pub fn new(store: Arc<dyn VectorStore>, thresholds: ComplexityThresholds) -> Self {
        Self { store, thresholds }
    }

    pub async fn execute(&self, filter: &ScanFilter) -> Result<ComplexityReport, DomainError> {
        let chunks = self.store.scan_with_filter(filter).await?;

        let mut report = ComplexityReport::default();
        let mut files = std::collections::HashSet::new();

        for chunk in &chunks {
            files.insert(chunk.file().to_string());

            let mut push = |metric: &'static str, value: f64, threshold: f64| {
                if value > threshold {
                    report
                        .violations_by_file
                        .entry(chunk.file().to_string())
                        .or_default()
                        .push(ComplexityViolation {
                            file: chunk.file().to_string(),
                            symbol: chunk.symbol_name().map(String::from),
                            start_line: chunk.start_line(),
                            metric,
                            value,
                            threshold,
                        });
                }
            };

            push(
                "cyclomatic",
                chunk.complexity() as f64,
                self.thresholds.cyclomatic as f64,
            );
            push(
                "cognitive",
                chunk.cognitive_complexity() as f64,
                self.thresholds.cognitive as f64,
            );
            push(
                "halstead_effort",
                chunk.halstead().effort,
                self.thresholds.halstead_effort,
            );
        }

        report.files_scanned = files.len();
        Ok(report)
    }
}
