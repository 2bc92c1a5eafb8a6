use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;
use tracing::debug;

use crate::domain::{
    clean_relative, is_test_file, normalize_target, paths_match, Chunk, RiskLevel,
};

/// Barrel re-exports are followed at most this many hops.
const MAX_REEXPORT_DEPTH: usize = 3;

/// How many high-complexity dependents the report surfaces.
const TOP_COMPLEX_DEPENDENTS: usize = 5;

/// Per-file aggregate over the chunks that depend on the target.
#[derive(Debug, Clone, Serialize)]
pub struct DependentFile {
    pub path: String,
    pub is_test: bool,
    pub chunks_with_complexity: u32,
    pub avg_complexity: f64,
    pub max_complexity: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ComplexitySummary {
    pub average: f64,
    pub maximum: u32,
}

/// Who depends on a file, directly or through barrel re-exports, and how
/// risky a change to it would be.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub target: String,
    pub dependent_count: usize,
    pub dependents: Vec<DependentFile>,
    /// Files whose max complexity exceeds 10, most complex first, capped.
    pub high_complexity_dependents: Vec<String>,
    pub complexity: ComplexitySummary,
    pub risk_level: RiskLevel,
}

/// Stateless dependency and risk analysis over a chunk set. Builds an
/// inverted import index, matches the target under the fuzzy path rules,
/// follows barrel re-exports with bounded BFS, and scores risk from
/// dependent count and aggregated complexity.
pub struct DependencyAnalyzer;

impl DependencyAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, chunks: &[Chunk], target: &str) -> DependencyReport {
        let target_path = clean_relative(target);

        // Inverted index: normalized import target -> importing chunks.
        let mut import_index: HashMap<String, Vec<&Chunk>> = HashMap::new();
        for chunk in chunks {
            for import in chunk_import_targets(chunk) {
                import_index.entry(import).or_default().push(chunk);
            }
        }

        // Direct dependents: entries whose key matches the target.
        let mut dependent_chunks: Vec<&Chunk> = Vec::new();
        let mut seen_keys: HashSet<(String, u32, u32)> = HashSet::new();
        for (key, importers) in &import_index {
            if !paths_match(key, &target_path) {
                continue;
            }
            for chunk in importers {
                if chunk.file() == target_path {
                    continue;
                }
                if seen_keys.insert(owned_key(chunk)) {
                    dependent_chunks.push(chunk);
                }
            }
        }

        // Transitive dependents through barrel re-exporters, depth-bounded
        // BFS with the visited set seeded by the target and the direct
        // dependents to break cycles.
        let mut visited_files: HashSet<String> = HashSet::new();
        visited_files.insert(target_path.clone());
        for chunk in &dependent_chunks {
            visited_files.insert(chunk.file().to_string());
        }

        let mut queue: VecDeque<(String, usize)> = dependent_chunks
            .iter()
            .filter(|c| c.is_re_exporter())
            .map(|c| (c.file().to_string(), 1))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();

        while let Some((barrel_file, depth)) = queue.pop_front() {
            if depth >= MAX_REEXPORT_DEPTH {
                continue;
            }
            debug!("Following barrel re-exports of {} at depth {}", barrel_file, depth);

            for (key, importers) in &import_index {
                if !paths_match(key, &barrel_file) {
                    continue;
                }
                for chunk in importers {
                    let file = chunk.file().to_string();
                    if file == barrel_file || file == target_path {
                        continue;
                    }
                    if seen_keys.insert(owned_key(chunk)) {
                        dependent_chunks.push(chunk);
                    }
                    if visited_files.insert(file.clone()) && chunk.is_re_exporter() {
                        queue.push_back((file, depth + 1));
                    }
                }
            }
        }

        self.build_report(target_path, &dependent_chunks)
    }

    fn build_report(&self, target: String, dependent_chunks: &[&Chunk]) -> DependencyReport {
        // Group by canonical file path for per-file aggregates.
        let mut by_file: HashMap<&str, Vec<&Chunk>> = HashMap::new();
        for chunk in dependent_chunks {
            by_file.entry(chunk.file()).or_default().push(chunk);
        }

        let mut dependents: Vec<DependentFile> = by_file
            .iter()
            .map(|(path, chunks)| {
                let complexities: Vec<u32> = chunks.iter().map(|c| c.complexity()).collect();
                let total: u64 = complexities.iter().map(|&c| c as u64).sum();
                DependentFile {
                    path: path.to_string(),
                    is_test: is_test_file(path),
                    chunks_with_complexity: complexities.len() as u32,
                    avg_complexity: total as f64 / complexities.len().max(1) as f64,
                    max_complexity: complexities.iter().copied().max().unwrap_or(0),
                }
            })
            .collect();
        dependents.sort_by(|a, b| a.path.cmp(&b.path));

        let all_complexities: Vec<u32> =
            dependent_chunks.iter().map(|c| c.complexity()).collect();
        let complexity = if all_complexities.is_empty() {
            ComplexitySummary::default()
        } else {
            ComplexitySummary {
                average: all_complexities.iter().map(|&c| c as u64).sum::<u64>() as f64
                    / all_complexities.len() as f64,
                maximum: all_complexities.iter().copied().max().unwrap_or(0),
            }
        };

        let mut complex_files: Vec<&DependentFile> = dependents
            .iter()
            .filter(|d| d.max_complexity > 10)
            .collect();
        complex_files.sort_by(|a, b| b.max_complexity.cmp(&a.max_complexity));
        let high_complexity_dependents: Vec<String> = complex_files
            .into_iter()
            .take(TOP_COMPLEX_DEPENDENTS)
            .map(|d| d.path.clone())
            .collect();

        let dependent_count = dependents.len();
        let count_risk = RiskLevel::from_dependent_count(dependent_count);
        let complexity_risk =
            RiskLevel::from_complexity(complexity.average, complexity.maximum);
        let risk_level = count_risk.max(complexity_risk);

        DependencyReport {
            target,
            dependent_count,
            dependents,
            high_complexity_dependents,
            complexity,
            risk_level,
        }
    }
}

impl Default for DependencyAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

fn owned_key(chunk: &Chunk) -> (String, u32, u32) {
    (chunk.file().to_string(), chunk.start_line(), chunk.end_line())
}

/// Normalized import targets of a chunk: the imports list plus the keys of
/// the imported-symbols map.
fn chunk_import_targets(chunk: &Chunk) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();
    if let Some(imports) = chunk.imports() {
        for import in imports {
            let normalized = normalize_target(import);
            if !normalized.is_empty() && !targets.contains(&normalized) {
                targets.push(normalized);
            }
        }
    }
    if let Some(imported) = chunk.imported_symbols() {
        for key in imported.keys() {
            let normalized = normalize_target(key);
            if !normalized.is_empty() && !targets.contains(&normalized) {
                targets.push(normalized);
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChunkType, Language};

    fn chunk(file: &str, start: u32) -> Chunk {
        Chunk::new(
            file.to_string(),
            format!("content at {}", start),
            start,
            start + 1,
            Language::TypeScript,
            ChunkType::Block,
        )
    }

    fn importer(file: &str, target: &str) -> Chunk {
        chunk(file, 1).with_imports(vec![target.to_string()])
    }

    #[test]
    fn test_direct_dependents() {
        let chunks = vec![
            chunk("src/auth.ts", 1).with_exports(vec!["AuthService".to_string()]),
            importer("src/handler.ts", "./auth"),
            importer("src/unrelated.ts", "./config"),
        ];

        let report = DependencyAnalyzer::new().analyze(&chunks, "src/auth.ts");
        assert_eq!(report.dependent_count, 1);
        assert_eq!(report.dependents[0].path, "src/handler.ts");
        assert_eq!(report.risk_level, RiskLevel::Low);
    }

    #[test]
    fn test_barrel_re_export_discovery() {
        let chunks = vec![
            chunk("src/auth.ts", 1).with_exports(vec!["AuthService".to_string()]),
            // Barrel: imports from ./auth and re-exports.
            chunk("src/index.ts", 1)
                .with_imports(vec!["./auth".to_string()])
                .with_exports(vec!["AuthService".to_string()]),
            // Depends on the barrel, therefore transitively on ./auth.
            importer("src/handler.ts", "./index"),
        ];

        let report = DependencyAnalyzer::new().analyze(&chunks, "src/auth.ts");
        let paths: Vec<&str> = report.dependents.iter().map(|d| d.path.as_str()).collect();
        assert_eq!(report.dependent_count, 2);
        assert!(paths.contains(&"src/index.ts"));
        assert!(paths.contains(&"src/handler.ts"));
    }

    #[test]
    fn test_re_export_cycle_terminates() {
        let chunks = vec![
            chunk("src/a.ts", 1)
                .with_imports(vec!["./b".to_string()])
                .with_exports(vec!["A".to_string()]),
            chunk("src/b.ts", 1)
                .with_imports(vec!["./a".to_string()])
                .with_exports(vec!["B".to_string()]),
            importer("src/user.ts", "./a"),
        ];

        let report = DependencyAnalyzer::new().analyze(&chunks, "src/b.ts");
        let paths: Vec<&str> = report.dependents.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"src/a.ts"));
        assert!(paths.contains(&"src/user.ts"));
        // The cycle back to b itself is not reported.
        assert!(!paths.contains(&"src/b.ts"));
    }

    #[test]
    fn test_false_positive_suppression() {
        let chunks = vec![
            importer("src/a.ts", "src/logger-utils"),
            importer("src/b.ts", "./logger"),
        ];

        let report = DependencyAnalyzer::new().analyze(&chunks, "src/logger");
        let paths: Vec<&str> = report.dependents.iter().map(|d| d.path.as_str()).collect();
        assert!(paths.contains(&"src/b.ts"));
        assert!(!paths.contains(&"src/a.ts"));
    }

    #[test]
    fn test_risk_boundaries_by_count() {
        let make_chunks = |n: usize| -> Vec<Chunk> {
            (0..n)
                .map(|i| importer(&format!("src/dep{}.ts", i), "./target"))
                .collect()
        };

        for (count, expected) in [
            (5, RiskLevel::Low),
            (15, RiskLevel::Medium),
            (30, RiskLevel::High),
            (31, RiskLevel::Critical),
        ] {
            let report = DependencyAnalyzer::new().analyze(&make_chunks(count), "src/target.ts");
            assert_eq!(report.dependent_count, count);
            assert_eq!(report.risk_level, expected, "at {} dependents", count);
        }
    }

    #[test]
    fn test_complexity_boost_raises_risk() {
        let complex_dependent = chunk("src/engine.ts", 1)
            .with_imports(vec!["./target".to_string()])
            .with_complexity(30, 20);

        let report =
            DependencyAnalyzer::new().analyze(&[complex_dependent], "src/target.ts");
        // One dependent is Low by count; max complexity 30 boosts to Critical.
        assert_eq!(report.risk_level, RiskLevel::Critical);
        assert_eq!(report.complexity.maximum, 30);
        assert_eq!(report.high_complexity_dependents, vec!["src/engine.ts"]);
    }

    #[test]
    fn test_test_files_flagged() {
        let chunks = vec![
            importer("src/auth.test.ts", "./auth"),
            importer("src/handler.ts", "./auth"),
        ];

        let report = DependencyAnalyzer::new().analyze(&chunks, "src/auth.ts");
        let test_flags: HashMap<&str, bool> = report
            .dependents
            .iter()
            .map(|d| (d.path.as_str(), d.is_test))
            .collect();
        assert_eq!(test_flags["src/auth.test.ts"], true);
        assert_eq!(test_flags["src/handler.ts"], false);
    }

    #[test]
    fn test_imported_symbols_keys_count_as_imports() {
        let mut imported = HashMap::new();
        imported.insert("./auth".to_string(), vec!["AuthService".to_string()]);
        let chunks = vec![chunk("src/handler.ts", 1).with_imported_symbols(imported)];

        let report = DependencyAnalyzer::new().analyze(&chunks, "src/auth.ts");
        assert_eq!(report.dependent_count, 1);
    }

    #[test]
    fn test_no_dependents() {
        let report = DependencyAnalyzer::new().analyze(&[], "src/auth.ts");
        assert_eq!(report.dependent_count, 0);
        assert_eq!(report.risk_level, RiskLevel::Low);
        assert!(report.high_complexity_dependents.is_empty());
    }
}
