//! Lien CLI - local code intelligence.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use lien::{
    compute_repo_id, ChangeDetector, ChunkerOptions, Config, DependencyAnalyzer, DomainError,
    FileContextUseCase, GitProbe, HashEmbedding, IgnoreFilter, IncrementalIndexer,
    InMemoryVectorStore, ComplexityReportUseCase, ScanFilter, Scanner, SearchCodeUseCase,
    TenantTags, TreeSitterChunker, VectorStore,
};

/// Lien - semantic search and dependency analysis for local codebases
#[derive(Parser)]
#[command(name = "lien")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Workspace root to operate on
    #[arg(short, long, global = true, default_value = ".")]
    root: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index the workspace (incremental when a manifest exists)
    Index,

    /// Search indexed code semantically
    Search {
        /// The search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        limit: usize,
    },

    /// Report symbols above the configured complexity thresholds
    Complexity {
        /// Restrict to files matching this pattern
        #[arg(short, long)]
        pattern: Option<String>,
    },

    /// Show everything the index knows about one file
    FileContext {
        /// File path, relative to the workspace root
        path: String,
    },

    /// List files that depend on a file, with a risk assessment
    Dependents {
        /// File path, relative to the workspace root
        path: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Failed to initialize logging");
        return ExitCode::FAILURE;
    }

    let root = match std::fs::canonicalize(&cli.root) {
        Ok(root) => root,
        Err(e) => {
            eprintln!("Invalid workspace root {:?}: {}", cli.root, e);
            return ExitCode::from(2);
        }
    };

    match run(&cli.command, &root).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(DomainError::InvalidInput(message)) => {
            eprintln!("Invalid argument: {}", message);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: &Commands, root: &Path) -> Result<(), DomainError> {
    let config = Config::default();
    let db_path = root.join(".lien");
    let store = Arc::new(InMemoryVectorStore::new(db_path).with_thresholds(config.relevance));
    let embeddings = Arc::new(HashEmbedding::new());

    match command {
        Commands::Index => {
            let summary = index_workspace(root, &config, store.clone(), embeddings).await?;
            println!(
                "Indexed {} files ({} chunks, {} deleted, {} skipped) in {}ms",
                summary.files_indexed,
                summary.chunks_created,
                summary.files_deleted,
                summary.skipped_total(),
                summary.duration_ms
            );
            for (category, count) in &summary.skipped {
                println!("  skipped ({}): {}", category, count);
            }
            if let Some(error) = summary.error {
                return Err(DomainError::internal(error));
            }
        }

        Commands::Search { query, limit } => {
            index_workspace(root, &config, store.clone(), embeddings.clone()).await?;
            let use_case = SearchCodeUseCase::new(store, embeddings);
            let results = use_case.execute(query, *limit).await?;

            if results.is_empty() {
                println!("No results found.");
            } else {
                println!("Found {} results:\n", results.len());
                for (i, result) in results.iter().enumerate() {
                    println!("{}. {}", i + 1, result.display_line());
                    if let Some(name) = result.chunk().symbol_name() {
                        println!("   Symbol: {}", name);
                    }
                    let preview: String = result
                        .chunk()
                        .content()
                        .lines()
                        .take(3)
                        .map(|l| format!("   | {}", l))
                        .collect::<Vec<_>>()
                        .join("\n");
                    println!("{}\n", preview);
                }
            }
        }

        Commands::Complexity { pattern } => {
            index_workspace(root, &config, store.clone(), embeddings).await?;
            let use_case =
                ComplexityReportUseCase::new(store, config.complexity.thresholds.clone());
            let filter = ScanFilter {
                language: None,
                pattern: pattern.clone(),
                limit: None,
            };
            let report = use_case.execute(&filter).await?;

            println!(
                "Scanned {} files, {} violations",
                report.files_scanned,
                report.total_violations()
            );
            for (file, violations) in &report.violations_by_file {
                println!("\n{}", file);
                for v in violations {
                    println!(
                        "  {}:{} {} {} = {:.0} (threshold {:.0})",
                        file,
                        v.start_line,
                        v.symbol.as_deref().unwrap_or("<block>"),
                        v.metric,
                        v.value,
                        v.threshold
                    );
                }
            }
        }

        Commands::FileContext { path } => {
            index_workspace(root, &config, store.clone(), embeddings).await?;
            let context = FileContextUseCase::new(store).execute(path).await?;

            println!("{}: {} chunks", context.file, context.chunks.len());
            if !context.symbols.is_empty() {
                println!("Symbols: {}", context.symbols.join(", "));
            }
            if !context.imports.is_empty() {
                println!("Imports: {}", context.imports.join(", "));
            }
            if !context.exports.is_empty() {
                println!("Exports: {}", context.exports.join(", "));
            }
            println!(
                "Complexity: avg {:.1}, max {}",
                context.avg_complexity, context.max_complexity
            );
        }

        Commands::Dependents { path } => {
            index_workspace(root, &config, store.clone(), embeddings).await?;
            let chunks = store.scan_with_filter(&ScanFilter::default()).await?;
            let report = DependencyAnalyzer::new().analyze(&chunks, path);

            println!(
                "{}: {} dependents, risk {}",
                report.target, report.dependent_count, report.risk_level
            );
            for dependent in &report.dependents {
                println!(
                    "  {}{} (avg {:.1}, max {})",
                    dependent.path,
                    if dependent.is_test { " [test]" } else { "" },
                    dependent.avg_complexity,
                    dependent.max_complexity
                );
            }
            if !report.high_complexity_dependents.is_empty() {
                println!(
                    "High-complexity dependents: {}",
                    report.high_complexity_dependents.join(", ")
                );
            }
        }
    }

    Ok(())
}

/// Scan, detect changes, and run the indexer for the workspace.
async fn index_workspace(
    root: &Path,
    config: &Config,
    store: Arc<InMemoryVectorStore>,
    embeddings: Arc<HashEmbedding>,
) -> Result<lien::IndexSummary, DomainError> {
    let filter = IgnoreFilter::build(root)?;
    let scanner = Scanner::new(root, filter, &config.indexing.include);
    let files = scanner.scan()?;
    let paths: Vec<String> = files.into_iter().map(|f| f.relative_path).collect();
    info!("Found {} candidate files", paths.len());

    let repo_id = config
        .storage
        .repo_id
        .clone()
        .unwrap_or_else(|| compute_repo_id(root));
    let tags = TenantTags {
        repo_id: Some(repo_id),
        org_id: config.storage.org_id.clone(),
    };
    let chunker = Arc::new(TreeSitterChunker::new(
        ChunkerOptions {
            chunk_size: config.core.chunk_size,
            chunk_overlap: config.core.chunk_overlap,
            use_ast: config.chunking.use_ast,
        },
        tags,
    ));

    let vcs: Arc<GitProbe> = Arc::new(GitProbe::new());
    let detector = ChangeDetector::new(vcs);
    let manifest = lien::Manifest::load(store.db_path()).await.ok().flatten();
    let detected = detector.detect(root, manifest.as_ref(), &paths).await;
    info!(
        "Change detection ({}): {} added, {} modified, {} deleted",
        detected.change_set.reason,
        detected.change_set.added.len(),
        detected.change_set.modified.len(),
        detected.change_set.deleted.len()
    );

    let indexer = IncrementalIndexer::new(store, embeddings, chunker)
        .with_concurrency(config.concurrency())
        .with_embedding_batch_size(config.core.embedding_batch_size);

    let summary = if manifest.is_none() {
        indexer
            .full_index(root, &detected.change_set.added, detected.current_vcs_state)
            .await
    } else {
        indexer
            .apply_changes(root, &detected.change_set, detected.current_vcs_state)
            .await
    };
    Ok(summary)
}
