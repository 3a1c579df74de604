use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use searchcore::{build_index, EngineConfig, RetrievalMode, Retriever, StopWordPolicy};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query a TF-IDF inverted index over HTML documents", long_about = None)]
struct Cli {
    /// JSON configuration file; missing fields use defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from a corpus directory
    Build {
        /// Corpus directory
        #[arg(long)]
        input: PathBuf,
        /// Output index directory
        #[arg(long)]
        output: PathBuf,
        /// Stop word policy: none, fixed or comprehensive
        #[arg(long)]
        stop_words: Option<StopWordPolicy>,
    },
    /// Rank documents for one or more tokens
    Search {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
        /// full loads everything; optimized seeks per token
        #[arg(long, default_value_t = RetrievalMode::Optimized)]
        mode: RetrievalMode,
        /// Maximum number of documents to print
        #[arg(long)]
        top: Option<usize>,
        #[arg(required = true)]
        tokens: Vec<String>,
    },
    /// Print index metadata and, optionally, statistics of single tokens
    Stats {
        /// Index directory
        #[arg(long)]
        index: PathBuf,
        #[arg(long, default_value_t = RetrievalMode::Optimized)]
        mode: RetrievalMode,
        tokens: Vec<String>,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => EngineConfig::default(),
    };

    match cli.command {
        Commands::Build { input, output, stop_words } => {
            let mut build = config.build;
            if let Some(policy) = stop_words {
                build.stop_words = policy;
            }
            let report = build_index(&input, &output, &build)
                .with_context(|| format!("building index from {}", input.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Search { index, mode, top, tokens } => {
            let retriever = Retriever::open(&index, mode, &config.retrieval)
                .with_context(|| format!("opening index {}", index.display()))?;
            let top = top.unwrap_or(config.retrieval.default_top_k);
            let ranked = retriever.search_multiple(&tokens, Some(top))?;
            if ranked.is_empty() {
                tracing::info!(?tokens, "no matching documents");
            }
            for (rank, doc) in ranked.iter().enumerate() {
                println!("{:>3}. {:<40} score={:.6} matched={}", rank + 1, doc.doc_name, doc.score, doc.matched_tokens);
            }
        }
        Commands::Stats { index, mode, tokens } => {
            let retriever = Retriever::open(&index, mode, &config.retrieval)
                .with_context(|| format!("opening index {}", index.display()))?;
            let mut terms = serde_json::Map::new();
            for token in &tokens {
                let stats = retriever.term_stats(token)?;
                terms.insert(token.clone(), serde_json::to_value(stats)?);
            }
            let out = serde_json::json!({
                "meta": retriever.meta(),
                "mode": mode.to_string(),
                "offset_table": retriever.offset_statistics(),
                "terms": terms,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
    }
    Ok(())
}
