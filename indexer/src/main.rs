use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use fieldrank_core::config::{parse_boost, IdfMode};
use fieldrank_core::ingest::read_documents;
use fieldrank_core::persist::{load_meta, save_index, IndexPaths};
use fieldrank_core::{Filters, IndexSchema, SearchIndex, WeightingConfig};
use std::fs;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "indexer")]
#[command(about = "Build and query TF-IDF field indexes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct BoostArgs {
    /// Per-field boost, e.g. --boost question=3
    #[arg(long = "boost", value_parser = boost_arg)]
    boosts: Vec<(String, f32)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the index from input JSON/JSONL files or a directory
    Build {
        /// Input path (file or directory)
        #[arg(long)]
        input: String,
        /// Output index directory
        #[arg(long)]
        output: String,
        /// Field to rank on (repeatable)
        #[arg(long = "text-field", required = true)]
        text_fields: Vec<String>,
        /// Field kept for exact-match filtering (repeatable)
        #[arg(long = "keyword-field")]
        keyword_fields: Vec<String>,
        #[command(flatten)]
        boosts: BoostArgs,
        /// JSON file with weighting options (token pattern, n-grams, df thresholds, ...)
        #[arg(long)]
        config: Option<String>,
        /// Use IDF = ln(1 + N/df) instead of the default ln((1 + N)/(1 + df)) + 1
        #[arg(long, default_value_t = false)]
        smoothed_idf: bool,
    },
    /// Load an index and print the top documents for a query as JSON lines
    Query {
        /// Index directory written by `build`
        #[arg(long)]
        index: String,
        /// Query text
        #[arg(long)]
        q: String,
        /// Number of results
        #[arg(long, default_value_t = 5)]
        k: usize,
        /// Exact-match filter, e.g. --filter course=data-engineering-zoomcamp
        #[arg(long = "filter", value_parser = filter_arg)]
        filters: Vec<(String, String)>,
        #[command(flatten)]
        boosts: BoostArgs,
    },
}

fn boost_arg(s: &str) -> std::result::Result<(String, f32), String> {
    parse_boost(s).map_err(|e| e.to_string())
}

fn filter_arg(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected field=value, got '{s}'"))
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Build { input, output, text_fields, keyword_fields, boosts, config, smoothed_idf } => {
            let mut weighting = match config {
                Some(path) => {
                    let raw = fs::read_to_string(&path).with_context(|| format!("reading {path}"))?;
                    serde_json::from_str::<WeightingConfig>(&raw).with_context(|| format!("parsing {path}"))?
                }
                None => WeightingConfig::default(),
            };
            if smoothed_idf {
                weighting.idf = IdfMode::Smoothed;
            }
            let mut schema = IndexSchema::new(text_fields, keyword_fields).with_weighting(weighting);
            schema.boosts.extend(boosts.boosts);
            build_index(&input, &output, schema)
        }
        Commands::Query { index, q, k, filters, boosts } => {
            let filters: Filters = filters.into_iter().collect();
            for doc in query_index(&index, &q, k, &filters, boosts.boosts)? {
                println!("{}", serde_json::to_string(&doc)?);
            }
            Ok(())
        }
    }
}

fn build_index(input: &str, output: &str, schema: IndexSchema) -> Result<()> {
    let out_paths = IndexPaths::new(output);

    let docs = read_documents(input).with_context(|| format!("reading documents from {input}"))?;
    tracing::info!(num_docs = docs.len(), input, "ingested documents");

    let index = SearchIndex::new(schema)?;
    index.fit(docs)?;
    for field in &index.schema().text_fields {
        tracing::info!(field = %field, vocab = index.vocabulary_size(field).unwrap_or(0), "field vocabulary");
    }
    let created_at = time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into());
    save_index(&index, &out_paths, created_at)?;

    tracing::info!(output, "index build complete");
    Ok(())
}

fn query_index(dir: &str, q: &str, k: usize, filters: &Filters, boosts: Vec<(String, f32)>) -> Result<Vec<fieldrank_core::Document>> {
    let paths = IndexPaths::new(dir);
    let meta = load_meta(&paths).with_context(|| format!("reading {}", paths.meta().display()))?;
    let mut schema = IndexSchema::new(meta.text_fields, meta.keyword_fields);
    schema.boosts.extend(boosts);
    let index = SearchIndex::new(schema)?;
    index.load_from_path(paths.snapshot())?;
    Ok(index.search(q, k, filters)?)
}
