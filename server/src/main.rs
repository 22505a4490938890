use anyhow::Result;
use axum::Router;
use clap::Parser;
use fieldrank_core::config::parse_boost;
use fieldrank_core::persist::{load_meta, IndexPaths};
use fieldrank_core::{IndexSchema, SearchIndex};
use server::{build_app, open_index};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
struct Args {
    /// Index directory path
    #[arg(long, default_value = "./index")]
    index: String,
    /// JSON/JSONL documents to fit from when the snapshot is missing or older
    #[arg(long)]
    data: Option<PathBuf>,
    /// Text field (defaults to the fields recorded in meta.json)
    #[arg(long = "text-field")]
    text_fields: Vec<String>,
    /// Keyword field (defaults to the fields recorded in meta.json)
    #[arg(long = "keyword-field")]
    keyword_fields: Vec<String>,
    /// Per-field boost, e.g. --boost question=3
    #[arg(long = "boost", value_parser = |s: &str| parse_boost(s).map_err(|e| e.to_string()))]
    boosts: Vec<(String, f32)>,
    /// Host to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// Port to bind
    #[arg(long, default_value_t = 8080)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let args = Args::parse();
    let paths = IndexPaths::new(&args.index);

    let mut schema = if args.text_fields.is_empty() {
        let meta = load_meta(&paths)?;
        tracing::info!(num_docs = meta.num_docs, created_at = %meta.created_at, "using fields from meta.json");
        IndexSchema::new(meta.text_fields, meta.keyword_fields)
    } else {
        IndexSchema::new(args.text_fields, args.keyword_fields)
    };
    schema.boosts.extend(args.boosts);
    let index = open_index(SearchIndex::new(schema)?, &paths, args.data.as_deref())?;
    tracing::info!(num_docs = index.len(), "index ready");

    let app: Router = build_app(Arc::new(index), paths.root.clone());
    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
