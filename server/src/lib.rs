use anyhow::{bail, Result};
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use fieldrank_core::ingest::{read_documents, to_document};
use fieldrank_core::persist::{save_index, IndexPaths};
use fieldrank_core::{Document, Filters, RankError, SearchIndex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_RESULTS: usize = 100;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 5 }

#[derive(Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_k")]
    pub num_results: usize,
    #[serde(default)]
    pub filter_dict: Option<HashMap<String, Value>>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    pub results: Vec<Document>,
}

#[derive(Clone)]
pub struct AppState {
    pub index: Arc<SearchIndex>,
    pub index_paths_root: PathBuf,
    pub admin_token: Option<String>,
}

type ApiError = (StatusCode, String);

fn api_error(err: RankError) -> ApiError {
    let status = match err {
        RankError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        RankError::NotInitialized(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

/// Open the index behind `paths`. With a `data` file, the snapshot is used
/// only when it is at least as new as the data; otherwise the index is fitted
/// from the data and the snapshot rewritten.
pub fn open_index(index: SearchIndex, paths: &IndexPaths, data: Option<&std::path::Path>) -> Result<SearchIndex> {
    let snapshot = paths.snapshot();
    let snapshot_mtime = modified(&snapshot);
    let fresh = match (snapshot_mtime, data) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(snap), Some(d)) => modified(d).map_or(true, |data_mtime| snap >= data_mtime),
    };
    if fresh {
        index.load_from_path(&snapshot)?;
        return Ok(index);
    }
    let Some(data) = data else {
        bail!("no snapshot at {} and no data file to build one from", snapshot.display());
    };
    tracing::info!(data = %data.display(), "snapshot missing or stale, fitting from data");
    index.fit(read_documents(data)?)?;
    save_index(&index, paths, now_rfc3339())?;
    Ok(index)
}

fn modified(path: &std::path::Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339).unwrap_or_else(|_| "".into())
}

/// Router over `index`, with the admin token and CORS origins read from the environment.
pub fn build_app(index: Arc<SearchIndex>, index_dir: PathBuf) -> Router {
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    router(AppState { index, index_paths_root: index_dir, admin_token })
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_query_handler).post(search_handler))
        .route("/doc/:index", get(doc_handler))
        .route("/index/fit", post(index_fit))
        .route("/index/save", post(index_save))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn filters_from_json(raw: Option<HashMap<String, Value>>) -> Result<Filters, RankError> {
    let mut filters = Filters::new();
    for (field, value) in raw.unwrap_or_default() {
        match value {
            Value::String(s) => { filters.insert(field, s); }
            other => {
                return Err(RankError::InvalidArgument(format!("filter value for '{field}' must be a string, got {other}")));
            }
        }
    }
    Ok(filters)
}

fn run_search(state: &AppState, query: String, k: usize, filters: Filters) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let results = state.index.search(&query, k.min(MAX_RESULTS), &filters).map_err(api_error)?;
    let took_s = start.elapsed().as_secs_f64();
    tracing::debug!(query = %query, returned = results.len(), took_s, "search");
    Ok(Json(SearchResponse { query, took_s, results }))
}

pub async fn search_handler(State(state): State<AppState>, Json(req): Json<SearchRequest>) -> Result<Json<SearchResponse>, ApiError> {
    let filters = filters_from_json(req.filter_dict).map_err(api_error)?;
    run_search(&state, req.query, req.num_results, filters)
}

pub async fn search_query_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<SearchResponse>, ApiError> {
    run_search(&state, params.q, params.k, Filters::new())
}

pub async fn doc_handler(State(state): State<AppState>, Path(index): Path<usize>) -> Result<Json<Document>, ApiError> {
    state
        .index
        .document(index)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("no document at position {index}")))
}

// --- Admin endpoints ---
async fn index_fit(State(state): State<AppState>, headers: HeaderMap, Json(raw): Json<Vec<Value>>) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    let docs = raw.into_iter().map(to_document).collect::<Result<Vec<_>, _>>().map_err(api_error)?;
    let index = state.index.clone();
    tokio::task::spawn_blocking(move || index.fit(docs))
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?
        .map_err(api_error)?;
    Ok(Json(serde_json::json!({ "num_docs": state.index.len() })))
}

async fn index_save(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    authorize(&state, &headers)?;
    let paths = IndexPaths::new(&state.index_paths_root);
    save_index(&state.index, &paths, now_rfc3339()).map_err(api_error)?;
    Ok(Json(serde_json::json!({ "snapshot": paths.snapshot().display().to_string() })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}
