//! HTTP server exposing the crawler over /read and /search

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use crawlkit::{CrawlerConfig, DuckDuckGo, OutputFormat, WebCrawler};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{error, info};

/// Default number of search results
pub const DEFAULT_MAX_RESULTS: usize = 3;

struct AppState {
    crawler: WebCrawler<crawlkit::BrowserSession>,
    search: DuckDuckGo,
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": message.into() })),
    )
}

fn internal_error(message: impl Into<String>) -> ApiError {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": message.into() })),
    )
}

/// URL selection for GET /read
#[derive(Debug, Deserialize)]
struct ReadParams {
    /// A single URL
    url: Option<String>,
    /// Comma-separated list of URLs
    urls: Option<String>,
}

/// Search parameters for GET /search
#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    max_results: Option<usize>,
    /// Crawl each hit and return extracted content instead of hits
    fulltext: Option<bool>,
}

/// Per-request crawl overrides carried in the query string
///
/// Kept separate from the URL selection so every field stays optional;
/// unset fields fall back to the config defaults.
#[derive(Debug, Default, Deserialize)]
struct ConfigQuery {
    format: Option<String>,
    include_comments: Option<bool>,
    include_tables: Option<bool>,
    include_images: Option<bool>,
    include_links: Option<bool>,
    favor_recall: Option<bool>,
    deduplicate: Option<bool>,
    with_metadata: Option<bool>,
    no_cache: Option<bool>,
    save_html: Option<bool>,
    save_markdown: Option<bool>,
    output_dir: Option<PathBuf>,
    embed_images: Option<bool>,
    use_readability: Option<bool>,
}

impl ConfigQuery {
    fn into_config(self) -> Result<CrawlerConfig, String> {
        let mut cfg = CrawlerConfig::default();
        if let Some(format) = self.format {
            cfg.output_format = OutputFormat::from_str(&format)?;
        }
        if let Some(v) = self.include_comments {
            cfg.include_comments = v;
        }
        if let Some(v) = self.include_tables {
            cfg.include_tables = v;
        }
        if let Some(v) = self.include_images {
            cfg.include_images = v;
        }
        if let Some(v) = self.include_links {
            cfg.include_links = v;
        }
        if let Some(v) = self.favor_recall {
            cfg.favor_recall = v;
        }
        if let Some(v) = self.deduplicate {
            cfg.deduplicate = v;
        }
        if let Some(v) = self.with_metadata {
            cfg.with_metadata = v;
        }
        if let Some(v) = self.no_cache {
            cfg.no_cache = v;
        }
        if let Some(v) = self.save_html {
            cfg.save_html = v;
        }
        if let Some(v) = self.save_markdown {
            cfg.save_markdown = v;
        }
        if let Some(v) = self.output_dir {
            cfg.output_dir = v;
        }
        if let Some(v) = self.embed_images {
            cfg.embed_images = v;
        }
        if let Some(v) = self.use_readability {
            cfg.use_readability = v;
        }
        Ok(cfg)
    }
}

/// Body for POST /read
#[derive(Debug, Deserialize)]
struct ReadBody {
    urls: Vec<String>,
    #[serde(default)]
    config: CrawlerConfig,
}

/// Merge the `url` and `urls` parameters into one list
fn collect_urls(url: Option<&str>, urls: Option<&str>) -> Vec<String> {
    let mut collected = Vec::new();
    if let Some(url) = url {
        let url = url.trim();
        if !url.is_empty() {
            collected.push(url.to_string());
        }
    }
    if let Some(urls) = urls {
        for part in urls.split(',') {
            let part = part.trim();
            if !part.is_empty() {
                collected.push(part.to_string());
            }
        }
    }
    collected
}

async fn crawl_to_json(
    state: &AppState,
    urls: &[String],
    cfg: &CrawlerConfig,
) -> Result<Json<Value>, ApiError> {
    let results = state
        .crawler
        .crawl(urls, cfg)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    // A single URL answers with the bare content string
    if let [url] = urls {
        return Ok(Json(json!(results[url])));
    }
    Ok(Json(json!(results)))
}

async fn read_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ReadParams>,
    Query(config): Query<ConfigQuery>,
) -> Result<Json<Value>, ApiError> {
    let urls = collect_urls(params.url.as_deref(), params.urls.as_deref());
    if urls.is_empty() {
        return Err(bad_request("Provide URL(s) via ?url= or ?urls="));
    }
    let cfg = config.into_config().map_err(bad_request)?;
    crawl_to_json(&state, &urls, &cfg).await
}

async fn read_post(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ReadBody>,
) -> Result<Json<Value>, ApiError> {
    if body.urls.is_empty() {
        return Err(bad_request("Provide URL(s) in the request body"));
    }
    crawl_to_json(&state, &body.urls, &body.config).await
}

async fn search_get(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
    Query(config): Query<ConfigQuery>,
) -> Result<Json<Value>, ApiError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(bad_request("Provide a non-empty query"));
    }
    let max_results = params.max_results.unwrap_or(DEFAULT_MAX_RESULTS);
    let cfg = config.into_config().map_err(bad_request)?;

    let hits = state
        .crawler
        .search_cached(&state.search, query, max_results, !cfg.no_cache)
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    if !params.fulltext.unwrap_or(false) {
        return Ok(Json(json!({ "results": hits })));
    }

    let urls: Vec<String> = hits.iter().map(|hit| hit.url.clone()).collect();
    if urls.is_empty() {
        return Ok(Json(json!({})));
    }
    let results = state
        .crawler
        .crawl(&urls, &cfg)
        .await
        .map_err(|e| internal_error(e.to_string()))?;
    Ok(Json(json!(results)))
}

fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/read", get(read_get).post(read_post))
        .route("/search", get(search_get))
        .with_state(state)
}

/// Run the HTTP server until interrupted
pub async fn run(port: u16) -> std::io::Result<()> {
    let state = Arc::new(AppState {
        crawler: WebCrawler::new(),
        search: DuckDuckGo::new(),
    });
    let app = router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "serving");

    let served = axum::serve(listener, app).await;
    state.crawler.shutdown().await;
    if let Err(err) = &served {
        error!(error = %err, "server stopped");
    }
    served
}
