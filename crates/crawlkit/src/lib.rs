//! Crawlkit - readable web content for agents and RAG pipelines
//!
//! This crate renders web pages in a shared headless browser session,
//! extracts their main content as title/HTML/markdown, optionally
//! inlines images as data URIs, and memoizes results in a bounded LRU
//! cache. Batches of URLs are fetched concurrently with per-URL failure
//! isolation.
//!
//! ## Components
//!
//! - [`WebCrawler`] - batch orchestration over a [`PageRenderer`]
//! - [`BrowserSession`] - lazily started, exclusively gated Chromium
//! - [`extract::extract`] - two-strategy content extraction that never
//!   fails
//! - [`images::embed_images`] - bounded-concurrency image inlining
//! - [`ContentCache`] - LRU memoization by URL or search key
//! - [`SearchProvider`] / [`DuckDuckGo`] - web search collaborator

pub mod cache;
pub mod config;
mod convert;
pub mod crawler;
mod error;
pub mod extract;
pub mod images;
pub mod output;
pub mod search;
pub mod session;

pub use cache::{ContentCache, DEFAULT_CACHE_CAPACITY};
pub use config::{CrawlerConfig, OutputFormat};
pub use convert::{html_to_markdown, html_to_text, ConvertOptions};
pub use crawler::{CrawlResults, WebCrawler};
pub use error::CrawlError;
pub use extract::Extraction;
pub use images::{embed_images, EmbedOutcome, ImageRef};
pub use search::{DuckDuckGo, SearchHit, SearchProvider};
pub use session::{BrowserSession, PageRenderer, RenderedPage};

/// Default User-Agent for outbound requests when the rendering engine
/// did not supply one
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
