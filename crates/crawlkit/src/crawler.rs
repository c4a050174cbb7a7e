//! Crawl orchestration
//!
//! [`WebCrawler`] owns the rendering session and the content cache and
//! drives the per-URL pipeline: cache lookup, render, extract, image
//! embedding, optional persistence, cache write-through. Per-URL
//! failures are isolated into the result map; only a session start
//! failure escapes to the caller.

use crate::cache::{ContentCache, DEFAULT_CACHE_CAPACITY};
use crate::config::{CrawlerConfig, OutputFormat};
use crate::error::CrawlError;
use crate::search::{SearchHit, SearchProvider};
use crate::session::{BrowserSession, PageRenderer};
use crate::{convert, extract, images, output};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// One entry per requested URL: extracted content or an error string
pub type CrawlResults = HashMap<String, String>;

/// Crawl orchestrator over a rendering engine
pub struct WebCrawler<R: PageRenderer> {
    renderer: Arc<R>,
    cache: ContentCache,
}

impl WebCrawler<BrowserSession> {
    /// Crawler backed by a lazily started headless browser
    pub fn new() -> Self {
        Self::with_renderer(Arc::new(BrowserSession::new()))
    }
}

impl Default for WebCrawler<BrowserSession> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: PageRenderer> WebCrawler<R> {
    /// Crawler over a custom rendering engine
    pub fn with_renderer(renderer: Arc<R>) -> Self {
        Self {
            renderer,
            cache: ContentCache::new(DEFAULT_CACHE_CAPACITY),
        }
    }

    /// Replace the default cache capacity
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache = ContentCache::new(capacity);
        self
    }

    /// The content cache owned by this crawler
    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Crawl a batch of URLs concurrently
    ///
    /// Returns exactly one entry per requested URL. Only a session
    /// start failure is returned as an error; everything else lands in
    /// the per-URL slots.
    pub async fn crawl(
        &self,
        urls: &[String],
        cfg: &CrawlerConfig,
    ) -> Result<CrawlResults, CrawlError> {
        self.crawl_with_observer(urls, cfg, |_, _| {}).await
    }

    /// Crawl with a progress observer invoked exactly once per URL on
    /// completion, success or failure
    pub async fn crawl_with_observer<F>(
        &self,
        urls: &[String],
        cfg: &CrawlerConfig,
        observer: F,
    ) -> Result<CrawlResults, CrawlError>
    where
        F: Fn(&str, bool) + Send + Sync,
    {
        self.renderer.ensure_started().await?;

        let observer = &observer;
        let workers = urls.iter().map(|url| async move {
            let outcome = self.fetch(url, cfg).await;
            let ok = outcome.is_ok();
            let content = outcome.unwrap_or_else(|err| format!("Error: {err}"));
            if ok {
                debug!(%url, "parsed");
            } else {
                warn!(%url, "fetch failed");
            }
            observer(url, ok);
            (url.clone(), content)
        });

        Ok(futures::future::join_all(workers).await.into_iter().collect())
    }

    /// Fetch a single URL through the full pipeline
    pub async fn fetch(&self, url: &str, cfg: &CrawlerConfig) -> Result<String, CrawlError> {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(CrawlError::InvalidUrlScheme);
        }

        if !cfg.no_cache {
            if let Some(hit) = self.cache.get(url) {
                debug!(%url, "cache hit");
                return Ok(hit);
            }
        }

        let rendered = self.renderer.render(url).await?;
        let extraction = extract::extract(&rendered.html, url, cfg);

        let (html, markdown) = if cfg.embed_images {
            let outcome = images::embed_images(
                &extraction.html,
                &extraction.markdown,
                url,
                rendered.user_agent.as_deref(),
                &rendered.cookies,
            )
            .await;
            (outcome.html, outcome.markdown)
        } else {
            (extraction.html, extraction.markdown)
        };

        if cfg.save_markdown || cfg.save_html {
            output::save_outputs(
                &cfg.output_dir,
                &extraction.title,
                cfg.save_html.then_some(html.as_str()),
                cfg.save_markdown.then_some(markdown.as_str()),
            )
            .await?;
        }

        let content = match cfg.output_format {
            OutputFormat::Markdown => markdown,
            OutputFormat::Html => html,
            OutputFormat::Text => convert::html_to_text(&html),
        };

        // Write-through even on no_cache requests, keeping the cache
        // warm for later callers
        self.cache.put(url, &content);
        Ok(content)
    }

    /// Search with composite-key memoization through the content cache
    pub async fn search_cached(
        &self,
        provider: &dyn SearchProvider,
        query: &str,
        max_results: usize,
        use_cache: bool,
    ) -> Result<Vec<SearchHit>, CrawlError> {
        let key = ContentCache::search_key(query, max_results);

        if use_cache {
            if let Some(cached) = self.cache.get(&key) {
                if let Ok(hits) = serde_json::from_str::<Vec<SearchHit>>(&cached) {
                    debug!(%query, "search cache hit");
                    return Ok(hits);
                }
            }
        }

        let hits = provider.search(query, max_results).await?;
        match serde_json::to_string(&hits) {
            Ok(serialized) => self.cache.put(&key, &serialized),
            Err(err) => warn!(error = %err, "search result not cacheable"),
        }
        Ok(hits)
    }

    /// Stop the rendering engine
    pub async fn shutdown(&self) {
        self.renderer.shutdown().await;
    }
}
