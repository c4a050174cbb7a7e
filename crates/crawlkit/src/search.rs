//! Web search provider
//!
//! The crawler treats search as an external collaborator behind
//! [`SearchProvider`]. The shipped implementation scrapes the
//! DuckDuckGo HTML endpoint, which needs no API key.

use crate::error::CrawlError;
use crate::DEFAULT_USER_AGENT;
use async_trait::async_trait;
use schemars::JsonSchema;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

const DDG_HTML_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

const SEARCH_TIMEOUT: Duration = Duration::from_secs(30);

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Resolves a query to ordered (url, snippet) results
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str, max_results: usize)
        -> Result<Vec<SearchHit>, CrawlError>;
}

/// DuckDuckGo HTML-endpoint search
pub struct DuckDuckGo {
    client: reqwest::Client,
    endpoint: String,
}

impl DuckDuckGo {
    pub fn new() -> Self {
        Self::with_endpoint(DDG_HTML_ENDPOINT)
    }

    /// Point the provider at a different endpoint (used by tests)
    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(DEFAULT_USER_AGENT)
            .timeout(SEARCH_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

impl Default for DuckDuckGo {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, CrawlError> {
        debug!(%query, max_results, "searching");
        let html = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query)])
            .send()
            .await
            .map_err(CrawlError::from_reqwest)?
            .text()
            .await
            .map_err(|e| CrawlError::Search(e.to_string()))?;

        Ok(parse_results(&html, max_results))
    }
}

/// Parse the DuckDuckGo HTML results page
fn parse_results(html: &str, max_results: usize) -> Vec<SearchHit> {
    let document = Html::parse_document(html);
    let result_selector = Selector::parse(".result").expect("valid selector");
    let title_selector = Selector::parse(".result__a").expect("valid selector");
    let snippet_selector = Selector::parse(".result__snippet").expect("valid selector");

    let mut hits = Vec::new();
    for element in document.select(&result_selector) {
        // Skip sponsored results
        if element
            .value()
            .attr("class")
            .map(|class| class.contains("result--ad"))
            .unwrap_or(false)
        {
            continue;
        }

        let Some(title_node) = element.select(&title_selector).next() else {
            continue;
        };
        let snippet = element
            .select(&snippet_selector)
            .next()
            .map(|node| node.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let raw_url = title_node.value().attr("href").unwrap_or("");
        let url = clean_ddg_url(raw_url);
        if url.is_empty() {
            continue;
        }

        hits.push(SearchHit {
            title: title_node.text().collect::<String>().trim().to_string(),
            url,
            snippet,
        });

        if hits.len() >= max_results {
            break;
        }
    }
    hits
}

/// Unwrap DuckDuckGo's redirect links to the target URL
fn clean_ddg_url(raw_url: &str) -> String {
    let mut url = raw_url.to_string();
    if url.starts_with("//") {
        url = format!("https:{url}");
    } else if url.starts_with('/') {
        url = format!("https://duckduckgo.com{url}");
    }

    if let Ok(parsed) = Url::parse(&url) {
        // The real target sits in the `uddg` query parameter
        if let Some((_, target)) = parsed.query_pairs().find(|(key, _)| key == "uddg") {
            return target.to_string();
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r##"
        <html><body>
        <div class="result results_links">
            <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.rust-lang.org%2F">Rust Programming Language</a>
            <a class="result__snippet" href="#">A language empowering everyone.</a>
        </div>
        <div class="result result--ad">
            <a class="result__a" href="https://ads.example.com">Sponsored</a>
            <a class="result__snippet" href="#">Buy now.</a>
        </div>
        <div class="result results_links">
            <a class="result__a" href="https://doc.rust-lang.org/book/">The Book</a>
            <a class="result__snippet" href="#">Learn Rust.</a>
        </div>
        </body></html>
    "##;

    #[test]
    fn test_parse_results() {
        let hits = parse_results(RESULTS_PAGE, 10);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://www.rust-lang.org/");
        assert_eq!(hits[0].title, "Rust Programming Language");
        assert_eq!(hits[0].snippet, "A language empowering everyone.");
        assert_eq!(hits[1].url, "https://doc.rust-lang.org/book/");
    }

    #[test]
    fn test_parse_results_truncates() {
        let hits = parse_results(RESULTS_PAGE, 1);
        assert_eq!(hits.len(), 1);
    }

    #[test]
    fn test_clean_ddg_url() {
        assert_eq!(
            clean_ddg_url("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage"),
            "https://example.com/page"
        );
        assert_eq!(
            clean_ddg_url("https://example.com/direct"),
            "https://example.com/direct"
        );
    }
}
