//! End-to-end crawl pipeline tests over a canned renderer
//!
//! Chromium never runs here. A [`MockRenderer`] serves canned markup so
//! the tests exercise caching, batch fan-out, failure isolation, and
//! image embedding against a wiremock server.

use async_trait::async_trait;
use crawlkit::{
    ContentCache, CrawlError, CrawlerConfig, OutputFormat, PageRenderer, RenderedPage, SearchHit,
    SearchProvider, WebCrawler,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Renderer serving canned markup, counting renders, optionally failing
/// for one URL
struct MockRenderer {
    pages: HashMap<String, String>,
    renders: AtomicUsize,
    fail_url: Option<String>,
}

impl MockRenderer {
    fn new() -> Self {
        Self {
            pages: HashMap::new(),
            renders: AtomicUsize::new(0),
            fail_url: None,
        }
    }

    fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    fn failing_on(mut self, url: &str) -> Self {
        self.fail_url = Some(url.to_string());
        self
    }

    fn render_count(&self) -> usize {
        self.renders.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageRenderer for MockRenderer {
    async fn ensure_started(&self) -> Result<(), CrawlError> {
        Ok(())
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, CrawlError> {
        self.renders.fetch_add(1, Ordering::SeqCst);
        if self.fail_url.as_deref() == Some(url) {
            return Err(CrawlError::Render("tab crashed".to_string()));
        }
        let html = self
            .pages
            .get(url)
            .cloned()
            .ok_or_else(|| CrawlError::Render(format!("no canned page for {url}")))?;
        Ok(RenderedPage {
            html,
            user_agent: None,
            cookies: Vec::new(),
        })
    }

    async fn shutdown(&self) {}
}

const ARTICLE: &str = r#"<html><head><title>Sample Article</title></head><body>
<main>
<h1>Sample Article</h1>
<p>This paragraph carries enough substance to be treated as the main
content of the page by the extraction stage, with several sentences of
plain running text that talk about nothing in particular but take up
room all the same.</p>
<p>A second paragraph continues the discussion and links to the
<a href="https://www.rust-lang.org/">Rust site</a> for reference.</p>
</main>
</body></html>"#;

fn crawler_with(renderer: Arc<MockRenderer>) -> WebCrawler<MockRenderer> {
    WebCrawler::with_renderer(renderer)
}

#[tokio::test]
async fn test_crawl_returns_markdown_per_url() {
    let renderer = Arc::new(
        MockRenderer::new()
            .with_page("https://a.example/one", ARTICLE)
            .with_page("https://b.example/two", ARTICLE),
    );
    let crawler = crawler_with(renderer);
    let urls = vec![
        "https://a.example/one".to_string(),
        "https://b.example/two".to_string(),
    ];

    let results = crawler.crawl(&urls, &CrawlerConfig::default()).await.unwrap();

    assert_eq!(results.len(), 2);
    for url in &urls {
        let content = &results[url];
        assert!(!content.is_empty());
        assert!(!content.starts_with("Error:"), "unexpected error for {url}");
        assert!(content.contains("Sample Article"));
    }
}

#[tokio::test]
async fn test_second_crawl_hits_cache() {
    let renderer = Arc::new(MockRenderer::new().with_page("https://a.example/one", ARTICLE));
    let crawler = crawler_with(renderer.clone());
    let urls = vec!["https://a.example/one".to_string()];
    let cfg = CrawlerConfig::default();

    let first = crawler.crawl(&urls, &cfg).await.unwrap();
    let second = crawler.crawl(&urls, &cfg).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(renderer.render_count(), 1, "second crawl should not render");
}

#[tokio::test]
async fn test_no_cache_bypasses_lookup_but_writes_through() {
    let renderer = Arc::new(MockRenderer::new().with_page("https://a.example/one", ARTICLE));
    let crawler = crawler_with(renderer.clone());
    let urls = vec!["https://a.example/one".to_string()];

    let no_cache = CrawlerConfig {
        no_cache: true,
        ..CrawlerConfig::default()
    };
    crawler.crawl(&urls, &no_cache).await.unwrap();
    crawler.crawl(&urls, &no_cache).await.unwrap();
    assert_eq!(renderer.render_count(), 2, "no_cache must re-render");

    // The result was still written through, so a cached call is served
    // without rendering
    crawler.crawl(&urls, &CrawlerConfig::default()).await.unwrap();
    assert_eq!(renderer.render_count(), 2);
}

#[tokio::test]
async fn test_one_failure_does_not_poison_the_batch() {
    let renderer = Arc::new(
        MockRenderer::new()
            .with_page("https://a.example/ok", ARTICLE)
            .failing_on("https://a.example/broken"),
    );
    let crawler = crawler_with(renderer);
    let urls = vec![
        "https://a.example/ok".to_string(),
        "https://a.example/broken".to_string(),
        "ftp://a.example/wrong-scheme".to_string(),
    ];

    let results = crawler.crawl(&urls, &CrawlerConfig::default()).await.unwrap();

    assert_eq!(results.len(), 3);
    assert!(!results["https://a.example/ok"].starts_with("Error:"));
    assert!(results["https://a.example/broken"].starts_with("Error:"));
    assert!(results["ftp://a.example/wrong-scheme"].starts_with("Error:"));
}

#[tokio::test]
async fn test_observer_fires_once_per_url() {
    let renderer = Arc::new(
        MockRenderer::new()
            .with_page("https://a.example/ok", ARTICLE)
            .failing_on("https://a.example/broken"),
    );
    let crawler = crawler_with(renderer);
    let urls = vec![
        "https://a.example/ok".to_string(),
        "https://a.example/broken".to_string(),
    ];

    let seen: Mutex<Vec<(String, bool)>> = Mutex::new(Vec::new());
    crawler
        .crawl_with_observer(&urls, &CrawlerConfig::default(), |url, ok| {
            seen.lock().unwrap().push((url.to_string(), ok));
        })
        .await
        .unwrap();

    let mut seen = seen.into_inner().unwrap();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("https://a.example/broken".to_string(), false),
            ("https://a.example/ok".to_string(), true),
        ]
    );
}

#[tokio::test]
async fn test_embed_images_inlines_data_uris() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(
            ResponseTemplate::new(200).set_body_bytes(b"\x89PNG\r\n\x1a\nfakepixels".to_vec()),
        )
        .mount(&server)
        .await;

    let image_url = format!("{}/logo.png", server.uri());
    let page = format!(
        r#"<html><head><title>Gallery</title></head><body>
        <p>The logo at {image_url} is shown below.</p>
        <img src="{image_url}" alt="logo">
        </body></html>"#
    );

    let renderer = Arc::new(MockRenderer::new().with_page("https://a.example/gallery", &page));
    let crawler = crawler_with(renderer);
    let cfg = CrawlerConfig {
        embed_images: true,
        output_format: OutputFormat::Html,
        ..CrawlerConfig::default()
    };

    let results = crawler
        .crawl(&["https://a.example/gallery".to_string()], &cfg)
        .await
        .unwrap();
    let html = &results["https://a.example/gallery"];

    assert!(html.contains("data:image/png;base64,"));
    // Substitution is textual, so the URL in the paragraph is replaced
    // along with the tag attribute
    assert!(!html.contains(&image_url));
}

#[tokio::test]
async fn test_relative_src_and_absolute_mention_both_substituted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fakepng".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let page_url = format!("{}/article", server.uri());
    let absolute = format!("{}/logo.png", server.uri());
    let page = format!(
        r#"<html><head><title>Gallery</title></head><body>
        <p>The image lives at {absolute} on this host.</p>
        <img src="/logo.png" alt="logo">
        </body></html>"#
    );

    let renderer = Arc::new(MockRenderer::new().with_page(&page_url, &page));
    let crawler = crawler_with(renderer);
    let cfg = CrawlerConfig {
        embed_images: true,
        output_format: OutputFormat::Html,
        ..CrawlerConfig::default()
    };

    let results = crawler.crawl(&[page_url.clone()], &cfg).await.unwrap();
    let html = &results[&page_url];

    assert!(html.contains("data:image/png;base64,"));
    // The absolute mention in the paragraph is replaced whole, never
    // left as a host prefix glued to a data URI
    assert!(!html.contains(&server.uri()));
    assert!(!html.contains("/logo.png"));
}

#[tokio::test]
async fn test_every_spelling_of_one_image_is_substituted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/logo.png"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fakepng".to_vec()))
        .expect(1)
        .mount(&server)
        .await;

    let page_url = format!("{}/article", server.uri());
    let page = r#"<html><head><title>Gallery</title></head><body>
        <img src="logo.png" alt="one">
        <img src="./logo.png" alt="two">
        </body></html>"#;

    let renderer = Arc::new(MockRenderer::new().with_page(&page_url, page));
    let crawler = crawler_with(renderer);
    let cfg = CrawlerConfig {
        embed_images: true,
        output_format: OutputFormat::Html,
        ..CrawlerConfig::default()
    };

    let results = crawler.crawl(&[page_url.clone()], &cfg).await.unwrap();
    let html = &results[&page_url];

    // Both spellings resolve to one target: one download, two
    // substituted tags, no literal left behind
    assert_eq!(html.matches("data:image/png;base64,").count(), 2);
    assert!(!html.contains("logo.png"));
}

#[tokio::test]
async fn test_missing_image_leaves_content_unchanged() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone.png"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let image_url = format!("{}/gone.png", server.uri());
    let page = format!(
        r#"<html><head><title>Gallery</title></head><body>
        <img src="{image_url}" alt="gone">
        <p>Text around the broken image stays intact.</p>
        </body></html>"#
    );

    let renderer = Arc::new(MockRenderer::new().with_page("https://a.example/gallery", &page));
    let crawler = crawler_with(renderer);
    let cfg = CrawlerConfig {
        embed_images: true,
        output_format: OutputFormat::Html,
        ..CrawlerConfig::default()
    };

    let results = crawler
        .crawl(&["https://a.example/gallery".to_string()], &cfg)
        .await
        .unwrap();
    let html = &results["https://a.example/gallery"];

    assert!(html.contains(&image_url), "failed download must not substitute");
    assert!(!html.contains("data:image/png"));
}

/// Search provider counting invocations
struct CountingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for CountingProvider {
    async fn search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchHit>, CrawlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(vec![SearchHit {
            title: format!("result for {query}"),
            url: "https://example.com/".to_string(),
            snippet: format!("up to {max_results} results"),
        }])
    }
}

#[tokio::test]
async fn test_search_cached_memoizes_by_query_and_limit() {
    let renderer = Arc::new(MockRenderer::new());
    let crawler = crawler_with(renderer);
    let provider = CountingProvider {
        calls: AtomicUsize::new(0),
    };

    let first = crawler
        .search_cached(&provider, "openai", 3, true)
        .await
        .unwrap();
    let second = crawler
        .search_cached(&provider, "openai", 3, true)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    assert!(crawler
        .cache()
        .get(&ContentCache::search_key("openai", 3))
        .is_some());

    // A different limit is a different cache entry
    crawler
        .search_cached(&provider, "openai", 5, true)
        .await
        .unwrap();
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_search_cached_skips_lookup_when_disabled() {
    let renderer = Arc::new(MockRenderer::new());
    let crawler = crawler_with(renderer);
    let provider = CountingProvider {
        calls: AtomicUsize::new(0),
    };

    crawler
        .search_cached(&provider, "rust", 3, false)
        .await
        .unwrap();
    crawler
        .search_cached(&provider, "rust", 3, false)
        .await
        .unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_text_output_format() {
    let renderer = Arc::new(MockRenderer::new().with_page("https://a.example/one", ARTICLE));
    let crawler = crawler_with(renderer);
    let cfg = CrawlerConfig {
        output_format: OutputFormat::Text,
        ..CrawlerConfig::default()
    };

    let results = crawler
        .crawl(&["https://a.example/one".to_string()], &cfg)
        .await
        .unwrap();
    let text = &results["https://a.example/one"];

    assert!(text.contains("Sample Article"));
    assert!(!text.contains('<'), "text output must carry no markup");
    assert!(!text.contains("]("), "text output must carry no markdown links");
}
