//! Image embedding pipeline
//!
//! Discovers `<img>` references in extracted HTML, downloads them with
//! bounded concurrency, and rewrites both the HTML and markdown bodies
//! to carry the images inline as data URIs. Substitution is literal
//! string replacement of the source and resolved URLs, so every textual
//! occurrence is rewritten, inside image tags or not. A failed download
//! only drops that image from substitution.

use crate::DEFAULT_USER_AGENT;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use regex::Regex;
use reqwest::header::COOKIE;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};
use url::Url;

/// Maximum image downloads in flight for one page
pub const MAX_CONCURRENT_DOWNLOADS: usize = 20;

/// Per-image download timeout
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// One discovered image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    /// The literal `src` attribute value
    pub src: String,
    /// `src` resolved against the page URL
    pub resolved: String,
    /// The `alt` attribute value, empty when absent
    pub alt: String,
    /// The full tag body as matched
    pub raw_tag: String,
}

/// Result of one embedding pass
#[derive(Debug, Clone)]
pub struct EmbedOutcome {
    pub html: String,
    pub markdown: String,
    /// Images found in the HTML
    pub discovered: usize,
    /// Images successfully downloaded and substituted
    pub embedded: usize,
}

fn img_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<img\b[^>]*>").expect("img pattern is valid"))
}

/// Scan HTML for image references, resolving each `src` against the
/// base URL. Inline `data:` sources and unresolvable ones are skipped.
/// Duplicates are reported once per distinct `(src, resolved)` pair, so
/// two spellings of the same target each get their literal substituted.
pub fn discover_images(html: &str, base: &Url) -> Vec<ImageRef> {
    let mut seen = std::collections::HashSet::new();
    let mut images = Vec::new();

    for tag_match in img_tag_pattern().find_iter(html) {
        let raw_tag = tag_match.as_str();
        let Some(src) = crate::convert::extract_attribute(raw_tag, "src") else {
            continue;
        };
        let src = src.trim().to_string();
        if src.is_empty() || src.starts_with("data:") {
            continue;
        }
        let Ok(resolved) = base.join(&src) else {
            debug!(%src, "skipping unresolvable image source");
            continue;
        };
        let resolved = resolved.to_string();
        if !seen.insert((src.clone(), resolved.clone())) {
            continue;
        }
        images.push(ImageRef {
            src,
            resolved,
            alt: crate::convert::extract_attribute(raw_tag, "alt").unwrap_or_default(),
            raw_tag: raw_tag.to_string(),
        });
    }
    images
}

/// Download the discovered images and substitute them into both bodies
///
/// Cookie and user-agent context from the rendering engine is applied
/// when available; its absence only disables authenticated downloads.
pub async fn embed_images(
    html: &str,
    markdown: &str,
    base_url: &str,
    user_agent: Option<&str>,
    cookies: &[(String, String)],
) -> EmbedOutcome {
    let unchanged = |discovered| EmbedOutcome {
        html: html.to_string(),
        markdown: markdown.to_string(),
        discovered,
        embedded: 0,
    };

    let base = match Url::parse(base_url) {
        Ok(base) => base,
        Err(err) => {
            warn!(%base_url, error = %err, "cannot resolve images without a base URL");
            return unchanged(0);
        }
    };

    let images = discover_images(html, &base);
    if images.is_empty() {
        return unchanged(0);
    }
    let discovered = images.len();

    let client = match reqwest::Client::builder()
        .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
        .timeout(DOWNLOAD_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            warn!(error = %err, "image download client unavailable");
            return unchanged(discovered);
        }
    };

    let cookie_header = cookies
        .iter()
        .map(|(name, value)| format!("{name}={value}"))
        .collect::<Vec<_>>()
        .join("; ");

    // Download each distinct resolved URL once even when several tags
    // spell it differently
    let mut downloads: Vec<String> = Vec::new();
    let mut queued = std::collections::HashSet::new();
    for image in &images {
        if queued.insert(image.resolved.clone()) {
            downloads.push(image.resolved.clone());
        }
    }

    let semaphore = Arc::new(Semaphore::new(MAX_CONCURRENT_DOWNLOADS));
    let mut tasks = Vec::with_capacity(downloads.len());
    for resolved in downloads {
        let client = client.clone();
        let cookie_header = cookie_header.clone();
        let semaphore = Arc::clone(&semaphore);
        tasks.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            let data_uri = download_as_data_uri(&client, &cookie_header, &resolved).await?;
            Some((resolved, data_uri))
        }));
    }

    let mut fetched = std::collections::HashMap::new();
    for task in tasks {
        if let Ok(Some((resolved, data_uri))) = task.await {
            fetched.insert(resolved, data_uri);
        }
    }

    let mut embedded = 0usize;
    let mut seen_literals = std::collections::HashSet::new();
    let mut substitutions: Vec<(&str, &str)> = Vec::new();
    for image in &images {
        let Some(data_uri) = fetched.get(&image.resolved) else {
            continue;
        };
        embedded += 1;
        for literal in [image.resolved.as_str(), image.src.as_str()] {
            if seen_literals.insert(literal) {
                substitutions.push((literal, data_uri.as_str()));
            }
        }
    }

    // Longer literals first: a relative `src` is a substring of its
    // resolved URL, and one spelling of a target can be a substring of
    // another. Replacing the shorter one first would mangle the longer
    // occurrences instead of substituting them.
    substitutions.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut html = html.to_string();
    let mut markdown = markdown.to_string();
    for (literal, data_uri) in substitutions {
        html = html.replace(literal, data_uri);
        markdown = markdown.replace(literal, data_uri);
    }

    info!(
        discovered,
        embedded,
        ratio = embedded as f64 / discovered as f64,
        "image embedding finished"
    );

    EmbedOutcome {
        html,
        markdown,
        discovered,
        embedded,
    }
}

/// Fetch one image and encode it as a data URI; any failure yields None
async fn download_as_data_uri(
    client: &reqwest::Client,
    cookie_header: &str,
    url: &str,
) -> Option<String> {
    let mut request = client.get(url);
    if !cookie_header.is_empty() {
        request = request.header(COOKIE, cookie_header);
    }

    let response = match request.send().await {
        Ok(response) => response,
        Err(err) => {
            debug!(%url, error = %err, "image download failed");
            return None;
        }
    };
    if !response.status().is_success() {
        debug!(%url, status = %response.status(), "image download rejected");
        return None;
    }
    let bytes = match response.bytes().await {
        Ok(bytes) => bytes,
        Err(err) => {
            debug!(%url, error = %err, "image body read failed");
            return None;
        }
    };

    let mime = mime_from_url(url);
    Some(format!("data:{mime};base64,{}", BASE64.encode(&bytes)))
}

/// MIME type from the URL's file extension
pub fn mime_from_url(url: &str) -> &'static str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "bmp" => "image/bmp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
