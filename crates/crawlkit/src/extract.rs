//! Content extraction
//!
//! Two strategies reduce raw page markup to a title and main-content
//! body: a Readability-style one (isolate the main block, then convert)
//! and a text-density one that goes straight to link-preserving
//! markdown. Whatever happens, [`extract`] returns a well-formed result;
//! strategy failures fall back to the raw markup with an empty markdown
//! body.

use crate::config::CrawlerConfig;
use crate::convert::{self, ConvertOptions};
use dom_content_extraction::scraper::Html;
use dom_content_extraction::{extract_content_as_markdown, DensityTree};
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, warn};
use url::Url;

/// Title used when the markup carries none
pub const UNTITLED: &str = "untitled";

/// Below this many characters the density strategy is considered thin
/// and, with `favor_recall`, the whole document is converted instead
const MIN_RECALL_CHARS: usize = 200;

/// Result of one extraction call
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Page title, `"untitled"` when none was found
    pub title: String,
    /// Normalized HTML of the extracted content (raw markup on fallback)
    pub html: String,
    /// Markdown body, possibly empty
    pub markdown: String,
}

/// Extract title and main content from raw markup
///
/// Never fails: any strategy error is logged and answered with the
/// fallback result.
pub fn extract(raw: &str, url: &str, cfg: &CrawlerConfig) -> Extraction {
    let mut extraction = if cfg.use_readability {
        match readability_extract(raw, url, cfg) {
            Ok(extraction) => extraction,
            Err(err) => {
                warn!(%url, error = %err, "extraction strategy failed, using raw markup");
                fallback(raw)
            }
        }
    } else {
        density_extract(raw, cfg)
    };

    if cfg.deduplicate {
        extraction.markdown = dedupe_blocks(&extraction.markdown);
    }
    if cfg.with_metadata
        && !extraction.markdown.is_empty()
        && !extraction.markdown.trim_start().starts_with('#')
    {
        extraction.markdown = format!("# {}\n\n{}", extraction.title, extraction.markdown);
    }
    extraction
}

/// Readability strategy: isolate the main content block, then convert
/// the normalized fragment to markdown
fn readability_extract(raw: &str, url: &str, cfg: &CrawlerConfig) -> Result<Extraction, String> {
    let parsed = Url::parse(url).map_err(|e| format!("invalid base url: {e}"))?;
    let product = readability::extractor::extract(&mut raw.as_bytes(), &parsed)
        .map_err(|e| format!("readability: {e:?}"))?;

    let title = if product.title.trim().is_empty() {
        title_from_markup(raw).unwrap_or_else(|| UNTITLED.to_string())
    } else {
        product.title.trim().to_string()
    };
    let markdown = convert::html_to_markdown(&product.content, &convert_options(cfg));

    Ok(Extraction {
        title,
        html: product.content,
        markdown,
    })
}

/// Density strategy: link-preserving main-content markdown straight
/// from the DOM; title by `<title>` lookup on the raw markup
fn density_extract(raw: &str, cfg: &CrawlerConfig) -> Extraction {
    let document = Html::parse_document(raw);
    let mut markdown = match DensityTree::from_document(&document)
        .and_then(|dtree| extract_content_as_markdown(&dtree, &document))
    {
        Ok(markdown) => markdown,
        Err(err) => {
            debug!(error = %err, "density extraction produced no content");
            String::new()
        }
    };

    if cfg.favor_recall && markdown.trim().len() < MIN_RECALL_CHARS {
        markdown = convert::html_to_markdown(raw, &convert_options(cfg));
    }

    Extraction {
        title: title_from_markup(raw).unwrap_or_else(|| UNTITLED.to_string()),
        html: raw.to_string(),
        markdown,
    }
}

/// Fallback: markup unchanged, empty markdown, pattern-matched title
fn fallback(raw: &str) -> Extraction {
    Extraction {
        title: title_from_markup(raw).unwrap_or_else(|| UNTITLED.to_string()),
        html: raw.to_string(),
        markdown: String::new(),
    }
}

fn convert_options(cfg: &CrawlerConfig) -> ConvertOptions {
    ConvertOptions {
        include_links: cfg.include_links,
        include_images: cfg.include_images,
        include_tables: cfg.include_tables,
        include_comments: cfg.include_comments,
    }
}

/// First `<title>` element of the raw markup, case-insensitive
pub fn title_from_markup(raw: &str) -> Option<String> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| {
        Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("title pattern is valid")
    });
    let title = re.captures(raw)?.get(1)?.as_str();
    let title = convert::clean_whitespace(title);
    if title.is_empty() {
        None
    } else {
        Some(title)
    }
}

/// Drop exact repeats of earlier markdown blocks
fn dedupe_blocks(markdown: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    let blocks: Vec<&str> = markdown
        .split("\n\n")
        .filter(|block| {
            let trimmed = block.trim();
            trimmed.is_empty() || seen.insert(trimmed.to_string())
        })
        .collect();
    blocks.join("\n\n")
}
