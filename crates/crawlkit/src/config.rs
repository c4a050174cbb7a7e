//! Crawler configuration

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Final content representation returned to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Markdown derived from the extracted main content
    #[default]
    Markdown,
    /// Normalized HTML of the extracted main content
    Html,
    /// Plain text derived from the extracted main content
    Text,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "html" => Ok(OutputFormat::Html),
            "text" | "txt" => Ok(OutputFormat::Text),
            _ => Err("Invalid format: must be markdown, html or text".to_string()),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Html => write!(f, "html"),
            OutputFormat::Text => write!(f, "text"),
        }
    }
}

/// Immutable per-request crawl configuration
///
/// Every field has a default, so partial JSON bodies and query strings
/// deserialize into a fully populated value. The config is passed by
/// reference into every operation and never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Representation of the returned content
    pub output_format: OutputFormat,
    /// Keep comment sections found on the page
    pub include_comments: bool,
    /// Keep table cell text
    pub include_tables: bool,
    /// Keep image references
    pub include_images: bool,
    /// Render anchors as markdown links instead of plain text
    pub include_links: bool,
    /// Prefer recall over precision: fall back to whole-document
    /// conversion when main-content extraction comes back thin
    pub favor_recall: bool,
    /// Drop repeated markdown blocks
    pub deduplicate: bool,
    /// Prefix the extracted title as a heading
    pub with_metadata: bool,
    /// Skip the cache lookup (the result is still written through)
    pub no_cache: bool,
    /// Persist the extracted HTML to `output_dir`
    pub save_html: bool,
    /// Persist the extracted markdown to `output_dir`
    pub save_markdown: bool,
    /// Directory for persisted output files
    pub output_dir: PathBuf,
    /// Download referenced images and inline them as data URIs
    pub embed_images: bool,
    /// Use the Readability extraction strategy instead of the
    /// density-based one
    pub use_readability: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Markdown,
            include_comments: true,
            include_tables: true,
            include_images: true,
            include_links: true,
            favor_recall: true,
            deduplicate: true,
            with_metadata: true,
            no_cache: false,
            save_html: false,
            save_markdown: false,
            output_dir: PathBuf::from("."),
            embed_images: false,
            use_readability: false,
        }
    }
}
