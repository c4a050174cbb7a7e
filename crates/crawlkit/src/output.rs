//! Flat-file output persistence

use std::path::{Path, PathBuf};
use tracing::debug;

/// Characters stripped from titles before use as filenames
const ILLEGAL_FILENAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum filename stem length in characters
const MAX_FILENAME_CHARS: usize = 200;

/// Derive a safe filename stem from a page title
///
/// Strips characters illegal in filenames, truncates to 200 characters,
/// and falls back to "untitled" when nothing is left.
pub fn sanitize_filename(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !ILLEGAL_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        return "untitled".to_string();
    }
    cleaned.chars().take(MAX_FILENAME_CHARS).collect()
}

/// Write the requested bodies under `dir`, overwriting existing files
pub async fn save_outputs(
    dir: &Path,
    title: &str,
    html: Option<&str>,
    markdown: Option<&str>,
) -> std::io::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir).await?;
    let stem = sanitize_filename(title);
    let mut written = Vec::new();

    if let Some(markdown) = markdown {
        let path = dir.join(format!("{stem}.md"));
        tokio::fs::write(&path, markdown).await?;
        written.push(path);
    }
    if let Some(html) = html {
        let path = dir.join(format!("{stem}.html"));
        tokio::fs::write(&path, html).await?;
        written.push(path);
    }

    debug!(?written, "saved output files");
    Ok(written)
}
