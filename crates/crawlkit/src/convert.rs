//! HTML conversion utilities
//!
//! Streaming tag-scanner conversion of page markup to markdown or plain
//! text. No line wrapping is applied; block structure comes from the
//! source elements only.

/// Elements whose entire subtree is never rendered
const ALWAYS_SKIP: &[&str] = &["script", "style", "noscript", "iframe", "svg", "head"];

/// Container elements checked for comment-section class/id markers
const COMMENT_CONTAINERS: &[&str] = &["div", "section", "aside", "ol", "ul", "footer"];

/// Elements that never carry content or a closing tag
const VOID_TAGS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "source"];

/// Toggles applied during conversion
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Render anchors as `[text](href)`; otherwise keep only the text
    pub include_links: bool,
    /// Emit `![alt](src)` for image elements
    pub include_images: bool,
    /// Keep table cell text; otherwise skip table subtrees
    pub include_tables: bool,
    /// Keep comment-section subtrees (class/id containing "comment")
    pub include_comments: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_links: true,
            include_images: true,
            include_tables: true,
            include_comments: true,
        }
    }
}

/// Subtree currently being skipped, with nesting depth for same-named
/// descendants
struct SkipFrame {
    tag: String,
    depth: usize,
}

/// Convert HTML to markdown
pub fn html_to_markdown(html: &str, opts: &ConvertOptions) -> String {
    let mut output = String::new();
    let mut skip: Option<SkipFrame> = None;
    let mut list_depth: usize = 0;
    let mut in_pre = false;
    let mut in_blockquote = false;
    // One entry per open <a>; None when the anchor is rendered as text
    let mut link_stack: Vec<Option<String>> = Vec::new();

    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let tag = read_tag(&mut chars);

            if tag.starts_with("!--") {
                consume_comment(&tag, &mut chars);
                continue;
            }

            let tag_lower = tag.to_lowercase();
            let is_closing = tag_lower.starts_with('/');
            let tag_name = tag_name_of(&tag_lower, is_closing);

            if update_skip(&mut skip, tag_name, &tag_lower, is_closing, opts) {
                continue;
            }

            match tag_name {
                "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
                    if !is_closing {
                        let level = tag_name[1..].parse::<usize>().unwrap_or(1);
                        output.push('\n');
                        for _ in 0..level {
                            output.push('#');
                        }
                        output.push(' ');
                    } else {
                        output.push_str("\n\n");
                    }
                }
                "p" | "div" | "section" | "article" | "main" | "header" | "footer" => {
                    if is_closing {
                        output.push_str("\n\n");
                    }
                }
                "br" => output.push('\n'),
                "hr" => output.push_str("\n---\n"),
                "ul" | "ol" => {
                    if is_closing {
                        list_depth = list_depth.saturating_sub(1);
                        if list_depth == 0 {
                            output.push('\n');
                        }
                    } else {
                        list_depth += 1;
                    }
                }
                "li" => {
                    if !is_closing {
                        output.push('\n');
                        for _ in 0..list_depth.saturating_sub(1) {
                            output.push_str("  ");
                        }
                        output.push_str("- ");
                    }
                }
                "strong" | "b" => output.push_str("**"),
                "em" | "i" => output.push('*'),
                "pre" => {
                    output.push_str("\n```\n");
                    in_pre = !is_closing;
                }
                "code" => {
                    if !in_pre {
                        output.push('`');
                    }
                }
                "blockquote" => {
                    if !is_closing {
                        in_blockquote = true;
                        output.push_str("\n> ");
                    } else {
                        in_blockquote = false;
                        output.push('\n');
                    }
                }
                "a" => {
                    if is_closing {
                        if let Some(Some(href)) = link_stack.pop() {
                            output.push_str("](");
                            output.push_str(&href);
                            output.push(')');
                        }
                    } else {
                        let href = if opts.include_links {
                            extract_attribute(&tag, "href").filter(|h| !h.starts_with('#'))
                        } else {
                            None
                        };
                        if href.is_some() {
                            output.push('[');
                        }
                        link_stack.push(href);
                    }
                }
                "img" => {
                    if !is_closing && opts.include_images {
                        if let Some(src) = extract_attribute(&tag, "src") {
                            let alt = extract_attribute(&tag, "alt").unwrap_or_default();
                            output.push_str("![");
                            output.push_str(&alt);
                            output.push_str("](");
                            output.push_str(&src);
                            output.push(')');
                        }
                    }
                }
                "td" | "th" => {
                    if is_closing {
                        output.push(' ');
                    }
                }
                "tr" => {
                    if is_closing {
                        output.push('\n');
                    }
                }
                _ => {}
            }
        } else if skip.is_none() {
            let decoded = decode_entity(c, &mut chars);
            if in_blockquote && decoded == '\n' {
                output.push_str("\n> ");
            } else {
                output.push(decoded);
            }
        }
    }

    clean_whitespace(&output)
}

/// Convert HTML to plain text
pub fn html_to_text(html: &str) -> String {
    let mut output = String::new();
    let mut skip: Option<SkipFrame> = None;
    let opts = ConvertOptions::default();

    let mut chars = html.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '<' {
            let tag = read_tag(&mut chars);

            if tag.starts_with("!--") {
                consume_comment(&tag, &mut chars);
                continue;
            }

            let tag_lower = tag.to_lowercase();
            let is_closing = tag_lower.starts_with('/');
            let tag_name = tag_name_of(&tag_lower, is_closing);

            if update_skip(&mut skip, tag_name, &tag_lower, is_closing, &opts) {
                continue;
            }

            match tag_name {
                "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => output.push('\n'),
                "div" | "li" | "tr" => {
                    if is_closing {
                        output.push('\n');
                    }
                }
                "br" => output.push('\n'),
                _ => {}
            }
        } else if skip.is_none() {
            let decoded = decode_entity(c, &mut chars);
            output.push(decoded);
        }
    }

    clean_whitespace(&output)
}

/// Read a tag body up to the closing `>`
fn read_tag(chars: &mut std::iter::Peekable<std::str::Chars>) -> String {
    let mut tag = String::new();
    while let Some(&next) = chars.peek() {
        if next == '>' {
            chars.next();
            break;
        }
        tag.push(next);
        chars.next();
    }
    tag
}

/// Consume the remainder of an HTML comment when its body contained `>`
fn consume_comment(tag: &str, chars: &mut std::iter::Peekable<std::str::Chars>) {
    if tag.ends_with("--") && tag.len() >= 5 {
        return;
    }
    let mut tail = String::new();
    for c in chars.by_ref() {
        tail.push(c);
        if tail.ends_with("-->") {
            return;
        }
    }
}

fn tag_name_of<'a>(tag_lower: &'a str, is_closing: bool) -> &'a str {
    let body = if is_closing { &tag_lower[1..] } else { tag_lower };
    body.split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or("")
}

/// Maintain the skip frame; returns true when the current tag is part of
/// a skipped subtree
fn update_skip(
    skip: &mut Option<SkipFrame>,
    tag_name: &str,
    tag_lower: &str,
    is_closing: bool,
    opts: &ConvertOptions,
) -> bool {
    if let Some(frame) = skip {
        if tag_name == frame.tag {
            if is_closing {
                frame.depth -= 1;
                if frame.depth == 0 {
                    *skip = None;
                }
            } else if !tag_lower.ends_with('/') {
                frame.depth += 1;
            }
        }
        return true;
    }

    if is_closing || tag_lower.ends_with('/') || VOID_TAGS.contains(&tag_name) {
        return false;
    }

    let start_skip = ALWAYS_SKIP.contains(&tag_name)
        || (!opts.include_tables && tag_name == "table")
        || (!opts.include_comments
            && COMMENT_CONTAINERS.contains(&tag_name)
            && is_comment_container(tag_lower));

    if start_skip {
        *skip = Some(SkipFrame {
            tag: tag_name.to_string(),
            depth: 1,
        });
        return true;
    }

    false
}

/// True when the tag's class or id marks a user-comment section
fn is_comment_container(tag_lower: &str) -> bool {
    ["class", "id"].iter().any(|attr| {
        extract_attribute(tag_lower, attr)
            .map(|v| v.contains("comment"))
            .unwrap_or(false)
    })
}

/// Extract an attribute value from a tag body
///
/// The attribute name is matched byte-wise ASCII case-insensitively so
/// offsets stay valid in the original string; lowercasing the tag can
/// change byte lengths on multibyte characters.
pub(crate) fn extract_attribute(tag: &str, attr: &str) -> Option<String> {
    let pattern = format!("{attr}=");
    let start = tag
        .as_bytes()
        .windows(pattern.len())
        .position(|window| window.eq_ignore_ascii_case(pattern.as_bytes()))?;
    let rest = tag[start + pattern.len()..].trim_start();

    if let Some(rest) = rest.strip_prefix('"') {
        rest.find('"').map(|end| rest[..end].to_string())
    } else if let Some(rest) = rest.strip_prefix('\'') {
        rest.find('\'').map(|end| rest[..end].to_string())
    } else {
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>')
            .unwrap_or(rest.len());
        Some(rest[..end].to_string())
    }
}

/// Decode an HTML entity starting from an ampersand
fn decode_entity(c: char, chars: &mut std::iter::Peekable<std::str::Chars>) -> char {
    if c != '&' {
        return c;
    }

    let mut entity = String::new();
    while let Some(&next) = chars.peek() {
        if next == ';' {
            chars.next();
            break;
        }
        if next.is_whitespace() || entity.len() > 10 {
            // Not a valid entity
            return '&';
        }
        entity.push(next);
        chars.next();
    }

    match entity.as_str() {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "#39" => '\'',
        "nbsp" => ' ',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "copy" => '\u{a9}',
        "reg" => '\u{ae}',
        _ => {
            if let Some(num_str) = entity.strip_prefix('#') {
                if let Some(stripped) = num_str.strip_prefix('x') {
                    if let Ok(code) = u32::from_str_radix(stripped, 16) {
                        if let Some(ch) = char::from_u32(code) {
                            return ch;
                        }
                    }
                } else if let Ok(code) = num_str.parse::<u32>() {
                    if let Some(ch) = char::from_u32(code) {
                        return ch;
                    }
                }
            }
            // Unknown entity
            '&'
        }
    }
}

/// Clean whitespace: collapse runs, trim, keep at most 2 newlines
pub fn clean_whitespace(s: &str) -> String {
    let mut result = String::new();
    let mut last_was_space = false;
    let mut newline_count = 0;

    for c in s.chars() {
        if c == '\n' {
            if last_was_space && result.ends_with(' ') {
                result.pop();
            }
            newline_count += 1;
            last_was_space = true;
            if newline_count <= 2 {
                result.push(c);
            }
        } else if c.is_whitespace() {
            newline_count = 0;
            if !last_was_space {
                result.push(' ');
                last_was_space = true;
            }
        } else {
            newline_count = 0;
            last_was_space = false;
            result.push(c);
        }
    }

    result.trim().to_string()
}
