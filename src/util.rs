//! Utility functions shared across the pipeline.
//!
//! - JS string escaping (injection-safe inlining of CSS and source text)
//! - HTML escaping for error documents
//! - URL/extension classification helpers

/// Escape a string for safe embedding inside a JS template literal
/// (backtick string). Escapes backticks, backslashes, and `${`.
pub fn escape_js_template_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push_str("\\\\"),
            '`' => out.push_str("\\`"),
            '$' if chars.peek() == Some(&'{') => {
                out.push_str("\\${");
                chars.next();
            }
            c => out.push(c),
        }
    }
    out
}

/// Escape a string for safe embedding inside a JS double-quoted literal.
pub fn escape_js_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Escape text for embedding in HTML body content.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 16);
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

/// Whether a reference points outside the virtual project and must be left
/// for the network (or is already inline data).
pub fn is_external_url(reference: &str) -> bool {
    let r = reference.trim();
    r.starts_with("http://")
        || r.starts_with("https://")
        || r.starts_with("//")
        || r.starts_with("data:")
        || r.starts_with("blob:")
}

/// Whether the last path segment carries a file extension.
pub fn has_extension(path: &str) -> bool {
    let segment = path.rsplit('/').next().unwrap_or(path);
    match segment.rfind('.') {
        Some(idx) => idx > 0,
        None => false,
    }
}

/// Lowercased extension of a path, without the dot.
pub fn file_extension(path: &str) -> Option<String> {
    let segment = path.rsplit('/').next().unwrap_or(path);
    let idx = segment.rfind('.')?;
    if idx == 0 {
        return None;
    }
    Some(segment[idx + 1..].to_ascii_lowercase())
}

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
