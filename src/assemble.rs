//! Document assembly: turns the virtual project into one executable HTML
//! document for the sandboxed preview.
//!
//! Pipeline per compile:
//! 1. Locate an HTML entry point (or synthesize a shell around `App.js` /
//!    `index.js`; or emit a "no entry point" placeholder).
//! 2. Inline local `<link rel="stylesheet">` as `<style>`, drop preload
//!    hints the sandbox cannot satisfy.
//! 3. Inline local `<script src>` through the source rewriter, switching to
//!    `text/babel` for JSX/module sources.
//! 4. Rewrite local `<img src>` to the stored content (data URIs).
//! 5. Inject the error-capture script as the first child of `<head>` and
//!    append the React/ReactDOM/shim/transpiler bootstrap.
//!
//! Assembly never propagates an error to the caller: any failure becomes a
//! visible Build Error document.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use thiserror::Error;

use crate::resolve::PathResolver;
use crate::rewrite::SourceRewriter;
use crate::runtime;
use crate::store::VirtualFileStore;
use crate::util::{escape_html, file_extension, is_external_url};
use crate::{Diagnostic, DiagnosticLevel};

static LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<link\b[^>]*>").expect("link regex"));

static SCRIPT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script>").expect("script regex"));

static IMG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("img regex"));

/// Errors contained inside `assemble`, converted into a Build Error
/// document, never surfaced to the host.
#[derive(Debug, Error)]
pub enum AssembleError {
    #[error("entry point '{0}' disappeared during assembly")]
    EntryVanished(String),
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Assemble the project into a single HTML document. Infallible by design:
/// failures render as a Build Error document inside the preview.
pub fn assemble(store: &VirtualFileStore) -> String {
    assemble_with_diagnostics(store).0
}

/// Assemble and return the diagnostics collected along the way.
pub fn assemble_with_diagnostics(store: &VirtualFileStore) -> (String, Vec<Diagnostic>) {
    let assembler = DocumentAssembler::new(store);
    let mut diagnostics = Vec::new();
    match assembler.try_assemble(&mut diagnostics) {
        Ok(html) => (html, diagnostics),
        Err(err) => {
            tracing::warn!(error = %err, "assembly failed; rendering build error document");
            diagnostics.push(Diagnostic {
                level: DiagnosticLevel::Error,
                message: err.to_string(),
                context: None,
            });
            (build_error_document(&err.to_string()), diagnostics)
        }
    }
}

/// Shown when assembly itself fails.
pub fn build_error_document(message: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head><title>Build Error</title></head><body style=\"font-family: monospace; padding: 2rem; background: #1e1e1e; color: #f48771;\"><h2>Build Error</h2><pre>{}</pre></body></html>",
        escape_html(message)
    )
}

/// Shown when the project has no usable entry point.
pub fn placeholder_document() -> String {
    "<!DOCTYPE html><html><head><title>Preview</title></head><body style=\"font-family: sans-serif; padding: 2rem; color: #666;\"><div class=\"previewkit-empty\"><h2>No entry point</h2><p>Add an index.html or App.js file to see a preview.</p></div></body></html>".to_string()
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

enum EntryPoint {
    /// An HTML document stored in the project.
    Document(String),
    /// No HTML, but a component/script entry worth wrapping in a shell.
    Synthesized(String),
    Missing,
}

pub struct DocumentAssembler<'a> {
    store: &'a VirtualFileStore,
    resolver: PathResolver,
    rewriter: SourceRewriter,
}

impl<'a> DocumentAssembler<'a> {
    pub fn new(store: &'a VirtualFileStore) -> Self {
        Self {
            store,
            resolver: PathResolver::new(),
            rewriter: SourceRewriter::new(),
        }
    }

    fn try_assemble(&self, diagnostics: &mut Vec<Diagnostic>) -> Result<String, AssembleError> {
        let html = match self.locate_entry() {
            EntryPoint::Document(path) => self
                .store
                .get(&path)
                .ok_or(AssembleError::EntryVanished(path))?,
            EntryPoint::Synthesized(path) => {
                diagnostics.push(Diagnostic {
                    level: DiagnosticLevel::Info,
                    message: format!("synthesized HTML shell around {path}"),
                    context: None,
                });
                synthesized_shell(&path)
            }
            EntryPoint::Missing => return Ok(placeholder_document()),
        };

        let html = ensure_document(&html);
        let html = self.process_links(&html, diagnostics);
        let html = self.process_scripts(&html, diagnostics);
        let html = self.process_images(&html);
        let html = inject_error_capture(&html);
        Ok(self.inject_bootstrap(&html))
    }

    /// `index.html` by suffix match, else any stored `.html`, else a shell
    /// around a known component entry, else nothing.
    fn locate_entry(&self) -> EntryPoint {
        let keys = self.store.keys();
        if let Some(key) = keys
            .iter()
            .find(|k| k.to_ascii_lowercase().ends_with("index.html"))
        {
            return EntryPoint::Document(key.clone());
        }
        if let Some(key) = keys
            .iter()
            .find(|k| k.to_ascii_lowercase().ends_with(".html"))
        {
            return EntryPoint::Document(key.clone());
        }
        for candidate in ["App.js", "App.jsx", "App.tsx", "index.js"] {
            if let Some(path) = self.resolver.resolve(candidate, self.store) {
                return EntryPoint::Synthesized(path);
            }
        }
        EntryPoint::Missing
    }

    fn process_links(&self, html: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
        transform_tags(html, &LINK_RE, |caps| {
            let tag = caps.get(0).expect("match 0").as_str();
            let rel = attr_value(tag, "rel").unwrap_or_default().to_ascii_lowercase();
            // Preload hints would issue requests the sandbox cannot satisfy.
            if matches!(rel.as_str(), "preload" | "modulepreload" | "prefetch") {
                return Some(String::new());
            }
            let href = match attr_value(tag, "href") {
                Some(href) => href,
                None => return None,
            };
            let is_stylesheet = rel == "stylesheet" || href.to_ascii_lowercase().ends_with(".css");
            if !is_stylesheet || is_external_url(&href) {
                return None;
            }
            match self.resolver.resolve(&href, self.store) {
                Some(path) => {
                    let css = self.store.get(&path).unwrap_or_default();
                    Some(format!("<style data-href=\"{href}\">\n{css}\n</style>"))
                }
                None => {
                    diagnostics.push(Diagnostic {
                        level: DiagnosticLevel::Warning,
                        message: format!("stylesheet '{href}' not found; link removed"),
                        context: None,
                    });
                    Some(String::new())
                }
            }
        })
    }

    fn process_scripts(&self, html: &str, diagnostics: &mut Vec<Diagnostic>) -> String {
        transform_tags(html, &SCRIPT_RE, |caps| {
            let attrs = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            let src = match attr_value(attrs, "src") {
                Some(src) => src,
                None => return None, // inline script, leave untouched
            };
            if is_external_url(&src) {
                return None;
            }
            match self.resolver.resolve(&src, self.store) {
                Some(path) => {
                    let code = self
                        .rewriter
                        .rewrite(&path, self.store, &mut HashSet::new());
                    let script_type = attr_value(attrs, "type")
                        .unwrap_or_default()
                        .to_ascii_lowercase();
                    let needs_transpile = matches!(
                        file_extension(&path).as_deref(),
                        Some("jsx") | Some("tsx")
                    ) || script_type == "module";
                    if needs_transpile {
                        Some(format!(
                            "<script type=\"text/babel\" data-presets=\"{}\">\n{}\n</script>",
                            runtime::BABEL_PRESETS,
                            code
                        ))
                    } else {
                        Some(format!("<script>\n{code}\n</script>"))
                    }
                }
                None => {
                    diagnostics.push(Diagnostic {
                        level: DiagnosticLevel::Warning,
                        message: format!("script '{src}' not found; tag removed"),
                        context: None,
                    });
                    Some(String::new())
                }
            }
        })
    }

    fn process_images(&self, html: &str) -> String {
        transform_tags(html, &IMG_RE, |caps| {
            let tag = caps.get(0).expect("match 0").as_str();
            let src = attr_value(tag, "src")?;
            if is_external_url(&src) {
                return None;
            }
            let path = self.resolver.resolve(&src, self.store)?;
            let content = self.store.get(&path)?;
            replace_attr_value(tag, "src", &content)
        })
    }

    fn inject_bootstrap(&self, html: &str) -> String {
        if html.contains(runtime::SHIM_SENTINEL_ATTR) {
            return html.to_string();
        }
        let block = format!(
            "<script crossorigin src=\"{}\"></script>\n<script crossorigin src=\"{}\"></script>\n<script {}=\"true\">\n{}\n</script>\n<script src=\"{}\"></script>\n",
            runtime::REACT_UMD_URL,
            runtime::REACT_DOM_UMD_URL,
            runtime::SHIM_SENTINEL_ATTR,
            runtime::runtime_shim_script(),
            runtime::BABEL_STANDALONE_URL,
        );
        match html.find("</head>") {
            Some(pos) => {
                let mut out = html.to_string();
                out.insert_str(pos, &block);
                out
            }
            None => format!("{html}{block}"),
        }
    }
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

fn synthesized_shell(script_path: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Preview</title>\n</head>\n<body>\n<div id=\"root\"></div>\n<script type=\"module\" src=\"{script_path}\"></script>\n</body>\n</html>\n"
    )
}

/// Promote an HTML fragment to a full document and guarantee a `<head>`.
fn ensure_document(html: &str) -> String {
    let mut html = if html.contains("<html") {
        html.to_string()
    } else {
        format!("<!DOCTYPE html><html><head></head><body>{html}</body></html>")
    };
    if !html.contains("<head") {
        if let Some(open) = html.find("<html") {
            if let Some(end) = html[open..].find('>') {
                html.insert_str(open + end + 1, "<head></head>");
            }
        }
    }
    html
}

/// Insert the error-capture script as the first child of `<head>`.
fn inject_error_capture(html: &str) -> String {
    if html.contains(runtime::CAPTURE_SENTINEL_ATTR) {
        return html.to_string();
    }
    let script = format!(
        "<script {}=\"true\">\n{}\n</script>",
        runtime::CAPTURE_SENTINEL_ATTR,
        runtime::error_capture_script()
    );
    if let Some(open) = html.find("<head") {
        if let Some(end) = html[open..].find('>') {
            let mut out = html.to_string();
            out.insert_str(open + end + 1, &script);
            return out;
        }
    }
    format!("{script}{html}")
}

/// Run `f` over every match of `re`; `None` keeps the original tag,
/// `Some(text)` replaces it (empty string removes it).
fn transform_tags<F>(html: &str, re: &Regex, mut f: F) -> String
where
    F: FnMut(&Captures<'_>) -> Option<String>,
{
    let mut out = String::with_capacity(html.len());
    let mut last = 0;
    for caps in re.captures_iter(html) {
        let whole = caps.get(0).expect("match 0");
        out.push_str(&html[last..whole.start()]);
        match f(&caps) {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&html[last..]);
    out
}

/// Extract an attribute value from a tag's text (quoted or bare).
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let (start, end) = attr_value_span(tag, name)?;
    Some(tag[start..end].to_string())
}

/// Replace an attribute's value in place, preserving the quote style.
fn replace_attr_value(tag: &str, name: &str, new_value: &str) -> Option<String> {
    let (start, end) = attr_value_span(tag, name)?;
    let mut out = String::with_capacity(tag.len() + new_value.len());
    out.push_str(&tag[..start]);
    out.push_str(new_value);
    out.push_str(&tag[end..]);
    Some(out)
}

/// Byte range of an attribute's value within the tag text. The leading
/// `[\s"']` guard keeps `src` from matching inside `data-src`.
fn attr_value_span(tag: &str, name: &str) -> Option<(usize, usize)> {
    let pattern = format!(
        r#"(?i)[\s"']{}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>"']+))"#,
        regex::escape(name)
    );
    let re = Regex::new(&pattern).ok()?;
    let caps = re.captures(tag)?;
    if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
        return Some((m.start(), m.end()));
    }
    let m = caps.get(3)?;
    // A bare value in a self-closing tag drags the slash along; drop it.
    let trimmed = m.as_str().trim_end_matches('/');
    Some((m.start(), m.start() + trimmed.len()))
}
