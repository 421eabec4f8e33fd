//! Regex-based source rewriting: the transpiler-lite that turns a module
//! graph into a single inline script.
//!
//! Applied per file, in order:
//! 1. Export normalization: `export default` bindings dropped, declaration
//!    exports stripped to plain declarations, re-exports converted to
//!    runtime-shim destructures, bare export lists deleted.
//! 2. Import resolution: CSS imports inline a `<style>`-appending snippet,
//!    resolvable imports splice the (recursively rewritten) module body in
//!    place, platform globals are elided, and everything else becomes a
//!    synchronous `require()` against the runtime shim registry.
//!
//! A visited set guards cycles: a file seen twice contributes empty text the
//! second time. Availability over correctness; rewriting never fails.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::resolve::PathResolver;
use crate::store::VirtualFileStore;
use crate::util::escape_js_template_literal;

/// Modules provided as browser globals by the runtime bootstrap; their
/// imports are deleted outright.
pub const PLATFORM_GLOBALS: [&str; 4] =
    ["react", "react-dom", "react-dom/client", "react/jsx-runtime"];

static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bimport\s+(?:([\w$*\s{},]+?)\s*from\s*)?["']([^"']+)["']\s*;?"#)
        .expect("import regex")
});

static EXPORT_FROM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bexport\s*\{([^}]*)\}\s*from\s*["']([^"']+)["']\s*;?"#).expect("export-from regex")
});

static EXPORT_STAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\bexport\s*\*\s*(?:as\s+[\w$]+\s*)?from\s*["']([^"']+)["']\s*;?"#)
        .expect("export-star regex")
});

static EXPORT_DEFAULT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s+default\s+").expect("export-default regex"));

static EXPORT_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bexport\s*\{[^}]*\}\s*;?").expect("export-list regex"));

static EXPORT_DECL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bexport\s+(const|let|var|async|function|class|type|interface|enum)\b")
        .expect("export-decl regex")
});

// ---------------------------------------------------------------------------
// Import clause shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum ImportClause {
    SideEffect,
    Default(String),
    Named(Vec<NamedBinding>),
    Namespace(String),
    DefaultAndNamed(String, Vec<NamedBinding>),
    DefaultAndNamespace(String, String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct NamedBinding {
    imported: String,
    local: String,
}

fn parse_named_list(raw: &str) -> Vec<NamedBinding> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let part = part.strip_prefix("type ").unwrap_or(part).trim();
            match part.split_once(" as ") {
                Some((imported, local)) => NamedBinding {
                    imported: imported.trim().to_string(),
                    local: local.trim().to_string(),
                },
                None => NamedBinding {
                    imported: part.to_string(),
                    local: part.to_string(),
                },
            }
        })
        .collect()
}

fn parse_clause(raw: Option<&str>) -> ImportClause {
    let raw = match raw {
        Some(r) => r.trim(),
        None => return ImportClause::SideEffect,
    };
    if raw.is_empty() {
        return ImportClause::SideEffect;
    }
    if let Some(inner) = raw.strip_prefix('{') {
        return ImportClause::Named(parse_named_list(inner.trim_end_matches('}')));
    }
    if let Some(rest) = raw.strip_prefix('*') {
        let name = rest.trim().strip_prefix("as").map(str::trim).unwrap_or("");
        return ImportClause::Namespace(name.to_string());
    }
    if let Some((default, rest)) = raw.split_once(',') {
        let default = default.trim().to_string();
        let rest = rest.trim();
        if let Some(inner) = rest.strip_prefix('{') {
            return ImportClause::DefaultAndNamed(
                default,
                parse_named_list(inner.trim_end_matches('}')),
            );
        }
        if let Some(ns) = rest.strip_prefix('*') {
            let name = ns.trim().strip_prefix("as").map(str::trim).unwrap_or("");
            return ImportClause::DefaultAndNamespace(default, name.to_string());
        }
        return ImportClause::Default(default);
    }
    ImportClause::Default(raw.to_string())
}

fn destructure_pattern(bindings: &[NamedBinding]) -> String {
    bindings
        .iter()
        .map(|b| {
            if b.imported == b.local {
                b.imported.clone()
            } else {
                format!("{}: {}", b.imported, b.local)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build the `require()` statement(s) that replace an unresolved import,
/// preserving the left-hand-side binding shape.
fn require_statement(clause: &ImportClause, specifier: &str) -> String {
    match clause {
        ImportClause::SideEffect => format!("require(\"{specifier}\");"),
        ImportClause::Default(name) | ImportClause::Namespace(name) => {
            format!("const {name} = require(\"{specifier}\");")
        }
        ImportClause::Named(bindings) => format!(
            "const {{ {} }} = require(\"{specifier}\");",
            destructure_pattern(bindings)
        ),
        ImportClause::DefaultAndNamed(default, bindings) => format!(
            "const {default} = require(\"{specifier}\");\nconst {{ {} }} = require(\"{specifier}\");",
            destructure_pattern(bindings)
        ),
        ImportClause::DefaultAndNamespace(default, ns) => format!(
            "const {default} = require(\"{specifier}\");\nconst {ns} = require(\"{specifier}\");"
        ),
    }
}

/// Self-executing snippet that appends a `<style>` element with the CSS text.
fn inline_style_snippet(source_path: &str, css: &str) -> String {
    format!(
        "(function() {{\n  var style = document.createElement('style');\n  style.setAttribute('data-source', '{}');\n  style.textContent = `{}`;\n  document.head.appendChild(style);\n}})();",
        source_path,
        escape_js_template_literal(css)
    )
}

/// Strip export syntax, keeping declarations intact.
fn normalize_exports(source: &str) -> String {
    // Re-exports become runtime-shim destructures.
    let source = EXPORT_FROM_RE.replace_all(source, |caps: &Captures| {
        let bindings = parse_named_list(&caps[1]);
        format!(
            "const {{ {} }} = require(\"{}\");",
            destructure_pattern(&bindings),
            &caps[2]
        )
    });
    let source = EXPORT_STAR_RE.replace_all(&source, |caps: &Captures| {
        format!("require(\"{}\");", &caps[1])
    });
    // The default-export binding itself is discarded; callers relying on a
    // named default-export identifier will break (documented limitation).
    let source = EXPORT_DEFAULT_RE.replace_all(&source, "");
    let source = EXPORT_LIST_RE.replace_all(&source, "");
    EXPORT_DECL_RE.replace_all(&source, "$1").into_owned()
}

// ---------------------------------------------------------------------------
// SourceRewriter
// ---------------------------------------------------------------------------

/// Rewrites one stored module (and, recursively, everything it imports)
/// into a single self-contained script body.
#[derive(Debug, Clone, Default)]
pub struct SourceRewriter {
    resolver: PathResolver,
}

impl SourceRewriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(resolver: PathResolver) -> Self {
        Self { resolver }
    }

    /// Rewrite the file at `path`. The visited set is shared across the
    /// whole inlining pass for one entry point; a path seen twice
    /// contributes empty text the second time (cycle guard).
    pub fn rewrite(
        &self,
        path: &str,
        store: &VirtualFileStore,
        visited: &mut HashSet<String>,
    ) -> String {
        let normalized = VirtualFileStore::normalize_path(path);
        if !visited.insert(normalized.clone()) {
            return String::new();
        }
        let source = match store.get(&normalized) {
            Some(source) => source,
            None => return String::new(),
        };
        let source = normalize_exports(&source);
        self.rewrite_imports(&source, store, visited)
    }

    fn rewrite_imports(
        &self,
        source: &str,
        store: &VirtualFileStore,
        visited: &mut HashSet<String>,
    ) -> String {
        let mut out = String::with_capacity(source.len());
        let mut last = 0;
        for caps in IMPORT_RE.captures_iter(source) {
            let whole = caps.get(0).expect("match 0");
            out.push_str(&source[last..whole.start()]);
            out.push_str(&self.replace_import(&caps, store, visited));
            last = whole.end();
        }
        out.push_str(&source[last..]);
        out
    }

    fn replace_import(
        &self,
        caps: &Captures<'_>,
        store: &VirtualFileStore,
        visited: &mut HashSet<String>,
    ) -> String {
        let clause_raw = caps.get(1).map(|m| m.as_str());
        let specifier = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

        if specifier.ends_with(".css") {
            // CSS is looked up by bare filename; a miss is non-fatal.
            let file_name = specifier.rsplit('/').next().unwrap_or(specifier);
            return match self.resolver.resolve(file_name, store) {
                Some(path) => {
                    let css = store.get(&path).unwrap_or_default();
                    inline_style_snippet(&path, &css)
                }
                None => format!("/* stylesheet '{specifier}' not found */"),
            };
        }

        if let Some(resolved) = self.resolver.resolve(specifier, store) {
            let body = self.rewrite(&resolved, store, visited);
            return format!("// inlined: {resolved}\n{body}");
        }

        if PLATFORM_GLOBALS.contains(&specifier) {
            // Provided as a browser global by the runtime bootstrap.
            return String::new();
        }

        require_statement(&parse_clause(clause_raw), specifier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualFile;
    use pretty_assertions::assert_eq;

    fn rewrite_one(files: &[(&str, &str)], entry: &str) -> String {
        let store = VirtualFileStore::from_files(
            files
                .iter()
                .map(|(p, c)| VirtualFile::text(p.to_string(), c.to_string())),
        );
        SourceRewriter::new().rewrite(entry, &store, &mut HashSet::new())
    }

    #[test]
    fn export_default_function_is_stripped() {
        let out = rewrite_one(
            &[("/App.js", "export default function App() { return null }")],
            "/App.js",
        );
        assert_eq!(out, "function App() { return null }");
    }

    #[test]
    fn export_default_class_is_stripped() {
        let out = rewrite_one(&[("/App.js", "export default class App {}")], "/App.js");
        assert_eq!(out, "class App {}");
    }

    #[test]
    fn export_default_expression_drops_binding() {
        let out = rewrite_one(&[("/x.js", "export default 42;")], "/x.js");
        assert_eq!(out, "42;");
    }

    #[test]
    fn export_declaration_keeps_declaration() {
        let out = rewrite_one(
            &[("/x.js", "export const a = 1;\nexport function f() {}")],
            "/x.js",
        );
        assert_eq!(out, "const a = 1;\nfunction f() {}");
    }

    #[test]
    fn bare_export_list_is_deleted() {
        let out = rewrite_one(&[("/x.js", "const a = 1;\nexport { a };")], "/x.js");
        assert_eq!(out, "const a = 1;\n");
    }

    #[test]
    fn re_export_becomes_require_destructure() {
        let out = rewrite_one(&[("/x.js", "export { A, B } from \"some-pkg\";")], "/x.js");
        assert_eq!(out, "const { A, B } = require(\"some-pkg\");");
    }

    #[test]
    fn unresolved_named_import_is_shimmed() {
        let out = rewrite_one(&[("/x.js", "import { foo } from \"unknown-pkg\";")], "/x.js");
        assert_eq!(out, "const { foo } = require(\"unknown-pkg\");");
        assert!(!out.contains("import"));
    }

    #[test]
    fn unresolved_default_import_is_shimmed() {
        let out = rewrite_one(&[("/x.js", "import axios from 'axios';")], "/x.js");
        assert_eq!(out, "const axios = require(\"axios\");");
    }

    #[test]
    fn unresolved_namespace_import_is_shimmed() {
        let out = rewrite_one(&[("/x.js", "import * as d3 from 'd3';")], "/x.js");
        assert_eq!(out, "const d3 = require(\"d3\");");
    }

    #[test]
    fn mixed_default_and_named_splits_into_two_statements() {
        let out = rewrite_one(
            &[("/x.js", "import React, { useState as useS } from 'preact';")],
            "/x.js",
        );
        assert_eq!(
            out,
            "const React = require(\"preact\");\nconst { useState: useS } = require(\"preact\");"
        );
    }

    #[test]
    fn side_effect_import_is_shimmed() {
        let out = rewrite_one(&[("/x.js", "import 'polyfill-pkg';")], "/x.js");
        assert_eq!(out, "require(\"polyfill-pkg\");");
    }

    #[test]
    fn platform_global_imports_are_deleted() {
        let out = rewrite_one(
            &[(
                "/x.js",
                "import React from 'react';\nimport { createRoot } from 'react-dom/client';\nconst a = 1;",
            )],
            "/x.js",
        );
        assert_eq!(out.trim(), "const a = 1;");
    }

    #[test]
    fn local_import_is_inlined() {
        let out = rewrite_one(
            &[
                ("/App.js", "import { add } from './math';\nadd(1, 2);"),
                ("/math.js", "export function add(a, b) { return a + b }"),
            ],
            "/App.js",
        );
        assert!(out.contains("function add(a, b) { return a + b }"));
        assert!(out.contains("add(1, 2);"));
        assert!(!out.contains("import"));
    }

    #[test]
    fn css_import_inlines_style_snippet() {
        let out = rewrite_one(
            &[
                ("/App.js", "import './styles.css';\nconst a = 1;"),
                ("/styles.css", "body { color: red }"),
            ],
            "/App.js",
        );
        assert!(out.contains("document.createElement('style')"));
        assert!(out.contains("body { color: red }"));
        assert!(out.contains("document.head.appendChild"));
    }

    #[test]
    fn missing_css_import_degrades_to_comment() {
        let out = rewrite_one(&[("/App.js", "import './nope.css';")], "/App.js");
        assert_eq!(out, "/* stylesheet './nope.css' not found */");
    }

    #[test]
    fn self_import_terminates() {
        let out = rewrite_one(
            &[("/a.js", "import './a';\nconst a = 1;")],
            "/a.js",
        );
        assert!(out.contains("const a = 1;"));
    }

    #[test]
    fn two_cycle_terminates_with_empty_second_visit() {
        let out = rewrite_one(
            &[
                ("/a.js", "import './b';\nconst a = 1;"),
                ("/b.js", "import './a';\nconst b = 2;"),
            ],
            "/a.js",
        );
        assert!(out.contains("const a = 1;"));
        assert!(out.contains("const b = 2;"));
        // The back-edge contributes nothing.
        assert_eq!(out.matches("const a = 1;").count(), 1);
    }

    #[test]
    fn template_literal_dollars_in_css_are_escaped() {
        let out = rewrite_one(
            &[
                ("/App.js", "import './s.css';"),
                ("/s.css", ".x { content: \"${weird}\" }"),
            ],
            "/App.js",
        );
        assert!(out.contains("\\${weird}"));
    }
}
