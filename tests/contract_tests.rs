use std::collections::HashSet;

use pretty_assertions::assert_eq;

use previewkit::{
    assemble, assemble_with_diagnostics, PathResolver, SourceRewriter, VirtualFile,
    VirtualFileStore,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn store_of(files: &[(&str, &str)]) -> VirtualFileStore {
    VirtualFileStore::from_files(
        files
            .iter()
            .map(|(p, c)| VirtualFile::text(p.to_string(), c.to_string())),
    )
}

fn rewrite(store: &VirtualFileStore, path: &str) -> String {
    SourceRewriter::new().rewrite(path, store, &mut HashSet::new())
}

// ============================================================================
// Path resolution
// ============================================================================

#[test]
fn resolution_survives_missing_leading_slash() {
    let store = store_of(&[("/components/Nav.jsx", "")]);
    let resolver = PathResolver::new();
    assert_eq!(
        resolver.resolve("components/Nav.jsx", &store),
        Some("/components/Nav.jsx".into())
    );
}

#[test]
fn ambiguous_suffix_resolution_is_stable() {
    let store = store_of(&[
        ("/pages/admin/styles.css", ""),
        ("/pages/home/styles.css", ""),
        ("/styles.css", ""),
    ]);
    let resolver = PathResolver::new();
    let winner = resolver.resolve("styles.css", &store);
    assert_eq!(winner, Some("/styles.css".into()));
    for _ in 0..20 {
        assert_eq!(resolver.resolve("styles.css", &store), winner);
    }
}

#[test]
fn extensionless_import_prefers_earlier_suffix() {
    let store = store_of(&[("/Button.js", ""), ("/Button.tsx", "")]);
    let resolver = PathResolver::new();
    assert_eq!(
        resolver.resolve("./Button", &store),
        Some("/Button.js".into())
    );
}

// ============================================================================
// Source rewriting
// ============================================================================

#[test]
fn no_module_syntax_survives_rewriting() {
    let store = store_of(&[
        (
            "/main.js",
            "import React from 'react';\nimport { helper } from './util';\nexport default function main() { return helper(); }",
        ),
        ("/util.js", "export const helper = () => 1;\nexport default helper;"),
    ]);
    let out = rewrite(&store, "/main.js");
    assert!(!out.contains("import "));
    assert!(!out.contains("export "));
    assert!(out.contains("const helper"));
}

#[test]
fn platform_imports_vanish_entirely() {
    let store = store_of(&[(
        "/main.js",
        "import React from 'react';\nimport ReactDOM from 'react-dom/client';\nimport { useState } from 'react';\nconsole.log('ready');",
    )]);
    let out = rewrite(&store, "/main.js");
    assert!(!out.contains("react"));
    assert!(out.contains("console.log('ready')"));
}

#[test]
fn external_package_becomes_require_shim() {
    let store = store_of(&[("/main.js", "import axios from 'axios';\naxios.get('/x');")]);
    let out = rewrite(&store, "/main.js");
    assert!(out.contains(r#"const axios = require("axios")"#));
}

#[test]
fn css_import_becomes_injected_style() {
    let store = store_of(&[
        ("/main.js", "import './theme.css';\nconst a = 1;"),
        ("/theme.css", ".a { color: red; }"),
    ]);
    let out = rewrite(&store, "/main.js");
    assert!(out.contains("document.createElement('style')"));
    assert!(out.contains(".a { color: red; }"));
}

#[test]
fn import_cycles_inline_each_module_once() {
    let store = store_of(&[
        ("/a.js", "import './b';\nconst a = 'A';"),
        ("/b.js", "import './a';\nconst b = 'B';"),
    ]);
    let out = rewrite(&store, "/a.js");
    assert_eq!(out.matches("const a = 'A'").count(), 1);
    assert_eq!(out.matches("const b = 'B'").count(), 1);
}

#[test]
fn diamond_imports_inline_the_shared_module_once() {
    let store = store_of(&[
        ("/entry.js", "import './left';\nimport './right';"),
        ("/left.js", "import './shared';\nconst left = 1;"),
        ("/right.js", "import './shared';\nconst right = 1;"),
        ("/shared.js", "const shared = 'once';"),
    ]);
    let out = rewrite(&store, "/entry.js");
    assert_eq!(out.matches("const shared = 'once'").count(), 1);
}

// ============================================================================
// Assembly contracts
// ============================================================================

#[test]
fn assembled_document_is_self_contained() {
    let store = store_of(&[
        (
            "/index.html",
            r#"<html><head><link rel="stylesheet" href="app.css"></head><body><script src="/app.js"></script></body></html>"#,
        ),
        ("/app.js", "import { x } from './lib';\nconsole.log(x);"),
        ("/lib.js", "export const x = 42;"),
        ("/app.css", "h1 { font-size: 2rem; }"),
    ]);
    let html = assemble(&store);
    // No local references survive; everything is inline or a CDN URL.
    assert!(!html.contains("href=\"app.css\""));
    assert!(!html.contains("src=\"/app.js\""));
    assert!(html.contains("h1 { font-size: 2rem; }"));
    assert!(html.contains("const x = 42;"));
}

#[test]
fn broken_references_degrade_with_diagnostics() {
    let store = store_of(&[(
        "/index.html",
        r#"<html><head><link rel="stylesheet" href="missing.css"></head><body><script src="/missing.js"></script></body></html>"#,
    )]);
    let (html, diagnostics) = assemble_with_diagnostics(&store);
    assert!(html.contains("<html"));
    assert!(!html.contains("missing.css"));
    assert!(!html.contains("missing.js"));
    assert_eq!(diagnostics.len(), 2);
}

#[test]
fn synthesized_shell_runs_the_app_component() {
    let store = store_of(&[(
        "/App.jsx",
        "export default function App() { return <h1>hi</h1>; }",
    )]);
    let html = assemble(&store);
    assert!(html.contains("<div id=\"root\">"));
    assert!(html.contains("type=\"text/babel\""));
    assert!(html.contains("function App() { return <h1>hi</h1>; }"));
}

#[test]
fn no_entry_point_is_reported_without_bootstrap() {
    let store = store_of(&[("/notes.txt", "not a web app")]);
    let html = assemble(&store);
    assert!(html.contains("No entry point"));
    assert!(!html.contains("unpkg.com"));
}
