//! Import specifier resolution against the virtual file store.
//!
//! Resolution is best-effort and forgiving: relative, absolute, alias, and
//! bare specifiers all funnel through the same candidate ladder, and a miss
//! means "external module", never a fatal error.
//!
//! **Invariants:**
//! - Resolving the same specifier against an unchanged store always yields
//!   the same path (idempotence).
//! - Ambiguous suffix matches break deterministically: shortest stored path
//!   wins, equal lengths break lexicographically.

use crate::store::VirtualFileStore;
use crate::util::has_extension;

/// Extension candidates probed, in order, for specifiers without one.
pub const CANDIDATE_SUFFIXES: [&str; 7] =
    ["", ".js", ".jsx", ".ts", ".tsx", "/index.js", "/index.ts"];

/// Default alias prefix mapped to the project root.
pub const DEFAULT_ALIAS_PREFIX: &str = "@/";

/// Resolves import specifiers to stored paths.
#[derive(Debug, Clone)]
pub struct PathResolver {
    alias_prefix: String,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self {
            alias_prefix: DEFAULT_ALIAS_PREFIX.to_string(),
        }
    }
}

impl PathResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias_prefix(prefix: impl Into<String>) -> Self {
        Self {
            alias_prefix: prefix.into(),
        }
    }

    /// Resolve `specifier` to a stored path, or `None` for external modules.
    pub fn resolve(&self, specifier: &str, store: &VirtualFileStore) -> Option<String> {
        let spec = specifier.trim();
        if spec.is_empty() {
            return None;
        }

        // Alias specifiers are rooted at the project top.
        let spec = spec.strip_prefix(self.alias_prefix.as_str()).unwrap_or(spec);

        let keys = store.keys();
        if has_extension(spec) {
            return Self::resolve_exact(spec, &keys);
        }
        for suffix in CANDIDATE_SUFFIXES {
            let probe = format!("{spec}{suffix}");
            if let Some(path) = Self::resolve_exact(&probe, &keys) {
                return Some(path);
            }
        }
        None
    }

    /// The candidate ladder for a single probe string:
    /// 1. exact key match
    /// 2. exact match with the leading `/` toggled
    /// 3. exact match after stripping `./` and `/`
    /// 4. case-insensitive exact match
    /// 5. suffix match (`/probe` tail or verbatim tail), tie-broken by
    ///    shortest path then lexicographic order
    fn resolve_exact(probe: &str, keys: &[String]) -> Option<String> {
        if keys.iter().any(|k| k.as_str() == probe) {
            return Some(probe.to_string());
        }

        let toggled = match probe.strip_prefix('/') {
            Some(rest) => rest.to_string(),
            None => format!("/{probe}"),
        };
        if let Some(key) = keys.iter().find(|k| **k == toggled) {
            return Some(key.clone());
        }

        let cleaned = probe.trim_start_matches("./").trim_start_matches('/');
        if let Some(key) = keys.iter().find(|k| k.as_str() == cleaned) {
            return Some(key.clone());
        }

        let lowered = [
            probe.to_ascii_lowercase(),
            toggled.to_ascii_lowercase(),
            format!("/{}", cleaned.to_ascii_lowercase()),
        ];
        if let Some(key) = keys
            .iter()
            .find(|k| lowered.contains(&k.to_ascii_lowercase()))
        {
            return Some(key.clone());
        }

        if cleaned.is_empty() {
            return None;
        }
        let slash_suffix = format!("/{cleaned}");
        keys.iter()
            .filter(|k| k.ends_with(&slash_suffix) || k.ends_with(cleaned))
            .min_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::VirtualFile;

    fn store_with(paths: &[&str]) -> VirtualFileStore {
        VirtualFileStore::from_files(
            paths
                .iter()
                .map(|p| VirtualFile::text(p.to_string(), String::new())),
        )
    }

    #[test]
    fn exact_match() {
        let store = store_with(&["/App.js"]);
        let resolver = PathResolver::new();
        assert_eq!(resolver.resolve("/App.js", &store), Some("/App.js".into()));
    }

    #[test]
    fn leading_slash_toggle() {
        let store = store_with(&["/App.js"]);
        let resolver = PathResolver::new();
        assert_eq!(resolver.resolve("App.js", &store), Some("/App.js".into()));
    }

    #[test]
    fn relative_specifier() {
        let store = store_with(&["/components/Button.jsx"]);
        let resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve("./components/Button.jsx", &store),
            Some("/components/Button.jsx".into())
        );
    }

    #[test]
    fn case_insensitive_match() {
        let store = store_with(&["/App.js"]);
        let resolver = PathResolver::new();
        assert_eq!(resolver.resolve("/app.js", &store), Some("/App.js".into()));
    }

    #[test]
    fn extension_probing() {
        let store = store_with(&["/components/Button.jsx"]);
        let resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve("./components/Button", &store),
            Some("/components/Button.jsx".into())
        );
    }

    #[test]
    fn index_probing() {
        let store = store_with(&["/utils/index.js"]);
        let resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve("./utils", &store),
            Some("/utils/index.js".into())
        );
    }

    #[test]
    fn alias_prefix_is_rooted() {
        let store = store_with(&["/src/lib/api.js"]);
        let resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve("@/lib/api", &store),
            Some("/src/lib/api.js".into())
        );
    }

    #[test]
    fn bare_package_is_external() {
        let store = store_with(&["/App.js"]);
        let resolver = PathResolver::new();
        assert_eq!(resolver.resolve("lodash", &store), None);
    }

    #[test]
    fn suffix_tie_break_prefers_shortest_path() {
        let store = store_with(&["/deep/nested/Button.jsx", "/ui/Button.jsx"]);
        let resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve("Button.jsx", &store),
            Some("/ui/Button.jsx".into())
        );
    }

    #[test]
    fn suffix_tie_break_is_lexicographic_on_equal_length() {
        let store = store_with(&["/b/Button.jsx", "/a/Button.jsx"]);
        let resolver = PathResolver::new();
        assert_eq!(
            resolver.resolve("Button.jsx", &store),
            Some("/a/Button.jsx".into())
        );
    }

    #[test]
    fn resolution_is_idempotent() {
        let store = store_with(&["/x/styles.css", "/y/styles.css"]);
        let resolver = PathResolver::new();
        let first = resolver.resolve("styles.css", &store);
        for _ in 0..10 {
            assert_eq!(resolver.resolve("styles.css", &store), first);
        }
    }
}
