//! In-memory virtual file store: the ground truth for the project.
//!
//! Paths are normalized to a leading `/` on insertion. Keys iterate in
//! sorted order so every downstream consumer (resolver, assembler) sees a
//! deterministic view, which is what makes `assemble` a pure function of
//! the snapshot.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use crate::{FileKind, VirtualFile};

/// Thread-safe path → file map with a generation counter.
///
/// Every mutation bumps the generation; the workspace uses it to coalesce
/// rapid edits into a single debounced recompilation and to invalidate the
/// compiled-document cache.
#[derive(Debug, Clone, Default)]
pub struct VirtualFileStore {
    inner: Arc<RwLock<BTreeMap<String, VirtualFile>>>,
    generation: Arc<AtomicU64>,
}

impl VirtualFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from an initial file set (template load, archive import).
    pub fn from_files(files: impl IntoIterator<Item = VirtualFile>) -> Self {
        let store = Self::new();
        store.merge(files);
        store
    }

    /// Normalize a path to start with `/` and drop a leading `./`.
    pub fn normalize_path(path: &str) -> String {
        let trimmed = path.trim().trim_start_matches("./");
        if trimmed.starts_with('/') {
            trimmed.to_string()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Content lookup. Missing keys return `None`, never an error.
    pub fn get(&self, path: &str) -> Option<String> {
        let map = self.inner.read().expect("file store poisoned");
        map.get(&Self::normalize_path(path)).map(|f| f.content.clone())
    }

    pub fn get_file(&self, path: &str) -> Option<VirtualFile> {
        let map = self.inner.read().expect("file store poisoned");
        map.get(&Self::normalize_path(path)).cloned()
    }

    /// Insert or overwrite a text file at `path`.
    pub fn set(&self, path: &str, content: impl Into<String>) {
        self.insert(VirtualFile {
            path: path.to_string(),
            content: content.into(),
            kind: FileKind::File,
        });
    }

    pub fn insert(&self, file: VirtualFile) {
        let mut map = self.inner.write().expect("file store poisoned");
        let normalized = Self::normalize_path(&file.path);
        map.insert(
            normalized.clone(),
            VirtualFile {
                path: normalized,
                ..file
            },
        );
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Path-keyed overwrite union. Applied as a single mutation so a merged
    /// AI patch set is observed atomically by the debounce logic.
    pub fn merge(&self, files: impl IntoIterator<Item = VirtualFile>) {
        let mut map = self.inner.write().expect("file store poisoned");
        for file in files {
            let normalized = Self::normalize_path(&file.path);
            map.insert(
                normalized.clone(),
                VirtualFile {
                    path: normalized,
                    ..file
                },
            );
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Replace the whole project (template switch).
    pub fn replace_all(&self, files: impl IntoIterator<Item = VirtualFile>) {
        let mut map = self.inner.write().expect("file store poisoned");
        map.clear();
        for file in files {
            let normalized = Self::normalize_path(&file.path);
            map.insert(
                normalized.clone(),
                VirtualFile {
                    path: normalized,
                    ..file
                },
            );
        }
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn contains(&self, path: &str) -> bool {
        let map = self.inner.read().expect("file store poisoned");
        map.contains_key(&Self::normalize_path(path))
    }

    /// All stored paths, sorted.
    pub fn keys(&self) -> Vec<String> {
        let map = self.inner.read().expect("file store poisoned");
        map.keys().cloned().collect()
    }

    /// Full copy of the current project state.
    pub fn snapshot(&self) -> Vec<VirtualFile> {
        let map = self.inner.read().expect("file store poisoned");
        map.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let map = self.inner.read().expect("file store poisoned");
        map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic mutation counter.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}
