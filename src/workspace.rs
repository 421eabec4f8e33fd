//! Workspace orchestration: ties the file store, the assembler, the preview
//! sandbox, and the auto-fix loop together for a single open project.
//!
//! Edits schedule a debounced recompile; compiled documents are cached per
//! store generation so an unchanged project never reassembles.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::assemble;
use crate::autofix::{AutoFixLoop, FixService};
use crate::persist::KeyValueStore;
use crate::preview::PreviewSandbox;
use crate::provider::ProviderConfig;
use crate::store::VirtualFileStore;
use crate::VirtualFile;

/// Storage key for the persisted project snapshot.
pub const PROJECT_KEY: &str = "previewkit.project";

/// Delay between the last edit and the recompile it triggers.
pub const EDIT_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct Workspace {
    store: VirtualFileStore,
    sandbox: Arc<PreviewSandbox>,
    compiled: Arc<DashMap<u64, String>>,
    debounce: Duration,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(VirtualFileStore::new())
    }
}

impl Workspace {
    pub fn new(store: VirtualFileStore) -> Self {
        Self {
            store,
            sandbox: Arc::new(PreviewSandbox::default()),
            compiled: Arc::new(DashMap::new()),
            debounce: EDIT_DEBOUNCE,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn store(&self) -> &VirtualFileStore {
        &self.store
    }

    pub fn sandbox(&self) -> &Arc<PreviewSandbox> {
        &self.sandbox
    }

    /// Apply a single file edit and schedule a recompile.
    pub fn edit(&self, path: &str, content: impl Into<String>) {
        self.store.set(path, content);
        self.schedule_recompile();
    }

    /// Apply a batch of patches as one store generation, then recompile.
    pub fn apply_patches(&self, files: impl IntoIterator<Item = VirtualFile>) {
        self.store.merge(files);
        self.schedule_recompile();
    }

    /// Recompile after the debounce window, unless further edits supersede
    /// this one.
    fn schedule_recompile(&self) {
        let workspace = self.clone();
        let generation = self.store.generation();
        tokio::spawn(async move {
            tokio::time::sleep(workspace.debounce).await;
            if workspace.store.generation() == generation {
                workspace.recompile_now();
            }
        });
    }

    /// Assemble the current project (cached per store generation) and push
    /// it to the sandbox immediately.
    pub fn recompile_now(&self) -> String {
        let generation = self.store.generation();
        let html = self
            .compiled
            .entry(generation)
            .or_insert_with(|| assemble::assemble(&self.store))
            .clone();
        // Stale generations can never be requested again.
        self.compiled.retain(|g, _| *g == generation);
        self.sandbox.apply_now(html.clone());
        html
    }

    /// Listen for preview errors and run them through the auto-fix loop,
    /// recompiling after every applied patch.
    pub fn spawn_autofix<F: FixService + 'static>(
        &self,
        autofix: Arc<AutoFixLoop<F>>,
        config: ProviderConfig,
    ) -> JoinHandle<()> {
        let workspace = self.clone();
        let mut events = self.sandbox.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(message) => match autofix.handle(&message, &config).await {
                        Ok(Some(outcome)) => {
                            tracing::info!(
                                files_patched = outcome.files_patched,
                                "auto-fix applied; recompiling"
                            );
                            workspace.recompile_now();
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(error = %err, "auto-fix request failed");
                        }
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "auto-fix listener lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    /// Persist the project snapshot. Fire-and-forget: serialization errors
    /// are logged, never surfaced.
    pub fn persist_snapshot(&self, storage: &dyn KeyValueStore) {
        match serde_json::to_string(&self.store.snapshot()) {
            Ok(json) => storage.set(PROJECT_KEY, &json),
            Err(err) => tracing::warn!(error = %err, "failed to serialize project snapshot"),
        }
    }

    /// Restore a persisted snapshot. Returns false when storage holds
    /// nothing usable; the current project is left alone in that case.
    pub fn load_snapshot(&self, storage: &dyn KeyValueStore) -> bool {
        let Some(json) = storage.get(PROJECT_KEY) else {
            return false;
        };
        match serde_json::from_str::<Vec<VirtualFile>>(&json) {
            Ok(files) => {
                self.store.replace_all(files);
                self.recompile_now();
                true
            }
            Err(err) => {
                tracing::warn!(error = %err, "ignoring corrupt project snapshot");
                false
            }
        }
    }
}
