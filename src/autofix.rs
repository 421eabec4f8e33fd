//! The auto-fix loop: runtime errors from the preview are fed back to a
//! completion service that patches the project files.
//!
//! Noise control is the hard part. Benign browser chatter is ignored, and a
//! suppression window prevents the same error from triggering repeated fix
//! requests while a previous fix is still compiling.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use thiserror::Error;

use crate::provider::ProviderConfig;
use crate::store::VirtualFileStore;
use crate::{ConsoleLevel, ConsoleMessage, VirtualFile};

/// Identical error texts within this window trigger at most one fix request.
pub const SUPPRESSION_WINDOW: Duration = Duration::from_secs(5);

/// Substrings of error messages that never warrant a fix.
const BENIGN_PATTERNS: [&str; 4] = [
    "ResizeObserver loop",
    "Script error.",
    "favicon",
    "[previewkit]",
];

#[derive(Debug, Error)]
pub enum FixError {
    #[error("fix request failed: {0}")]
    Request(String),
    #[error("fix service returned an unparsable patch: {0}")]
    InvalidPatch(#[from] serde_json::Error),
}

/// Produces file patches for a runtime error, given the current project.
#[async_trait]
pub trait FixService: Send + Sync {
    async fn fix_code(
        &self,
        files: &[VirtualFile],
        error_text: &str,
        config: &ProviderConfig,
    ) -> Result<Vec<VirtualFile>, FixError>;
}

#[derive(Debug)]
pub struct FixOutcome {
    pub files_patched: usize,
}

pub struct AutoFixLoop<F> {
    service: Arc<F>,
    store: VirtualFileStore,
    last_attempt: Mutex<Option<(String, Instant)>>,
    window: Duration,
}

impl<F: FixService> AutoFixLoop<F> {
    pub fn new(service: Arc<F>, store: VirtualFileStore) -> Self {
        Self::with_window(service, store, SUPPRESSION_WINDOW)
    }

    pub fn with_window(service: Arc<F>, store: VirtualFileStore, window: Duration) -> Self {
        Self {
            service,
            store,
            last_attempt: Mutex::new(None),
            window,
        }
    }

    /// React to a message from the preview. Returns `Ok(None)` when the
    /// message does not warrant a fix (wrong level, benign, suppressed, or
    /// the service had no patch to offer).
    pub async fn handle(
        &self,
        message: &ConsoleMessage,
        config: &ProviderConfig,
    ) -> Result<Option<FixOutcome>, FixError> {
        if message.level != ConsoleLevel::Error {
            return Ok(None);
        }
        if is_benign(&message.message) {
            return Ok(None);
        }
        if !self.record_attempt(&message.message) {
            tracing::debug!("suppressing duplicate error within fix window");
            return Ok(None);
        }

        tracing::info!(error = %first_line(&message.message), "requesting auto-fix");
        let files = self.store.snapshot();
        let patches = self
            .service
            .fix_code(&files, &message.message, config)
            .await?;
        if patches.is_empty() {
            return Ok(None);
        }

        let files_patched = patches.len();
        self.store.merge(patches);
        Ok(Some(FixOutcome { files_patched }))
    }

    /// Record an attempt for this error text. Returns false when an
    /// identical text was already attempted within the window.
    fn record_attempt(&self, error_text: &str) -> bool {
        let mut last = self.last_attempt.lock().expect("fix tracker poisoned");
        let now = Instant::now();
        if let Some((previous, at)) = last.as_ref() {
            if previous == error_text && now.duration_since(*at) < self.window {
                return false;
            }
        }
        *last = Some((error_text.to_string(), now));
        true
    }
}

fn is_benign(message: &str) -> bool {
    BENIGN_PATTERNS.iter().any(|p| message.contains(p))
}

fn first_line(message: &str) -> &str {
    message.lines().next().unwrap_or(message)
}
