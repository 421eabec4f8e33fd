//! The staged generation workflow: prompt → analysis → PRD → code.
//!
//! Each stage streams tokens from a completion service into observable
//! state, so a host can render progress live. The final stage's output is
//! parsed as a JSON file list and merged into the virtual project in one
//! atomic patch. Failures and cancellations reset the step to `Idle` and
//! leave the store untouched.

use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::provider::ProviderConfig;
use crate::store::VirtualFileStore;
use crate::VirtualFile;

// ---------------------------------------------------------------------------
// Prompts
// ---------------------------------------------------------------------------

pub const ANALYSIS_SYSTEM_PROMPT: &str = "You are a senior product engineer. \
Analyze the user's app request: identify the core features, the screens or \
views involved, the data the app manages, and any constraints. Respond with \
a concise structured analysis in plain text.";

pub const PRD_SYSTEM_PROMPT: &str = "You are a product manager. Given an app \
request and its analysis, write a short product requirements document: \
goals, user stories, UI layout, and component breakdown. Plain text only.";

pub const CODE_SYSTEM_PROMPT: &str = "You are an expert web developer. \
Implement the app described by the request, analysis, and PRD as a set of \
files for a browser-only React project (no build step, no node_modules). \
Respond with ONLY a JSON array of files, each an object with \"path\" and \
\"content\" string fields. No prose, no markdown fences.";

/// Greedy first-`[` to last-`]` span; tolerates prose around the JSON.
static FILE_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("file list regex"));

// ---------------------------------------------------------------------------
// Service boundary
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("completion request failed: {0}")]
    Request(String),
    #[error("completion stream interrupted: {0}")]
    Interrupted(String),
}

/// Streams completion tokens for a system/user prompt pair. Implementations
/// talk to a vendor API; tests feed canned chunks.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn stream_complete(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        config: &ProviderConfig,
    ) -> Result<mpsc::Receiver<String>, CompletionError>;
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WorkflowStep {
    #[default]
    Idle,
    Analyzing,
    Prd,
    Coding,
    Preview,
    Complete,
}

/// Observable workflow state. `streamed_content` holds the in-flight text
/// of whichever stage is currently streaming.
#[derive(Debug, Clone, Default)]
pub struct WorkflowState {
    pub step: WorkflowStep,
    pub analysis: String,
    pub prd: String,
    pub streamed_content: String,
}

#[derive(Debug)]
pub struct GenerationReport {
    pub files_written: usize,
    pub analysis: String,
    pub prd: String,
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow cancelled")]
    Cancelled,
    #[error(transparent)]
    Completion(#[from] CompletionError),
    #[error("code stage produced no JSON file list")]
    MissingFileList,
    #[error("code stage produced an unparsable file list: {0}")]
    InvalidFileList(#[from] serde_json::Error),
    #[error("code stage produced an empty file list")]
    EmptyFileList,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

pub struct GenerationWorkflow<S> {
    service: Arc<S>,
    store: VirtualFileStore,
    state: Arc<RwLock<WorkflowState>>,
    cancel: Mutex<Option<watch::Sender<bool>>>,
}

impl<S: CompletionService> GenerationWorkflow<S> {
    pub fn new(service: Arc<S>, store: VirtualFileStore) -> Self {
        Self {
            service,
            store,
            state: Arc::new(RwLock::new(WorkflowState::default())),
            cancel: Mutex::new(None),
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state.read().expect("workflow state poisoned").clone()
    }

    /// Cancel the in-flight run, if any. The run resolves with
    /// [`WorkflowError::Cancelled`] without touching the store.
    pub fn cancel(&self) {
        if let Some(sender) = self
            .cancel
            .lock()
            .expect("workflow cancel poisoned")
            .as_ref()
        {
            let _ = sender.send(true);
        }
    }

    /// Run the full pipeline for a user request. At most one run is active
    /// per workflow; starting a new one cancels its predecessor.
    pub async fn run(
        &self,
        request: &str,
        config: &ProviderConfig,
    ) -> Result<GenerationReport, WorkflowError> {
        let mut cancel_rx = self.arm_cancellation();
        let result = self.run_inner(request, config, &mut cancel_rx).await;
        if let Err(err) = &result {
            tracing::warn!(error = %err, "generation workflow failed");
            self.set_step(WorkflowStep::Idle);
        }
        result
    }

    fn arm_cancellation(&self) -> watch::Receiver<bool> {
        let (tx, rx) = watch::channel(false);
        let mut guard = self.cancel.lock().expect("workflow cancel poisoned");
        if let Some(previous) = guard.replace(tx) {
            let _ = previous.send(true);
        }
        rx
    }

    async fn run_inner(
        &self,
        request: &str,
        config: &ProviderConfig,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<GenerationReport, WorkflowError> {
        tracing::info!(provider = ?config.provider, model = config.model(), "starting generation");

        self.set_step(WorkflowStep::Analyzing);
        let analysis = self
            .stream_stage(ANALYSIS_SYSTEM_PROMPT, request, config, cancel_rx)
            .await?;
        self.state
            .write()
            .expect("workflow state poisoned")
            .analysis = analysis.clone();

        self.set_step(WorkflowStep::Prd);
        let prd_input = format!("Request:\n{request}\n\nAnalysis:\n{analysis}");
        let prd = self
            .stream_stage(PRD_SYSTEM_PROMPT, &prd_input, config, cancel_rx)
            .await?;
        self.state.write().expect("workflow state poisoned").prd = prd.clone();

        self.set_step(WorkflowStep::Coding);
        let code_input =
            format!("Request:\n{request}\n\nAnalysis:\n{analysis}\n\nPRD:\n{prd}");
        let code_output = self
            .stream_stage(CODE_SYSTEM_PROMPT, &code_input, config, cancel_rx)
            .await?;

        let files = extract_file_list(&code_output)?;
        let files_written = files.len();
        // One merge call so the store's generation bumps exactly once.
        self.store.merge(files);
        tracing::info!(files_written, "generation produced file patch");

        self.set_step(WorkflowStep::Preview);
        self.set_step(WorkflowStep::Complete);

        Ok(GenerationReport {
            files_written,
            analysis,
            prd,
        })
    }

    /// Stream one stage to completion, mirroring chunks into
    /// `streamed_content` and honoring cancellation between chunks.
    async fn stream_stage(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        config: &ProviderConfig,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<String, WorkflowError> {
        self.state
            .write()
            .expect("workflow state poisoned")
            .streamed_content
            .clear();

        let mut rx = self
            .service
            .stream_complete(system_prompt, user_prompt, config)
            .await?;

        let mut full = String::new();
        loop {
            tokio::select! {
                changed = cancel_rx.changed() => {
                    match changed {
                        Ok(()) if *cancel_rx.borrow() => return Err(WorkflowError::Cancelled),
                        Ok(()) => {}
                        Err(_) => {
                            // Sender replaced by a newer run.
                            return Err(WorkflowError::Cancelled);
                        }
                    }
                }
                chunk = rx.recv() => {
                    match chunk {
                        Some(chunk) => {
                            full.push_str(&chunk);
                            self.state
                                .write()
                                .expect("workflow state poisoned")
                                .streamed_content
                                .push_str(&chunk);
                        }
                        None => break,
                    }
                }
            }
        }
        Ok(full)
    }

    fn set_step(&self, step: WorkflowStep) {
        self.state.write().expect("workflow state poisoned").step = step;
    }
}

/// Pull the `[...]` file list out of the code stage's output and parse it.
pub fn extract_file_list(text: &str) -> Result<Vec<VirtualFile>, WorkflowError> {
    #[derive(Deserialize)]
    struct FilePatch {
        path: String,
        content: String,
    }

    let raw = FILE_LIST_RE
        .find(text)
        .ok_or(WorkflowError::MissingFileList)?
        .as_str();
    let patches: Vec<FilePatch> = serde_json::from_str(raw)?;
    if patches.is_empty() {
        return Err(WorkflowError::EmptyFileList);
    }
    Ok(patches
        .into_iter()
        .map(|p| VirtualFile::text(p.path, p.content))
        .collect())
}
