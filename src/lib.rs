//! # previewkit
//!
//! In-memory project compiler and live-preview pipeline for AI-generated
//! web apps. Takes a flat map of virtual source files (HTML/CSS/JSX with
//! imports and external libraries) and produces a single executable HTML
//! document that can run inside a sandboxed frame.
//!
//! The pipeline stays available rather than strictly correct: unresolved
//! imports degrade to runtime shims, assembly failures become a visible
//! Build Error document, and runtime errors are captured and fed back into
//! an AI repair step instead of crashing the host.
//!
//! # Architecture
//!
//! ```text
//! prompt → GenerationWorkflow → VirtualFileStore → DocumentAssembler
//!        (streamed AI stages)        ↑                  (PathResolver +
//!                                    │                   SourceRewriter)
//!                              AutoFixLoop ← PreviewSandbox ← compiled HTML
//! ```

pub mod archive;
pub mod assemble;
pub mod autofix;
pub mod persist;
pub mod preview;
pub mod provider;
pub mod resolve;
pub mod rewrite;
pub mod runtime;
pub mod store;
pub mod util;
pub mod workflow;
pub mod workspace;

use serde::{Deserialize, Serialize};

pub use assemble::{assemble, assemble_with_diagnostics, AssembleError, DocumentAssembler};
pub use autofix::{AutoFixLoop, FixError, FixOutcome, FixService};
pub use preview::PreviewSandbox;
pub use provider::{Provider, ProviderConfig};
pub use resolve::PathResolver;
pub use rewrite::SourceRewriter;
pub use store::VirtualFileStore;
pub use workflow::{
    CompletionError, CompletionService, GenerationReport, GenerationWorkflow, WorkflowError,
    WorkflowState, WorkflowStep,
};
pub use workspace::Workspace;

// ---------------------------------------------------------------------------
// Virtual File
// ---------------------------------------------------------------------------

/// A single entry in the virtual project: path-keyed source text.
///
/// `content` is raw UTF-8 text for source files, or a `data:` URI string for
/// binary assets imported from an archive. `kind` defaults to `File` so
/// AI-generated `{path, content}` patches deserialize directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub kind: FileKind,
}

impl VirtualFile {
    pub fn text(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            kind: FileKind::File,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    #[default]
    File,
    Directory,
}

// ---------------------------------------------------------------------------
// Console Messages
// ---------------------------------------------------------------------------

/// A message captured from the sandboxed preview: console output or an
/// uncaught error forwarded by the injected capture script.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleMessage {
    pub level: ConsoleLevel,
    pub message: String,
    /// Milliseconds since the Unix epoch, assigned at ingestion.
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleLevel {
    Error,
    Warn,
    Log,
    Info,
}

// ---------------------------------------------------------------------------
// Diagnostic
// ---------------------------------------------------------------------------

/// A structured diagnostic emitted during assembly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub context: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Error,
    Warning,
    Info,
}
