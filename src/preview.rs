//! Preview sandbox state: the current document, a debounced update channel,
//! and the console/error feed reported back by the running frame.
//!
//! The sandbox itself is a srcdoc iframe on the host side; this module owns
//! everything the host needs to drive it: what HTML to render, and a parsed,
//! bounded history of the messages it posts back.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::broadcast;

use crate::util::now_ms;
use crate::{ConsoleLevel, ConsoleMessage};

/// Delay between a document submission and it becoming current. Rapid
/// successive submissions collapse into the last one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Maximum retained console messages; older entries are dropped.
pub const CONSOLE_CAP: usize = 100;

const EVENT_CHANNEL_CAP: usize = 64;

/// Messages posted by the preview frame. Anything else is ignored.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum InboundMessage {
    #[serde(rename = "console")]
    Console { level: ConsoleLevel, message: String },
    #[serde(rename = "PREVIEW_ERROR")]
    PreviewError {
        message: String,
        #[serde(default)]
        stack: String,
    },
}

pub struct PreviewSandbox {
    document: RwLock<String>,
    pending: AtomicU64,
    console: RwLock<VecDeque<ConsoleMessage>>,
    events: broadcast::Sender<ConsoleMessage>,
    debounce: Duration,
}

impl Default for PreviewSandbox {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl PreviewSandbox {
    pub fn new(debounce: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAP);
        Self {
            document: RwLock::new(String::new()),
            pending: AtomicU64::new(0),
            console: RwLock::new(VecDeque::with_capacity(CONSOLE_CAP)),
            events,
            debounce,
        }
    }

    /// Submit a new document. Applies after the debounce window unless a
    /// newer submission supersedes it in the meantime.
    pub async fn submit(&self, html: String) {
        let generation = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        tokio::time::sleep(self.debounce).await;
        if self.pending.load(Ordering::SeqCst) == generation {
            self.apply_now(html);
        }
    }

    /// Replace the current document immediately, bypassing the debounce.
    pub fn apply_now(&self, html: String) {
        *self.document.write().expect("sandbox document poisoned") = html;
    }

    pub fn current_document(&self) -> String {
        self.document
            .read()
            .expect("sandbox document poisoned")
            .clone()
    }

    /// Parse a raw postMessage payload from the frame. Unknown shapes are
    /// dropped silently; recognized ones are recorded and broadcast.
    pub fn ingest(&self, raw: &str) -> Option<ConsoleMessage> {
        let inbound: InboundMessage = serde_json::from_str(raw).ok()?;
        let message = match inbound {
            InboundMessage::Console { level, message } => ConsoleMessage {
                level,
                message,
                timestamp_ms: now_ms(),
            },
            InboundMessage::PreviewError { message, stack } => {
                let message = if stack.is_empty() {
                    message
                } else {
                    format!("{message}\n{stack}")
                };
                ConsoleMessage {
                    level: ConsoleLevel::Error,
                    message,
                    timestamp_ms: now_ms(),
                }
            }
        };

        {
            let mut console = self.console.write().expect("sandbox console poisoned");
            if console.len() >= CONSOLE_CAP {
                console.pop_front();
            }
            console.push_back(message.clone());
        }
        // No receivers is fine; the feed is observational.
        let _ = self.events.send(message.clone());
        Some(message)
    }

    /// Subscribe to console/error messages as they arrive.
    pub fn subscribe(&self) -> broadcast::Receiver<ConsoleMessage> {
        self.events.subscribe()
    }

    pub fn console_messages(&self) -> Vec<ConsoleMessage> {
        self.console
            .read()
            .expect("sandbox console poisoned")
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear_console(&self) {
        self.console
            .write()
            .expect("sandbox console poisoned")
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ingest_console_message() {
        let sandbox = PreviewSandbox::default();
        let msg = sandbox
            .ingest(r#"{"type":"console","level":"warn","message":"careful"}"#)
            .unwrap();
        assert!(matches!(msg.level, ConsoleLevel::Warn));
        assert_eq!(msg.message, "careful");
        assert_eq!(sandbox.console_messages().len(), 1);
    }

    #[test]
    fn ingest_preview_error_appends_stack() {
        let sandbox = PreviewSandbox::default();
        let msg = sandbox
            .ingest(r#"{"type":"PREVIEW_ERROR","message":"boom","stack":"at App.js:3"}"#)
            .unwrap();
        assert!(matches!(msg.level, ConsoleLevel::Error));
        assert_eq!(msg.message, "boom\nat App.js:3");
    }

    #[test]
    fn ingest_preview_error_without_stack() {
        let sandbox = PreviewSandbox::default();
        let msg = sandbox
            .ingest(r#"{"type":"PREVIEW_ERROR","message":"boom"}"#)
            .unwrap();
        assert_eq!(msg.message, "boom");
    }

    #[test]
    fn ingest_rejects_unknown_shapes() {
        let sandbox = PreviewSandbox::default();
        assert!(sandbox.ingest("not json").is_none());
        assert!(sandbox.ingest(r#"{"type":"resize","w":100}"#).is_none());
        assert!(sandbox.console_messages().is_empty());
    }

    #[test]
    fn console_history_is_bounded() {
        let sandbox = PreviewSandbox::default();
        for i in 0..(CONSOLE_CAP + 10) {
            let raw = format!(r#"{{"type":"console","level":"log","message":"m{i}"}}"#);
            sandbox.ingest(&raw);
        }
        let messages = sandbox.console_messages();
        assert_eq!(messages.len(), CONSOLE_CAP);
        assert_eq!(messages[0].message, "m10");
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_submissions_collapse_to_last() {
        let sandbox = std::sync::Arc::new(PreviewSandbox::default());

        let first = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.submit("one".into()).await })
        };
        tokio::time::sleep(Duration::from_millis(100)).await;
        let second = {
            let sandbox = sandbox.clone();
            tokio::spawn(async move { sandbox.submit("two".into()).await })
        };

        first.await.unwrap();
        second.await.unwrap();
        assert_eq!(sandbox.current_document(), "two");
    }

    #[test]
    fn subscribers_receive_ingested_messages() {
        let sandbox = PreviewSandbox::default();
        let mut rx = sandbox.subscribe();
        sandbox.ingest(r#"{"type":"console","level":"error","message":"bad"}"#);
        let received = rx.try_recv().unwrap();
        assert_eq!(received.message, "bad");
    }
}
