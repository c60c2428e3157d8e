//! Message protocol with the embedding host
//!
//! An embedder drives the session with `action`-tagged messages and observes
//! it through `event`-tagged notifications, mirroring a cross-origin message
//! channel. The `EventSink` trait is the seam: production hosts forward
//! events over a channel, tests capture them, headless use discards them.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core_types::{Flavor, SubmissionStatus};

/// Inbound host message.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum HostMessage {
    /// Request a snapshot of the current session state.
    Get,
    /// Apply the supplied fields to the session.
    Set {
        #[serde(default)]
        source_code: Option<String>,
        #[serde(default)]
        language_id: Option<i64>,
        #[serde(default)]
        flavor: Option<Flavor>,
        #[serde(default)]
        stdin: Option<String>,
        #[serde(default)]
        stdout: Option<String>,
        #[serde(default)]
        compiler_options: Option<String>,
        #[serde(default)]
        command_line_arguments: Option<String>,
        #[serde(default)]
        api_key: Option<String>,
    },
    /// Trigger a dispatch of the current source.
    Run,
}

/// Outbound host event.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum HostEvent {
    Initialised,
    /// Full request snapshot, emitted before the network call is made.
    PreExecution {
        source_code: String,
        language_id: i64,
        flavor: Flavor,
        stdin: String,
        compiler_options: String,
        command_line_arguments: String,
    },
    /// Terminal result, after normalization.
    PostExecution {
        status: SubmissionStatus,
        time: Option<f64>,
        memory: Option<f64>,
        output: String,
    },
    RunError {
        message: String,
        status: u16,
    },
    GetResponse {
        source_code: String,
        language_id: i64,
        flavor: Flavor,
        stdin: String,
        stdout: String,
        compiler_options: String,
        command_line_arguments: String,
    },
}

#[async_trait]
pub trait EventSink: Send + Sync {
    async fn emit(&self, event: HostEvent);
}

/// Forwards events to an unbounded channel owned by the host.
pub struct ChannelSink {
    sender: tokio::sync::mpsc::UnboundedSender<HostEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, tokio::sync::mpsc::UnboundedReceiver<HostEvent>) {
        let (sender, receiver) = tokio::sync::mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl EventSink for ChannelSink {
    async fn emit(&self, event: HostEvent) {
        if self.sender.send(event).is_err() {
            log::warn!("host event receiver dropped, discarding event");
        }
    }
}

/// Discards every event; for headless callers that only want return values.
pub struct NullSink;

#[async_trait]
impl EventSink for NullSink {
    async fn emit(&self, _event: HostEvent) {}
}

/// Records events in memory; test observer.
#[derive(Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<HostEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<HostEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSink for RecordingSink {
    async fn emit(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}
