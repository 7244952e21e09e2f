//! Payload schemas carried on host channels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channels::ChannelName;

/// Identifier the host assigns to each delivered envelope.
pub type EventId = u64;

/// Message forwarded from a workspace's app-server session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppServerEvent {
    /// Workspace whose app-server produced the message.
    pub workspace_id: String,
    /// Server-originated message; consumers dispatch on its `method`.
    pub message: AppServerMessage,
}

impl AppServerEvent {
    /// Dispatch tag for the wrapped message.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.message.method
    }
}

/// JSON-RPC style notification or request sent by the app-server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppServerMessage {
    /// Request identifier; absent for notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name identifying the event variant.
    pub method: String,
    /// Method-specific parameters.
    #[serde(default)]
    pub params: Value,
}

impl AppServerMessage {
    /// Whether the server expects a response to this message.
    #[must_use]
    pub const fn is_request(&self) -> bool {
        self.id.is_some()
    }
}

/// Lifecycle of the local dictation model on disk.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DictationModelState {
    /// Model has not been downloaded.
    Missing,
    /// Model download is in flight.
    Downloading,
    /// Model is present and usable.
    Ready,
    /// Last download or load attempt failed.
    Error,
}

/// Byte counters reported while the dictation model downloads.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DictationDownloadProgress {
    /// Expected size, when the server advertised one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// Bytes written so far.
    pub downloaded_bytes: u64,
}

/// Status record emitted on the dictation download channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DictationModelStatus {
    /// Current model state.
    pub state: DictationModelState,
    /// Identifier of the model being tracked.
    pub model_id: String,
    /// Download counters while `state` is `downloading`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<DictationDownloadProgress>,
    /// Failure detail while `state` is `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DictationModelStatus {
    /// Download completion percentage, when the total size is known.
    #[allow(clippy::cast_precision_loss)]
    #[must_use]
    pub fn percent_complete(&self) -> Option<f64> {
        let progress = self.progress?;
        match progress.total_bytes {
            Some(0) | None => None,
            Some(total) => Some((progress.downloaded_bytes as f64 / total as f64) * 100.0),
        }
    }
}

/// Recording state reported by the dictation engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DictationSessionState {
    /// Not capturing audio.
    Idle,
    /// Capturing audio from the microphone.
    Listening,
    /// Transcribing captured audio.
    Processing,
}

/// Events produced by a speech dictation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DictationEvent {
    /// Session moved to a new recording state.
    State {
        /// Updated state.
        state: DictationSessionState,
    },
    /// Input level sample in `0.0..=1.0`.
    Level {
        /// Normalised microphone level.
        value: f32,
    },
    /// Final transcript for the captured audio.
    Transcript {
        /// Transcribed text.
        text: String,
    },
    /// Session failed.
    Error {
        /// Human-readable failure detail.
        message: String,
    },
    /// Session was cancelled before producing a transcript.
    Canceled {
        /// Reason reported by the engine.
        message: String,
    },
}

impl DictationEvent {
    /// Machine-friendly discriminator matching the wire tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::State { .. } => "state",
            Self::Level { .. } => "level",
            Self::Transcript { .. } => "transcript",
            Self::Error { .. } => "error",
            Self::Canceled { .. } => "canceled",
        }
    }
}

/// Chunk of output read from a workspace terminal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TerminalOutput {
    /// Workspace owning the terminal.
    pub workspace_id: String,
    /// Terminal session identifier.
    pub terminal_id: String,
    /// Opaque output chunk; no framing beyond host delivery order.
    pub data: String,
}

/// Host wrapper around a delivered payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventEnvelope<P> {
    /// Host-assigned identifier, monotonic per host.
    pub id: EventId,
    /// Channel the envelope was delivered on.
    pub channel: ChannelName,
    /// Time the host produced the envelope.
    pub timestamp: DateTime<Utc>,
    /// Wrapped payload.
    pub payload: P,
}

/// Envelope as handed over by the host, before payload decoding.
pub type RawEnvelope = EventEnvelope<Value>;

impl<P> EventEnvelope<P> {
    /// Wrap `payload` for delivery on `channel`, stamped with the current time.
    #[must_use]
    pub fn new(id: EventId, channel: ChannelName, payload: P) -> Self {
        Self {
            id,
            channel,
            timestamp: Utc::now(),
            payload,
        }
    }

    /// Strip the envelope, keeping only the payload.
    #[must_use]
    pub fn into_payload(self) -> P {
        self.payload
    }
}
