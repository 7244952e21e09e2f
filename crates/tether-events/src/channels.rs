//! Channel names and the compile-time bindings to their payloads.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UnknownChannel;
use crate::payloads::{AppServerEvent, DictationEvent, DictationModelStatus, TerminalOutput};

/// Wire names of the channels exposed by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelName {
    /// Messages forwarded from workspace app-server sessions.
    AppServerEvent,
    /// Dictation model download status.
    DictationDownload,
    /// Speech dictation session events.
    DictationEvent,
    /// Terminal output chunks.
    TerminalOutput,
    /// Pings asking the client to check for updates.
    UpdaterCheck,
}

impl ChannelName {
    /// Every channel the host exposes.
    pub const ALL: [Self; 5] = [
        Self::AppServerEvent,
        Self::DictationDownload,
        Self::DictationEvent,
        Self::TerminalOutput,
        Self::UpdaterCheck,
    ];

    /// Wire name used by the host registry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AppServerEvent => "app-server-event",
            Self::DictationDownload => "dictation-download",
            Self::DictationEvent => "dictation-event",
            Self::TerminalOutput => "terminal-output",
            Self::UpdaterCheck => "updater-check",
        }
    }
}

impl Display for ChannelName {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for ChannelName {
    type Err = UnknownChannel;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|channel| channel.as_str() == value)
            .ok_or_else(|| UnknownChannel {
                name: value.to_string(),
            })
    }
}

/// Static binding between a channel name and its payload type.
///
/// Implemented by the zero-sized markers below. Adding a channel means adding
/// a [`ChannelName`] variant and one marker; subscription code is generic over
/// this trait and does not change.
pub trait Channel: Send + Sync + 'static {
    /// Wire name of the channel.
    const NAME: ChannelName;

    /// Payload delivered to listeners.
    type Payload: Serialize + DeserializeOwned + Clone + Debug + Send + 'static;

    /// Decode the payload field of a raw envelope.
    ///
    /// # Errors
    ///
    /// Returns an error when the value does not match [`Self::Payload`].
    fn decode(payload: Value) -> Result<Self::Payload, serde_json::Error> {
        serde_json::from_value(payload)
    }
}

/// `app-server-event` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppServerEvents;

impl Channel for AppServerEvents {
    const NAME: ChannelName = ChannelName::AppServerEvent;
    type Payload = AppServerEvent;
}

/// `dictation-download` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DictationDownload;

impl Channel for DictationDownload {
    const NAME: ChannelName = ChannelName::DictationDownload;
    type Payload = DictationModelStatus;
}

/// `dictation-event` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DictationEvents;

impl Channel for DictationEvents {
    const NAME: ChannelName = ChannelName::DictationEvent;
    type Payload = DictationEvent;
}

/// `terminal-output` channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalOutputs;

impl Channel for TerminalOutputs {
    const NAME: ChannelName = ChannelName::TerminalOutput;
    type Payload = TerminalOutput;
}

/// `updater-check` channel. Pure notification; the host payload is ignored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdaterCheck;

impl Channel for UpdaterCheck {
    const NAME: ChannelName = ChannelName::UpdaterCheck;
    type Payload = ();

    fn decode(_payload: Value) -> Result<Self::Payload, serde_json::Error> {
        Ok(())
    }
}
