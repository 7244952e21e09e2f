//! # Design
//!
//! - Centralize bridge-level errors for registration, decoding and bootstrap.
//! - Keep error messages constant while carrying context fields for debugging.
//! - Preserve source errors without re-logging at call sites.

use tether_events::{ChannelName, EventId};
use thiserror::Error;

use crate::config::ConfigError;
use crate::host::HostError;

/// Result alias for bridge operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge-level error type.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The host refused or could not fulfil a registration.
    #[error("channel registration failed")]
    Registration {
        /// Channel the registration targeted.
        channel: ChannelName,
        /// Source host error.
        source: HostError,
    },
    /// A delivered payload did not match the channel's shape.
    #[error("malformed payload")]
    MalformedPayload {
        /// Channel the envelope arrived on.
        channel: ChannelName,
        /// Host-assigned envelope identifier.
        event_id: EventId,
        /// Source decoding error.
        source: serde_json::Error,
    },
    /// The host delivered an envelope to a handler of a different channel.
    #[error("envelope delivered on the wrong channel")]
    Misrouted {
        /// Channel the handler was registered on.
        expected: ChannelName,
        /// Channel named by the envelope.
        actual: ChannelName,
        /// Host-assigned envelope identifier.
        event_id: EventId,
    },
    /// Configuration could not be loaded.
    #[error("configuration operation failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        source: ConfigError,
    },
    /// Telemetry could not be initialised.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        source: tether_telemetry::TelemetryError,
    },
}

impl BridgeError {
    /// Channel associated with the failure, when there is one.
    #[must_use]
    pub const fn channel(&self) -> Option<ChannelName> {
        match self {
            Self::Registration { channel, .. } | Self::MalformedPayload { channel, .. } => {
                Some(*channel)
            }
            Self::Misrouted { expected, .. } => Some(*expected),
            Self::Config { .. } | Self::Telemetry { .. } => None,
        }
    }

    pub(crate) const fn config(operation: &'static str, source: ConfigError) -> Self {
        Self::Config { operation, source }
    }

    pub(crate) const fn telemetry(
        operation: &'static str,
        source: tether_telemetry::TelemetryError,
    ) -> Self {
        Self::Telemetry { operation, source }
    }
}
