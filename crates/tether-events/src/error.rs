//! Channel lookup error primitives.

use std::fmt::{self, Display, Formatter};

/// Error returned when a string does not name a known channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownChannel {
    /// Name that failed to resolve.
    pub name: String,
}

impl Display for UnknownChannel {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("unknown channel name")
    }
}

impl std::error::Error for UnknownChannel {}
