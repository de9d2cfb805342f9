use std::error::Error;
use std::fmt;
use std::fmt::Display;

use crate::network::codec::CodecError;
use crate::ContainerId;

/// Why a configuration value was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum InvalidConfigKind {
    /// `max_text_len` was zero.
    ZeroTextLimit,
    /// `max_text_len` would let a text-carrying frame exceed one packet.
    TextLimitTooLarge {
        /// The configured limit.
        limit: usize,
    },
    /// The refresh interval is shorter than the configured minimum.
    RefreshIntervalTooShort {
        /// The configured interval in milliseconds.
        interval_ms: u128,
        /// The minimum allowed interval in milliseconds.
        min_ms: u128,
    },
}

impl Display for InvalidConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroTextLimit => write!(f, "max_text_len must be greater than zero"),
            Self::TextLimitTooLarge { limit } => {
                write!(f, "max_text_len {} does not fit in one frame", limit)
            },
            Self::RefreshIntervalTooShort {
                interval_ms,
                min_ms,
            } => write!(
                f,
                "refresh interval {}ms is shorter than the minimum {}ms",
                interval_ms, min_ms
            ),
        }
    }
}

/// This enum contains all errors this library can return.
///
/// Most protocol anomalies are deliberately *not* errors: an unresolvable
/// container or a malformed inbound frame degrades to a skipped update and is
/// reported through [`telemetry`](crate::telemetry) instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LiveGumpError {
    /// A configuration value was rejected by the session builder.
    InvalidConfig {
        /// What was wrong with it.
        kind: InvalidConfigKind,
    },
    /// No live container is open under this identifier.
    UnknownContainer {
        /// The identifier that was looked up.
        container: ContainerId,
    },
    /// A container is already open under this identifier.
    ContainerAlreadyOpen {
        /// The identifier that was reused.
        container: ContainerId,
    },
    /// Encoding or decoding a frame failed.
    Codec(CodecError),
    /// Serializing or deserializing a pending-update snapshot failed.
    Snapshot {
        /// A description of what failed.
        context: String,
    },
}

impl Display for LiveGumpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig { kind } => write!(f, "Invalid configuration: {}", kind),
            Self::UnknownContainer { container } => {
                write!(f, "No live container is open under {}", container)
            },
            Self::ContainerAlreadyOpen { container } => {
                write!(f, "A live container is already open under {}", container)
            },
            Self::Codec(err) => write!(f, "Codec error: {}", err),
            Self::Snapshot { context } => write!(f, "Snapshot error: {}", context),
        }
    }
}

impl Error for LiveGumpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Codec(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CodecError> for LiveGumpError {
    fn from(err: CodecError) -> Self {
        Self::Codec(err)
    }
}

impl From<InvalidConfigKind> for LiveGumpError {
    fn from(kind: InvalidConfigKind) -> Self {
        Self::InvalidConfig { kind }
    }
}

#[cfg(test)]
#[allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use crate::network::codec::WireField;

    #[test]
    fn display_names_the_container() {
        let err = LiveGumpError::UnknownContainer {
            container: ContainerId::new(0x10),
        };
        assert!(err.to_string().contains("0x00000010"));
    }

    #[test]
    fn codec_error_is_the_source() {
        let err: LiveGumpError = CodecError::Truncated {
            field: WireField::ElementId,
            needed: 4,
            remaining: 1,
        }
        .into();
        assert!(err.source().is_some());
        assert!(err.to_string().contains("element_id"));
    }

    #[test]
    fn invalid_config_display() {
        let err: LiveGumpError = InvalidConfigKind::RefreshIntervalTooShort {
            interval_ms: 10,
            min_ms: 100,
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("10ms"));
        assert!(msg.contains("100ms"));
        assert!(err.source().is_none());
    }
}
