//! Configuration types for live-update sessions.
//!
//! | Config Type | Purpose | Key Presets |
//! |-------------|---------|-------------|
//! | `CodecConfig` | Wire envelope and text limits | `default()` |
//! | `RefreshConfig` | Periodic auto-refresh cadence | `fast()`, `relaxed()` |
//!
//! # Example
//!
//! ```
//! use livegump::{CodecConfig, RefreshConfig, SessionBuilder};
//!
//! let builder = SessionBuilder::new()
//!     .with_codec_config(CodecConfig::default())
//!     .with_refresh_config(RefreshConfig::fast());
//! # let _ = builder;
//! ```

use web_time::Duration;

use crate::error::{InvalidConfigKind, LiveGumpError};
use crate::network::codec::MAX_TEXT_LIMIT;
use crate::{DEFAULT_FRAME_ID, MAX_TEXT_LEN};

/// Wire-level settings shared by the encoder and decoder.
///
/// Both ends of a connection must agree on `frame_id`. `max_text_len` bounds
/// text fields in both directions: longer strings are clamped on encode and
/// longer declared lengths are clamped on decode.
///
/// # Forward Compatibility
///
/// New fields may be added to this struct in future versions. Use the
/// `..CodecConfig::default()` pattern when constructing instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "CodecConfig has no effect unless passed to SessionBuilder::with_codec_config()"]
pub struct CodecConfig {
    /// The host protocol's reserved extended-command identifier.
    ///
    /// Default: `0xBF`
    pub frame_id: u8,

    /// Largest text field, in bytes.
    ///
    /// Default: 8192
    pub max_text_len: usize,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            frame_id: DEFAULT_FRAME_ID,
            max_text_len: MAX_TEXT_LEN,
        }
    }
}

impl CodecConfig {
    /// Creates a new `CodecConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `LiveGumpError::InvalidConfig` if `max_text_len` is zero or
    /// above [`MAX_TEXT_LIMIT`], where a full-length label would no longer
    /// fit in one frame.
    pub fn validate(&self) -> Result<(), LiveGumpError> {
        if self.max_text_len == 0 {
            return Err(InvalidConfigKind::ZeroTextLimit.into());
        }
        if self.max_text_len > MAX_TEXT_LIMIT {
            return Err(InvalidConfigKind::TextLimitTooLarge {
                limit: self.max_text_len,
            }
            .into());
        }
        Ok(())
    }
}

/// Cadence of the periodic auto-refresh.
///
/// # Example
///
/// ```
/// use livegump::RefreshConfig;
/// use web_time::Duration;
///
/// let config = RefreshConfig {
///     interval: Duration::from_millis(500),
///     ..RefreshConfig::default()
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use = "RefreshConfig has no effect unless passed to SessionBuilder::with_refresh_config()"]
pub struct RefreshConfig {
    /// Interval used when a refresh is started without an explicit one.
    ///
    /// Default: 1s
    pub interval: Duration,

    /// Shortest interval any refresh may use.
    ///
    /// Default: 100ms
    pub min_interval: Duration,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            min_interval: Duration::from_millis(100),
        }
    }
}

impl RefreshConfig {
    /// Creates a new `RefreshConfig` with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preset for fast-moving displays such as timers and health bars.
    pub fn fast() -> Self {
        Self {
            interval: Duration::from_millis(250),
            ..Self::default()
        }
    }

    /// Preset for slow-moving displays such as scoreboards.
    pub fn relaxed() -> Self {
        Self {
            interval: Duration::from_secs(5),
            ..Self::default()
        }
    }

    /// Checks `interval` against `min_interval`.
    ///
    /// # Errors
    ///
    /// Returns `LiveGumpError::InvalidConfig` if `interval` is shorter than
    /// `min_interval`.
    pub fn check_interval(&self, interval: Duration) -> Result<(), LiveGumpError> {
        if interval < self.min_interval {
            return Err(InvalidConfigKind::RefreshIntervalTooShort {
                interval_ms: interval.as_millis(),
                min_ms: self.min_interval.as_millis(),
            }
            .into());
        }
        Ok(())
    }

    /// Validates the configuration itself.
    ///
    /// # Errors
    ///
    /// Returns `LiveGumpError::InvalidConfig` if `interval` is shorter than
    /// `min_interval`.
    pub fn validate(&self) -> Result<(), LiveGumpError> {
        self.check_interval(self.interval)
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

    #[test]
    fn defaults_validate() {
        assert!(CodecConfig::default().validate().is_ok());
        assert!(RefreshConfig::default().validate().is_ok());
        assert!(RefreshConfig::fast().validate().is_ok());
        assert!(RefreshConfig::relaxed().validate().is_ok());
        assert_eq!(CodecConfig::new().frame_id, 0xBF);
        assert_eq!(CodecConfig::new().max_text_len, 8192);
    }

    #[test]
    fn text_limit_bounds() {
        let zero = CodecConfig {
            max_text_len: 0,
            ..CodecConfig::default()
        };
        assert_eq!(
            zero.validate(),
            Err(LiveGumpError::InvalidConfig {
                kind: InvalidConfigKind::ZeroTextLimit
            })
        );

        let huge = CodecConfig {
            max_text_len: 70_000,
            ..CodecConfig::default()
        };
        assert!(matches!(
            huge.validate(),
            Err(LiveGumpError::InvalidConfig {
                kind: InvalidConfigKind::TextLimitTooLarge { limit: 70_000 }
            })
        ));

        let max = CodecConfig {
            max_text_len: MAX_TEXT_LIMIT,
            ..CodecConfig::default()
        };
        assert!(max.validate().is_ok());

        let prefix_max = CodecConfig {
            max_text_len: u16::MAX as usize,
            ..CodecConfig::default()
        };
        assert!(prefix_max.validate().is_err());
    }

    #[test]
    fn interval_below_minimum_is_rejected() {
        let config = RefreshConfig {
            interval: Duration::from_millis(20),
            ..RefreshConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(LiveGumpError::InvalidConfig {
                kind: InvalidConfigKind::RefreshIntervalTooShort {
                    interval_ms: 20,
                    min_ms: 100
                }
            })
        ));
        assert!(RefreshConfig::default()
            .check_interval(Duration::from_millis(100))
            .is_ok());
    }
}
