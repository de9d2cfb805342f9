use std::sync::Arc;

use crate::error::LiveGumpError;
use crate::network::codec::FrameCodec;
use crate::sessions::client_session::ClientSession;
use crate::sessions::config::{CodecConfig, RefreshConfig};
use crate::sessions::server_session::ServerSession;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{report_violation, Transport};

/// The [`SessionBuilder`] builds both halves of a live-update connection.
///
/// After setting all appropriate values, use one of the `start_*_session`
/// methods to consume the builder. Configuration is validated there.
///
/// ```
/// use livegump::{LoopbackTransport, RefreshConfig, SessionBuilder};
///
/// let (transport, _inbox) = LoopbackTransport::pair();
/// let server = SessionBuilder::new()
///     .with_refresh_config(RefreshConfig::fast())
///     .start_server_session(transport)
///     .expect("default codec config is valid");
/// assert!(server.is_connected());
/// ```
#[must_use = "SessionBuilder must be consumed by calling a start_*_session method"]
pub struct SessionBuilder {
    codec_config: CodecConfig,
    refresh_config: RefreshConfig,
    violation_observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for SessionBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            codec_config,
            refresh_config,
            violation_observer,
        } = self;

        f.debug_struct("SessionBuilder")
            .field("codec_config", codec_config)
            .field("refresh_config", refresh_config)
            .field("has_violation_observer", &violation_observer.is_some())
            .finish()
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionBuilder {
    /// Construct a new builder with all values set to their defaults.
    pub fn new() -> Self {
        Self {
            codec_config: CodecConfig::default(),
            refresh_config: RefreshConfig::default(),
            violation_observer: None,
        }
    }

    /// Sets the wire envelope and text limits. Both ends must agree on them.
    pub fn with_codec_config(mut self, codec_config: CodecConfig) -> Self {
        self.codec_config = codec_config;
        self
    }

    /// Sets the default cadence of periodic refreshes.
    pub fn with_refresh_config(mut self, refresh_config: RefreshConfig) -> Self {
        self.refresh_config = refresh_config;
        self
    }

    /// Sets an observer that receives every protocol anomaly the session
    /// reports, in addition to the `tracing` output.
    ///
    /// ```
    /// use livegump::{telemetry::CollectingObserver, SessionBuilder};
    /// use std::sync::Arc;
    ///
    /// let observer = Arc::new(CollectingObserver::new());
    /// let builder = SessionBuilder::new().with_violation_observer(observer.clone());
    /// # let _ = builder;
    /// assert!(observer.is_empty());
    /// ```
    pub fn with_violation_observer(mut self, observer: Arc<dyn ViolationObserver>) -> Self {
        self.violation_observer = Some(observer);
        self
    }

    fn validate(&self) -> Result<FrameCodec, LiveGumpError> {
        let checked = self
            .codec_config
            .validate()
            .and_then(|()| self.refresh_config.validate());
        if let Err(err) = &checked {
            report_violation!(
                observer: self.violation_observer.as_ref(),
                ViolationSeverity::Error,
                ViolationKind::Configuration,
                "session not started: {}",
                err
            );
        }
        checked?;
        Ok(FrameCodec::new(self.codec_config))
    }

    /// Consumes the builder to create a [`ServerSession`] sending over `transport`.
    ///
    /// # Errors
    /// - Returns [`InvalidConfig`] if a configuration value is out of range.
    ///
    /// [`InvalidConfig`]: LiveGumpError::InvalidConfig
    pub fn start_server_session<Tr: Transport>(
        self,
        transport: Tr,
    ) -> Result<ServerSession<Tr>, LiveGumpError> {
        let codec = self.validate()?;
        Ok(ServerSession::new(
            Some(transport),
            codec,
            self.refresh_config,
            self.violation_observer,
        ))
    }

    /// Consumes the builder to create a [`ServerSession`] with no transport yet.
    ///
    /// Containers can be opened and built right away; flushes discard their
    /// queues until [`ServerSession::connect`] is called.
    ///
    /// # Errors
    /// - Returns [`InvalidConfig`] if a configuration value is out of range.
    ///
    /// [`InvalidConfig`]: LiveGumpError::InvalidConfig
    pub fn start_disconnected_server_session<Tr: Transport>(
        self,
    ) -> Result<ServerSession<Tr>, LiveGumpError> {
        let codec = self.validate()?;
        Ok(ServerSession::new(
            None,
            codec,
            self.refresh_config,
            self.violation_observer,
        ))
    }

    /// Consumes the builder to create a [`ClientSession`].
    ///
    /// # Errors
    /// - Returns [`InvalidConfig`] if a configuration value is out of range.
    ///
    /// [`InvalidConfig`]: LiveGumpError::InvalidConfig
    pub fn start_client_session<H>(self) -> Result<ClientSession<H>, LiveGumpError>
    where
        H: Copy + Eq + Ord + std::fmt::Debug,
    {
        let codec = self.validate()?;
        Ok(ClientSession::new(codec, self.violation_observer))
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
    use crate::error::InvalidConfigKind;
    use crate::network::loopback::LoopbackTransport;
    use crate::telemetry::CollectingObserver;
    use web_time::Duration;

    #[test]
    fn rejects_invalid_codec_config() {
        let err = SessionBuilder::new()
            .with_codec_config(CodecConfig {
                max_text_len: 0,
                ..CodecConfig::default()
            })
            .start_client_session::<u32>()
            .unwrap_err();
        assert_eq!(
            err,
            LiveGumpError::InvalidConfig {
                kind: InvalidConfigKind::ZeroTextLimit
            }
        );
    }

    #[test]
    fn rejects_invalid_refresh_config() {
        let (transport, _inbox) = LoopbackTransport::pair();
        let result = SessionBuilder::new()
            .with_refresh_config(RefreshConfig {
                interval: Duration::from_millis(1),
                ..RefreshConfig::default()
            })
            .start_server_session(transport);
        assert!(matches!(
            result,
            Err(LiveGumpError::InvalidConfig {
                kind: InvalidConfigKind::RefreshIntervalTooShort { .. }
            })
        ));
    }

    #[test]
    fn invalid_config_is_reported_to_the_observer() {
        let observer = Arc::new(CollectingObserver::new());
        let result = SessionBuilder::new()
            .with_violation_observer(observer.clone())
            .with_refresh_config(RefreshConfig {
                interval: Duration::from_millis(1),
                ..RefreshConfig::default()
            })
            .start_disconnected_server_session::<LoopbackTransport>();
        assert!(result.is_err());
        assert_eq!(observer.violations_of_kind(ViolationKind::Configuration).len(), 1);

        let observer = Arc::new(CollectingObserver::new());
        SessionBuilder::new()
            .with_violation_observer(observer.clone())
            .start_client_session::<u32>()
            .unwrap();
        assert!(!observer.has_violation(ViolationKind::Configuration));
    }

    #[test]
    fn codec_config_reaches_the_session() {
        let client = SessionBuilder::new()
            .with_codec_config(CodecConfig {
                frame_id: 0xF0,
                ..CodecConfig::default()
            })
            .start_client_session::<u32>()
            .unwrap();
        assert_eq!(client.codec().config().frame_id, 0xF0);

        let server = SessionBuilder::new()
            .start_disconnected_server_session::<LoopbackTransport>()
            .unwrap();
        assert!(!server.is_connected());
    }
}
