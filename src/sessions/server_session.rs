//! Connection-scoped server state.
//!
//! A [`ServerSession`] owns the transport slot for one client connection,
//! every live container opened on it, and their periodic refreshes. Dropping
//! the session drops all of it.
//!
//! All methods take `&mut self`, so the per-container critical section is the
//! session borrow itself. Share a session across threads behind a mutex (see
//! `spawn_auto_refresh` with the `tokio` feature).

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, trace};
use web_time::{Duration, Instant};

use crate::error::LiveGumpError;
use crate::network::codec::FrameCodec;
use crate::network::messages::Frame;
use crate::network::snapshot;
use crate::report_violation;
use crate::server::container::{ContainerPhase, LiveContainer};
use crate::server::refresh::{AutoRefresh, RefreshFault};
use crate::sessions::config::RefreshConfig;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{ContainerId, Transport};

/// Server half of a live-update connection.
pub struct ServerSession<Tr: Transport> {
    transport: Option<Tr>,
    containers: BTreeMap<ContainerId, LiveContainer>,
    refreshes: BTreeMap<ContainerId, AutoRefresh>,
    codec: FrameCodec,
    refresh_config: RefreshConfig,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<Tr: Transport> std::fmt::Debug for ServerSession<Tr> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            transport,
            containers,
            refreshes,
            codec,
            refresh_config,
            observer,
        } = self;

        f.debug_struct("ServerSession")
            .field("connected", &transport.as_ref().is_some_and(Tr::is_connected))
            .field("containers", containers)
            .field("refreshes", refreshes)
            .field("codec", codec)
            .field("refresh_config", refresh_config)
            .field("has_observer", &observer.is_some())
            .finish()
    }
}

impl<Tr: Transport> ServerSession<Tr> {
    pub(crate) fn new(
        transport: Option<Tr>,
        codec: FrameCodec,
        refresh_config: RefreshConfig,
        observer: Option<Arc<dyn ViolationObserver>>,
    ) -> Self {
        Self {
            transport,
            containers: BTreeMap::new(),
            refreshes: BTreeMap::new(),
            codec,
            refresh_config,
            observer,
        }
    }

    /// The codec outbound frames are encoded with.
    #[must_use]
    pub const fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// Returns true if a transport is installed and connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(Tr::is_connected)
    }

    /// The installed transport.
    #[must_use]
    pub fn transport(&self) -> Option<&Tr> {
        self.transport.as_ref()
    }

    /// Installs a transport, returning the one it replaced.
    pub fn connect(&mut self, transport: Tr) -> Option<Tr> {
        debug!("transport connected");
        self.transport.replace(transport)
    }

    /// Removes the transport. Later flushes discard their queues.
    pub fn disconnect(&mut self) -> Option<Tr> {
        debug!("transport disconnected");
        self.transport.take()
    }

    /// Starts tracking a container under its instance serial.
    ///
    /// # Errors
    /// - Returns [`ContainerAlreadyOpen`] if the serial is in use.
    ///
    /// [`ContainerAlreadyOpen`]: LiveGumpError::ContainerAlreadyOpen
    pub fn open_container(&mut self, id: ContainerId) -> Result<&mut LiveContainer, LiveGumpError> {
        match self.containers.entry(id) {
            std::collections::btree_map::Entry::Occupied(_) => {
                Err(LiveGumpError::ContainerAlreadyOpen { container: id })
            },
            std::collections::btree_map::Entry::Vacant(entry) => {
                debug!(container = %id, "container opened");
                Ok(entry.insert(LiveContainer::new(id).with_observer(self.observer.clone())))
            },
        }
    }

    /// Borrows an open container.
    #[must_use]
    pub fn container(&self, id: ContainerId) -> Option<&LiveContainer> {
        self.containers.get(&id)
    }

    /// Mutably borrows an open container.
    pub fn container_mut(&mut self, id: ContainerId) -> Option<&mut LiveContainer> {
        self.containers.get_mut(&id)
    }

    /// Serials of every open container, in ascending order.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn container_ids(&self) -> impl Iterator<Item = ContainerId> + '_ {
        self.containers.keys().copied()
    }

    /// Sends or discards one container's queue. Returns the packets sent.
    ///
    /// An unknown serial sends nothing.
    pub fn flush(&mut self, id: ContainerId) -> usize {
        let Some(container) = self.containers.get_mut(&id) else {
            trace!(container = %id, "flush of unknown container");
            return 0;
        };
        let transport = self.transport.as_mut().map(|t| t as &mut dyn Transport);
        container.flush(transport, &self.codec)
    }

    /// Flushes every open container, in serial order.
    pub fn flush_all(&mut self) -> usize {
        let mut sent = 0;
        for container in self.containers.values_mut() {
            let transport = self.transport.as_mut().map(|t| t as &mut dyn Transport);
            sent += container.flush(transport, &self.codec);
        }
        sent
    }

    /// Closes a container: sends Close (if connected), cancels its refresh and
    /// forgets it along with its pending queue.
    ///
    /// # Errors
    /// - Returns [`UnknownContainer`] if no container is open under `id`.
    ///
    /// [`UnknownContainer`]: LiveGumpError::UnknownContainer
    pub fn close_container(&mut self, id: ContainerId) -> Result<(), LiveGumpError> {
        let mut container = self
            .containers
            .remove(&id)
            .ok_or(LiveGumpError::UnknownContainer { container: id })?;
        self.refreshes.remove(&id);
        container.close();

        match self.transport.as_mut().filter(|t| t.is_connected()) {
            Some(transport) => {
                let packet = self.codec.encode(&Frame::Close { container: id })?;
                transport.send(&packet);
            },
            None => trace!(container = %id, "closed without a transport"),
        }
        Ok(())
    }

    /// Starts refreshing `id` at the configured default interval.
    ///
    /// # Errors
    /// - Returns [`UnknownContainer`] if no container is open under `id`.
    ///
    /// [`UnknownContainer`]: LiveGumpError::UnknownContainer
    pub fn start_default_refresh<F>(&mut self, id: ContainerId, callback: F) -> Result<(), LiveGumpError>
    where
        F: FnMut(&mut LiveContainer) -> Result<(), RefreshFault> + Send + 'static,
    {
        let interval = self.refresh_config.interval;
        self.start_periodic_refresh_at(id, interval, Instant::now(), callback)
    }

    /// Starts running `callback` and flushing `id` every `interval`.
    ///
    /// Replaces any refresh already running for the container.
    ///
    /// # Errors
    /// - Returns [`UnknownContainer`] if no container is open under `id`.
    /// - Returns [`InvalidConfig`] if `interval` is below the configured minimum.
    ///
    /// [`UnknownContainer`]: LiveGumpError::UnknownContainer
    /// [`InvalidConfig`]: LiveGumpError::InvalidConfig
    pub fn start_periodic_refresh<F>(
        &mut self,
        id: ContainerId,
        interval: Duration,
        callback: F,
    ) -> Result<(), LiveGumpError>
    where
        F: FnMut(&mut LiveContainer) -> Result<(), RefreshFault> + Send + 'static,
    {
        self.start_periodic_refresh_at(id, interval, Instant::now(), callback)
    }

    /// [`start_periodic_refresh`](Self::start_periodic_refresh) with an
    /// explicit start time; the first tick is due at `now + interval`.
    pub fn start_periodic_refresh_at<F>(
        &mut self,
        id: ContainerId,
        interval: Duration,
        now: Instant,
        callback: F,
    ) -> Result<(), LiveGumpError>
    where
        F: FnMut(&mut LiveContainer) -> Result<(), RefreshFault> + Send + 'static,
    {
        self.refresh_config.check_interval(interval)?;
        let container = self
            .containers
            .get_mut(&id)
            .ok_or(LiveGumpError::UnknownContainer { container: id })?;
        container.open();
        container.set_phase(ContainerPhase::AutoRefreshing);
        self.refreshes
            .insert(id, AutoRefresh::new(interval, now, Box::new(callback)));
        debug!(container = %id, ?interval, "periodic refresh started");
        Ok(())
    }

    /// Stops the periodic refresh of `id`. Returns `false` if none was running.
    pub fn stop_periodic_refresh(&mut self, id: ContainerId) -> bool {
        let stopped = self.refreshes.remove(&id).is_some();
        if stopped {
            if let Some(container) = self.containers.get_mut(&id) {
                container.set_phase(ContainerPhase::Open);
            }
            debug!(container = %id, "periodic refresh stopped");
        }
        stopped
    }

    /// Returns true while `id` has a periodic refresh running.
    #[must_use]
    pub fn is_auto_refreshing(&self, id: ContainerId) -> bool {
        self.refreshes.contains_key(&id)
    }

    /// Earliest instant any refresh comes due.
    #[must_use]
    pub fn next_refresh_due(&self) -> Option<Instant> {
        self.refreshes.values().map(AutoRefresh::next_due).min()
    }

    /// Runs every refresh that is due at `now`. Returns how many ticks ran.
    ///
    /// Each tick runs the callback and then flushes the container. A refresh
    /// cancels itself when the transport is unavailable or its callback fails
    /// or panics; other containers keep refreshing. A panic can only be caught
    /// where panics unwind, so under `panic = "abort"` it still ends the process.
    pub fn poll_refresh(&mut self, now: Instant) -> usize {
        let due: Vec<ContainerId> = self
            .refreshes
            .iter()
            .filter_map(|(id, refresh)| refresh.is_due(now).then_some(*id))
            .collect();

        let mut ticks = 0;
        for id in due {
            if !self.is_connected() {
                self.cancel_refresh(id);
                report_violation!(
                    observer: self.observer.as_ref(),
                    container: id,
                    ViolationSeverity::Warning,
                    ViolationKind::TransportUnavailable,
                    "transport unavailable, periodic refresh cancelled"
                );
                continue;
            }
            let Some(mut refresh) = self.refreshes.remove(&id) else {
                continue;
            };
            let Some(container) = self.containers.get_mut(&id) else {
                continue;
            };

            ticks += 1;
            match refresh.tick(container, now) {
                Ok(()) => {
                    let transport = self.transport.as_mut().map(|t| t as &mut dyn Transport);
                    container.flush(transport, &self.codec);
                    self.refreshes.insert(id, refresh);
                },
                Err(fault) => {
                    container.set_phase(ContainerPhase::Open);
                    report_violation!(
                        observer: self.observer.as_ref(),
                        container: id,
                        ViolationSeverity::Error,
                        ViolationKind::RefreshFault,
                        "periodic refresh cancelled after {} ticks: {}",
                        refresh.ticks(),
                        fault
                    );
                },
            }
        }
        ticks
    }

    fn cancel_refresh(&mut self, id: ContainerId) {
        self.refreshes.remove(&id);
        if let Some(container) = self.containers.get_mut(&id) {
            if container.phase() == ContainerPhase::AutoRefreshing {
                container.set_phase(ContainerPhase::Open);
            }
        }
    }

    /// Serializes the pending queue of `id` for inspection.
    ///
    /// # Errors
    /// - Returns [`UnknownContainer`] if no container is open under `id`.
    /// - Returns [`Snapshot`] if serialization fails.
    ///
    /// [`UnknownContainer`]: LiveGumpError::UnknownContainer
    /// [`Snapshot`]: LiveGumpError::Snapshot
    pub fn snapshot_pending(&self, id: ContainerId) -> Result<Vec<u8>, LiveGumpError> {
        let container = self
            .containers
            .get(&id)
            .ok_or(LiveGumpError::UnknownContainer { container: id })?;
        snapshot::encode_pending(container.pending())
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
    use crate::network::codec::{decode, Decoded};
    use crate::network::loopback::{LoopbackInbox, LoopbackTransport};
    use crate::network::messages::PropertyValue;
    use crate::sessions::builder::SessionBuilder;
    use crate::telemetry::CollectingObserver;

    const GUMP: ContainerId = ContainerId::new(0x4000_0042);

    fn server() -> (
        ServerSession<LoopbackTransport>,
        LoopbackInbox,
        Arc<CollectingObserver>,
    ) {
        let observer = Arc::new(CollectingObserver::new());
        let (transport, inbox) = LoopbackTransport::pair();
        let server = SessionBuilder::new()
            .with_violation_observer(observer.clone())
            .start_server_session(transport)
            .unwrap();
        (server, inbox, observer)
    }

    #[test]
    fn duplicate_open_is_rejected() {
        let (mut server, _, _) = server();
        server.open_container(GUMP).unwrap();
        assert_eq!(
            server.open_container(GUMP).unwrap_err(),
            LiveGumpError::ContainerAlreadyOpen { container: GUMP }
        );
    }

    #[test]
    fn close_sends_close_and_purges() {
        let (mut server, inbox, _) = server();
        let container = server.open_container(GUMP).unwrap();
        let id = container.register(None);
        container.update_property(id, PropertyValue::Hue(5));
        server
            .start_periodic_refresh(GUMP, Duration::from_secs(1), |_| Ok(()))
            .unwrap();

        server.close_container(GUMP).unwrap();
        assert!(server.container(GUMP).is_none());
        assert!(!server.is_auto_refreshing(GUMP));
        let packets = inbox.drain();
        assert_eq!(packets.len(), 1);
        assert_eq!(
            decode(&packets[0]).unwrap().0,
            Decoded::Frame(Frame::Close { container: GUMP })
        );
        assert_eq!(
            server.close_container(GUMP),
            Err(LiveGumpError::UnknownContainer { container: GUMP })
        );
        // The serial is free again.
        assert!(server.open_container(GUMP).is_ok());
    }

    #[test]
    fn refresh_ticks_run_callback_then_flush() {
        let (mut server, inbox, _) = server();
        let label = server.open_container(GUMP).unwrap().register(Some("clock"));
        let start = Instant::now();
        let mut seconds = 0u32;
        server
            .start_periodic_refresh_at(GUMP, Duration::from_secs(1), start, move |c| {
                seconds += 1;
                c.update_property(label, PropertyValue::Text(seconds.to_string()));
                Ok(())
            })
            .unwrap();
        assert_eq!(
            server.container(GUMP).unwrap().phase(),
            ContainerPhase::AutoRefreshing
        );

        assert_eq!(server.poll_refresh(start), 0);
        assert_eq!(server.poll_refresh(start + Duration::from_secs(1)), 1);
        assert_eq!(server.poll_refresh(start + Duration::from_millis(1500)), 0);
        assert_eq!(server.poll_refresh(start + Duration::from_secs(2)), 1);
        assert_eq!(inbox.len(), 2);
        assert_eq!(
            server.next_refresh_due(),
            Some(start + Duration::from_secs(3))
        );
    }

    #[test]
    fn fault_cancels_only_that_container() {
        let (mut server, _, observer) = server();
        let other = ContainerId::new(0x4000_0043);
        server.open_container(GUMP).unwrap();
        server.open_container(other).unwrap();
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        server
            .start_periodic_refresh_at(GUMP, interval, start, |_| {
                Err(RefreshFault::new("scoreboard gone"))
            })
            .unwrap();
        server
            .start_periodic_refresh_at(other, interval, start, |_| Ok(()))
            .unwrap();

        assert_eq!(server.poll_refresh(start + interval), 2);
        assert!(!server.is_auto_refreshing(GUMP));
        assert!(server.is_auto_refreshing(other));
        assert_eq!(server.container(GUMP).unwrap().phase(), ContainerPhase::Open);
        assert!(observer.has_violation(ViolationKind::RefreshFault));
    }

    #[test]
    fn panicking_callback_cancels_only_that_container() {
        let (mut server, inbox, observer) = server();
        let other = ContainerId::new(0x4000_0043);
        server.open_container(GUMP).unwrap();
        let label = server.open_container(other).unwrap().register(None);
        let start = Instant::now();
        let interval = Duration::from_millis(500);
        server
            .start_periodic_refresh_at(GUMP, interval, start, |_| panic!("scoreboard gone"))
            .unwrap();
        server
            .start_periodic_refresh_at(other, interval, start, move |c| {
                c.update_property(label, PropertyValue::Hue(5));
                Ok(())
            })
            .unwrap();

        assert_eq!(server.poll_refresh(start + interval), 2);
        assert!(!server.is_auto_refreshing(GUMP));
        assert!(server.is_auto_refreshing(other));
        assert_eq!(server.container(GUMP).unwrap().phase(), ContainerPhase::Open);
        let faults = observer.violations_of_kind(ViolationKind::RefreshFault);
        assert_eq!(faults.len(), 1);
        assert!(faults[0].message.contains("scoreboard gone"));

        assert_eq!(server.poll_refresh(start + interval * 2), 1);
        assert_eq!(inbox.len(), 2);
    }

    #[test]
    fn disconnect_cancels_refresh() {
        let (mut server, _, observer) = server();
        server.open_container(GUMP).unwrap();
        let start = Instant::now();
        server
            .start_periodic_refresh_at(GUMP, Duration::from_secs(1), start, |_| Ok(()))
            .unwrap();
        assert!(server.disconnect().is_some());
        assert_eq!(server.poll_refresh(start + Duration::from_secs(1)), 0);
        assert!(!server.is_auto_refreshing(GUMP));
        assert!(observer.has_violation(ViolationKind::TransportUnavailable));
    }

    #[test]
    fn interval_below_minimum_is_rejected() {
        let (mut server, _, _) = server();
        server.open_container(GUMP).unwrap();
        let result = server.start_periodic_refresh(GUMP, Duration::from_millis(5), |_| Ok(()));
        assert!(matches!(result, Err(LiveGumpError::InvalidConfig { .. })));
        assert!(matches!(
            server.start_default_refresh(ContainerId::new(1), |_| Ok(())),
            Err(LiveGumpError::UnknownContainer { .. })
        ));
    }

    #[test]
    fn snapshot_of_pending_queue() {
        let (mut server, _, _) = server();
        let container = server.open_container(GUMP).unwrap();
        let id = container.register(None);
        container.update_property(id, PropertyValue::Y(-1));
        container.request_refresh();

        let bytes = server.snapshot_pending(GUMP).unwrap();
        let restored = snapshot::decode_pending(&bytes).unwrap();
        let expected: Vec<_> = server.container(GUMP).unwrap().pending().cloned().collect();
        assert_eq!(restored, expected);
    }
}
