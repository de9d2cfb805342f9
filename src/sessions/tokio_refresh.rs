//! Tokio driver for periodic container refresh.
//!
//! [`ServerSession`] is synchronous: refreshes only run when
//! [`poll_refresh`](ServerSession::poll_refresh) is called. In a tokio
//! application, [`spawn_auto_refresh`] runs that poll on a fixed cadence from a
//! background task.
//!
//! # Example
//!
//! ```no_run
//! use livegump::{spawn_auto_refresh, ContainerId, LoopbackTransport, PropertyValue, SessionBuilder};
//! use parking_lot::Mutex;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (transport, _inbox) = LoopbackTransport::pair();
//!     let session = Arc::new(Mutex::new(SessionBuilder::new().start_server_session(transport)?));
//!
//!     let gump = ContainerId::new(0x4000_0001);
//!     {
//!         let mut server = session.lock();
//!         let clock = server.open_container(gump)?.register(Some("clock"));
//!         let mut seconds = 0u32;
//!         server.start_periodic_refresh(gump, Duration::from_secs(1), move |container| {
//!             seconds += 1;
//!             container.update_property(clock, PropertyValue::Text(seconds.to_string()));
//!             Ok(())
//!         })?;
//!     }
//!
//!     let task = spawn_auto_refresh(Arc::clone(&session), Duration::from_millis(100));
//!     tokio::time::sleep(Duration::from_secs(5)).await;
//!     task.abort();
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;
use web_time::Duration;

use crate::sessions::server_session::ServerSession;
use crate::Transport;

/// Handle to a running refresh driver. Dropping it does not stop the task.
#[derive(Debug)]
#[must_use = "the driver runs until aborted; keep the handle to stop it"]
pub struct AutoRefreshTask {
    handle: JoinHandle<()>,
}

impl AutoRefreshTask {
    /// Stops the driver. Refreshes already registered stay registered.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Returns true once the driver has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// The underlying tokio task.
    pub fn into_join_handle(self) -> JoinHandle<()> {
        self.handle
    }
}

/// Spawns a task that calls [`ServerSession::poll_refresh`] every `period`.
///
/// `period` bounds the scheduling jitter of every refresh on the session; it
/// should be well below the shortest refresh interval. The session lock is
/// held only for the poll itself.
///
/// # Panics
/// Panics if called outside a tokio runtime, or if `period` is zero.
pub fn spawn_auto_refresh<Tr>(
    session: Arc<Mutex<ServerSession<Tr>>>,
    period: Duration,
) -> AutoRefreshTask
where
    Tr: Transport + 'static,
{
    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let now = ticker.tick().await.into_std();
            let ran = session.lock().poll_refresh(now);
            if ran > 0 {
                trace!(ran, "auto refresh poll");
            }
        }
    });
    AutoRefreshTask { handle }
}
