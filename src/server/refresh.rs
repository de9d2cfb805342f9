//! Periodic auto-refresh policy.
//!
//! An [`AutoRefresh`] pairs an application callback with a schedule. The
//! owning session runs the callback and flushes the container each time the
//! schedule comes due. A tick never overlaps the next one, and missed ticks
//! are not caught up: the next deadline is always measured from the tick that
//! just ran. A callback that returns [`RefreshFault`] or panics cancels the
//! refresh for good.
//!
//! Panics are only caught where they unwind. Under `panic = "abort"` (the
//! release profile of this crate) a panicking callback still aborts the
//! process, so callbacks should report failure through [`RefreshFault`].

use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};

use web_time::{Duration, Instant};

use crate::server::container::LiveContainer;

/// An application failure inside a refresh callback.
///
/// Returning it stops that container's periodic refresh. Other containers are
/// unaffected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshFault {
    message: String,
}

impl RefreshFault {
    /// Creates a fault with a description.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The fault's description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for RefreshFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "refresh callback failed: {}", self.message)
    }
}

impl std::error::Error for RefreshFault {}

/// Callback run on every refresh tick, before the container is flushed.
pub type RefreshCallback = Box<dyn FnMut(&mut LiveContainer) -> Result<(), RefreshFault> + Send>;

/// Schedule and callback of one container's periodic refresh.
pub struct AutoRefresh {
    interval: Duration,
    next_due: Instant,
    callback: RefreshCallback,
    ticks: u64,
}

impl fmt::Debug for AutoRefresh {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoRefresh")
            .field("interval", &self.interval)
            .field("next_due", &self.next_due)
            .field("ticks", &self.ticks)
            .finish_non_exhaustive()
    }
}

impl AutoRefresh {
    /// Schedules the first tick one `interval` after `now`.
    #[must_use]
    pub fn new(interval: Duration, now: Instant, callback: RefreshCallback) -> Self {
        Self {
            interval,
            next_due: now + interval,
            callback,
            ticks: 0,
        }
    }

    /// Time between ticks.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// When the next tick is due.
    #[must_use]
    pub const fn next_due(&self) -> Instant {
        self.next_due
    }

    /// Ticks run so far.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Returns true if a tick is due at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        now >= self.next_due
    }

    /// Runs the callback once against `container` and schedules the next tick
    /// one interval after `now`.
    ///
    /// A panic in the callback is caught and returned as a [`RefreshFault`].
    /// Updates it queued before panicking stay queued.
    pub fn tick(&mut self, container: &mut LiveContainer, now: Instant) -> Result<(), RefreshFault> {
        self.ticks += 1;
        self.next_due = now + self.interval;
        let callback = &mut self.callback;
        catch_unwind(AssertUnwindSafe(|| callback(container))).unwrap_or_else(|payload| {
            Err(RefreshFault::new(format!(
                "callback panicked: {}",
                panic_message(&*payload)
            )))
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string payload")
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
    use crate::network::messages::PropertyValue;
    use crate::ContainerId;

    #[test]
    fn schedule_has_no_catch_up() {
        let start = Instant::now();
        let interval = Duration::from_millis(250);
        let mut refresh = AutoRefresh::new(interval, start, Box::new(|_| Ok(())));
        let mut container = LiveContainer::new(ContainerId::new(1));

        assert!(!refresh.is_due(start));
        assert!(refresh.is_due(start + interval));

        // Late by several intervals: one tick, then a full interval from now.
        let late = start + interval * 5;
        refresh.tick(&mut container, late).unwrap();
        assert_eq!(refresh.next_due(), late + interval);
        assert!(!refresh.is_due(late));
        assert_eq!(refresh.ticks(), 1);
    }

    #[test]
    fn callback_sees_the_container() {
        let mut container = LiveContainer::new(ContainerId::new(1));
        let label = container.register(None);
        let mut count = 0u32;
        let mut refresh = AutoRefresh::new(
            Duration::from_secs(1),
            Instant::now(),
            Box::new(move |c| {
                count += 1;
                c.update_property(label, PropertyValue::Text(count.to_string()));
                Ok(())
            }),
        );
        let now = Instant::now();
        refresh.tick(&mut container, now).unwrap();
        refresh.tick(&mut container, now).unwrap();
        assert_eq!(
            container.element(label).unwrap().state().text.as_deref(),
            Some("2")
        );
    }

    #[test]
    fn fault_is_returned() {
        let mut container = LiveContainer::new(ContainerId::new(1));
        let mut refresh = AutoRefresh::new(
            Duration::from_secs(1),
            Instant::now(),
            Box::new(|_| Err(RefreshFault::new("boom"))),
        );
        let err = refresh
            .tick(&mut container, Instant::now())
            .unwrap_err();
        assert_eq!(err.message(), "boom");
        assert_eq!(err.to_string(), "refresh callback failed: boom");
    }

    #[test]
    fn panic_becomes_a_fault() {
        let mut container = LiveContainer::new(ContainerId::new(1));
        let mut refresh = AutoRefresh::new(
            Duration::from_secs(1),
            Instant::now(),
            Box::new(|_| -> Result<(), RefreshFault> { panic!("bad state {}", 7) }),
        );
        let err = refresh
            .tick(&mut container, Instant::now())
            .unwrap_err();
        assert_eq!(err.message(), "callback panicked: bad state 7");
        assert_eq!(refresh.ticks(), 1);
    }
}
