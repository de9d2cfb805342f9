//! In-process [`Transport`] that delivers packets into a shared inbox.
//!
//! Used by tests and demos in place of a real connection. The inbox side can
//! also toggle the connection state to simulate a client going away.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::Transport;

#[derive(Debug, Default)]
struct Shared {
    packets: Mutex<VecDeque<Vec<u8>>>,
    disconnected: AtomicBool,
    sent: AtomicUsize,
}

/// Sending half of a loopback connection.
#[derive(Debug, Clone)]
pub struct LoopbackTransport {
    shared: Arc<Shared>,
}

/// Receiving half of a loopback connection.
#[derive(Debug, Clone)]
pub struct LoopbackInbox {
    shared: Arc<Shared>,
}

impl LoopbackTransport {
    /// Creates a connected transport and the inbox it delivers to.
    #[must_use]
    pub fn pair() -> (Self, LoopbackInbox) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            LoopbackInbox { shared },
        )
    }
}

impl Transport for LoopbackTransport {
    fn is_connected(&self) -> bool {
        !self.shared.disconnected.load(Ordering::Acquire)
    }

    fn send(&mut self, packet: &[u8]) {
        if !self.is_connected() {
            trace!(len = packet.len(), "loopback disconnected, dropping packet");
            return;
        }
        self.shared.packets.lock().push_back(packet.to_vec());
        self.shared.sent.fetch_add(1, Ordering::Relaxed);
    }
}

impl LoopbackInbox {
    /// Number of packets waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.packets.lock().len()
    }

    /// Returns true if no packets are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shared.packets.lock().is_empty()
    }

    /// Total packets ever delivered, including drained ones.
    #[must_use]
    pub fn total_sent(&self) -> usize {
        self.shared.sent.load(Ordering::Relaxed)
    }

    /// Takes the oldest waiting packet.
    pub fn pop(&self) -> Option<Vec<u8>> {
        self.shared.packets.lock().pop_front()
    }

    /// Takes every waiting packet, oldest first.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        self.shared.packets.lock().drain(..).collect()
    }

    /// Simulates the connection going up or down.
    pub fn set_connected(&self, connected: bool) {
        self.shared.disconnected.store(!connected, Ordering::Release);
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
    fn delivers_in_order() {
        let (mut transport, inbox) = LoopbackTransport::pair();
        transport.send(&[1]);
        transport.send(&[2, 2]);
        assert_eq!(inbox.len(), 2);
        assert_eq!(inbox.pop(), Some(vec![1]));
        assert_eq!(inbox.drain(), vec![vec![2, 2]]);
        assert!(inbox.is_empty());
        assert_eq!(inbox.total_sent(), 2);
    }

    #[test]
    fn disconnected_transport_drops() {
        let (mut transport, inbox) = LoopbackTransport::pair();
        inbox.set_connected(false);
        assert!(!transport.is_connected());
        transport.send(&[9]);
        assert!(inbox.is_empty());

        inbox.set_connected(true);
        transport.send(&[9]);
        assert_eq!(inbox.len(), 1);
    }
}
