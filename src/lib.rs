//! # livegump
//!
//! Incremental UI updates for game servers. A server keeps a set of *live
//! elements* for each open container (a "gump"), batches mutations to them,
//! and flushes those mutations as small binary frames multiplexed on a single
//! extended-command channel of the host game protocol. The client decodes the
//! frames, resolves the target container and widget, and applies the change
//! without rebuilding the whole form.
//!
//! The crate has three layers:
//!
//! - the frame codec ([`network::codec`]), shared by both sides,
//! - the server live registry ([`LiveContainer`], driven by [`ServerSession`]),
//! - the client resolution and apply engine ([`ClientSession`]), which talks to
//!   the application's UI framework only through the [`UiHost`],
//!   [`GumpContainer`] and [`Widget`] traits.
//!
//! ```
//! use livegump::{ContainerId, LoopbackTransport, PropertyValue, SessionBuilder};
//!
//! let (transport, inbox) = LoopbackTransport::pair();
//! let mut server = SessionBuilder::new()
//!     .start_server_session(transport)
//!     .unwrap();
//!
//! let gump = ContainerId::new(0x4000_0001);
//! let container = server.open_container(gump).unwrap();
//! let label = container.register(Some("score"));
//! container.update_property(label, PropertyValue::Text("5".to_owned()));
//!
//! server.flush(gump);
//! assert_eq!(inbox.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub use client::animation::{Animatable, AnimationSample, AnimationState};
pub use client::host::{GumpContainer, UiHost};
pub use client::widget::{
    GraphicCapability, HueCapability, PositionCapability, SizeCapability, TextCapability,
    VacantSlot, VisibilityCapability, Widget, WidgetSpec,
};
pub use error::{InvalidConfigKind, LiveGumpError};
pub use network::codec::{CodecError, CodecResult, Decoded, FrameCodec, Unhandled};
pub use network::loopback::{LoopbackInbox, LoopbackTransport};
pub use network::messages::{
    AnimationKind, Frame, ImageSpec, LabelSpec, PropertyId, PropertyValue, SubCommand,
    WidgetKind, WidgetPayload,
};
pub use server::container::{ContainerPhase, LiveContainer};
pub use server::element::{ElementState, LiveElement};
pub use server::pending::{PendingOp, PendingUpdate};
pub use server::refresh::RefreshFault;
pub use sessions::builder::SessionBuilder;
pub use sessions::client_session::{ApplyOutcome, ClientSession};
pub use sessions::config::{CodecConfig, RefreshConfig};
pub use sessions::server_session::ServerSession;

#[doc(hidden)]
pub mod error;
pub mod telemetry;

/// Wire-level building blocks: frame types, the codec, and transports.
pub mod network {
    /// Frame encoding and decoding over the host protocol's extended-command envelope.
    pub mod codec;
    #[doc(hidden)]
    pub mod loopback;
    pub mod messages;
    /// Serialization of pending-update queues for inspection and diagnostics.
    pub mod snapshot;
    #[doc(hidden)]
    pub mod wire;
}

/// Server side: live elements, pending updates and the refresh policy.
pub mod server {
    pub mod container;
    pub mod element;
    pub mod pending;
    pub mod refresh;
}

/// Client side: widget capabilities, container tracking and frame application.
pub mod client {
    pub mod animation;
    pub(crate) mod apply;
    pub mod host;
    pub mod resolver;
    pub mod widget;
}

#[doc(hidden)]
pub mod sessions {
    #[doc(hidden)]
    pub mod builder;
    #[doc(hidden)]
    pub mod client_session;
    #[doc(hidden)]
    pub mod config;
    #[doc(hidden)]
    pub mod server_session;
    #[cfg(feature = "tokio")]
    pub mod tokio_refresh;
}

#[cfg(feature = "tokio")]
pub use sessions::tokio_refresh::{spawn_auto_refresh, AutoRefreshTask};

/// Internal module exposing implementation details for fuzzing and property tests.
///
/// **This module is NOT part of the public API.** Nothing here is covered by
/// semver guarantees.
#[doc(hidden)]
pub mod __internal {
    pub use crate::client::resolver::{find_widget_path, resolve_element, ContainerTracker};
    pub use crate::network::codec::{decode_body, encode_body};
    pub use crate::network::wire::{WireReader, WireWriter};
}

// #############
// # CONSTANTS #
// #############

/// Frame identifier of the host protocol's generic extended command.
pub const DEFAULT_FRAME_ID: u8 = 0xBF;

/// Upper bound on the byte length of any text field on the wire.
///
/// Longer text is clamped on encode, and declared lengths above it are clamped
/// on decode.
pub const MAX_TEXT_LEN: usize = 8192;

/// Sentinel written for an absent label hue.
pub const HUE_ABSENT: u16 = 0xFFFF;

/// Sentinel written for an absent label font.
pub const FONT_ABSENT: u8 = 0xFF;

// ###############
// # IDENTIFIERS #
// ###############

/// Identifies one open container (gump) instance.
///
/// On the wire this is always the server-assigned instance serial. Clients may
/// also know a container under a locally-assigned identifier, which is only
/// consulted by the fallback scan in [`client::resolver`].
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ContainerId(u32);

impl ContainerId {
    /// Creates a new `ContainerId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for ContainerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:08X}", self.0)
    }
}

impl From<u32> for ContainerId {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

/// Identifies a widget within a container.
///
/// Identifiers are assigned positionally by the server registry: the n-th
/// widget registered for a container gets identifier `n`. Dynamically added
/// widgets continue the same sequence.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Default,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct ElementId(u32);

impl ElementId {
    /// Creates a new `ElementId`.
    #[inline]
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the underlying `u32` value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the identifier as a child index, for positional resolution.
    #[inline]
    #[must_use]
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ElementId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ElementId {
    #[inline]
    fn from(value: u32) -> Self {
        Self(value)
    }
}

// ##########
// # TRAITS #
// ##########

/// The outbound half of a connection to one client.
///
/// Implement this over whatever carries the host protocol (a TCP stream
/// writer, a websocket, a test buffer). Sends are fire-and-forget: the
/// registry never waits for delivery and there is no acknowledgement.
pub trait Transport: Send {
    /// Returns `true` while the connection can accept packets.
    fn is_connected(&self) -> bool;

    /// Queues one complete packet (envelope included) for delivery.
    fn send(&mut self, packet: &[u8]);
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn send(&mut self, packet: &[u8]) {
        (**self).send(packet);
    }
}

// ###################
// # UNIT TESTS      #
// ###################

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
    fn container_id_displays_as_hex_serial() {
        assert_eq!(ContainerId::new(0x4000_0001).to_string(), "0x40000001");
    }

    #[test]
    fn element_id_index_matches_value() {
        let id = ElementId::new(3);
        assert_eq!(id.as_index(), 3);
        assert_eq!(id.to_string(), "3");
        assert_eq!(ElementId::from(3), id);
    }

    #[test]
    fn identifiers_order_numerically() {
        assert!(ElementId::new(1) < ElementId::new(2));
        assert!(ContainerId::new(10) > ContainerId::new(9));
        assert_eq!(ContainerId::default().as_u32(), 0);
    }

    #[test]
    fn boxed_transport_forwards() {
        let (transport, inbox) = LoopbackTransport::pair();
        let mut boxed: Box<dyn Transport> = Box::new(transport);
        assert!(boxed.is_connected());
        boxed.send(&[1, 2, 3]);
        assert_eq!(inbox.drain(), vec![vec![1, 2, 3]]);
    }
}
