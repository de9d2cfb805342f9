//! Connection-scoped client state.
//!
//! A [`ClientSession`] owns the container tracking table for one connection
//! and turns inbound packets into widget mutations on a [`UiHost`]. Every
//! failure degrades to a skipped update: [`handle_packet`] never panics and
//! never returns an error, it reports what happened as an [`ApplyOutcome`].
//!
//! [`handle_packet`]: ClientSession::handle_packet

use std::sync::Arc;

use tracing::{debug, trace};

use crate::client::apply;
use crate::client::host::UiHost;
use crate::client::resolver::ContainerTracker;
use crate::client::widget::WidgetSpec;
use crate::network::codec::{CodecError, Decoded, FrameCodec, Unhandled};
use crate::network::messages::Frame;
use crate::report_violation;
use crate::telemetry::{ViolationKind, ViolationObserver, ViolationSeverity};
use crate::{ContainerId, ElementId};

/// What handling one packet did.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum ApplyOutcome {
    /// A property was applied; the container was marked dirty.
    Applied,
    /// A widget was created and inserted.
    Created,
    /// A widget was disposed and removed.
    Removed,
    /// An animation was started.
    Animated,
    /// The container was asked to refresh.
    Refreshed,
    /// The container was disposed and untracked.
    Closed,
    /// The container, or the widget within it, was not found.
    Unresolved {
        /// Container the frame addressed.
        container: ContainerId,
        /// Widget the frame addressed, for element-level frames.
        element: Option<ElementId>,
    },
    /// The widget lacks the capability, or the host could not build it.
    Unsupported {
        /// Container the frame addressed.
        container: ContainerId,
        /// Widget the frame addressed.
        element: ElementId,
    },
    /// The packet carried an unknown discriminant.
    Unhandled(Unhandled),
    /// The packet could not be decoded.
    Malformed(CodecError),
}

impl ApplyOutcome {
    /// Returns true if the packet changed the UI.
    #[must_use]
    pub const fn changed_ui(&self) -> bool {
        matches!(
            self,
            Self::Applied
                | Self::Created
                | Self::Removed
                | Self::Animated
                | Self::Refreshed
                | Self::Closed
        )
    }
}

/// Client half of a live-update connection.
///
/// `H` is the host's container handle type.
pub struct ClientSession<H> {
    tracker: ContainerTracker<H>,
    codec: FrameCodec,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl<H: std::fmt::Debug> std::fmt::Debug for ClientSession<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            tracker,
            codec,
            observer,
        } = self;

        f.debug_struct("ClientSession")
            .field("tracker", tracker)
            .field("codec", codec)
            .field("has_observer", &observer.is_some())
            .finish()
    }
}

impl<H: Copy + Eq + Ord + std::fmt::Debug> ClientSession<H> {
    pub(crate) fn new(codec: FrameCodec, observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        Self {
            tracker: ContainerTracker::new(),
            codec,
            observer,
        }
    }

    /// The codec inbound packets are decoded with.
    #[must_use]
    pub const fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    /// The tracking table.
    #[must_use]
    pub const fn tracker(&self) -> &ContainerTracker<H> {
        &self.tracker
    }

    /// Records a newly displayed container under its server-assigned serial.
    pub fn track(&mut self, id: ContainerId, handle: H) {
        if let Some(previous) = self.tracker.track(id, handle) {
            if previous != handle {
                debug!(container = %id, ?previous, ?handle, "container serial reassigned");
            }
        }
    }

    /// Adds a further identifier for an already tracked container.
    pub fn alias(&mut self, id: ContainerId, handle: H) {
        self.tracker.track(id, handle);
    }

    /// Forgets every identifier of a closed or disposed container.
    pub fn untrack(&mut self, handle: H) -> usize {
        self.tracker.untrack(handle)
    }

    /// Returns true if `id` is in the tracking table.
    #[must_use]
    pub fn is_tracked(&self, id: ContainerId) -> bool {
        self.tracker.get(id).is_some()
    }

    /// Drops all tracking state, as on disconnect.
    pub fn reset(&mut self) {
        self.tracker.clear();
    }

    /// Finds the open container for `id`: tracking table first, then a scan.
    pub fn resolve_container<U>(&self, host: &U, id: ContainerId) -> Option<H>
    where
        U: UiHost<Handle = H> + ?Sized,
    {
        self.tracker.resolve(host, id)
    }

    /// Decodes one packet and applies it.
    pub fn handle_packet<U>(&mut self, host: &mut U, bytes: &[u8]) -> ApplyOutcome
    where
        U: UiHost<Handle = H> + ?Sized,
    {
        match self.codec.decode(bytes) {
            Ok((Decoded::Frame(frame), _)) => self.handle_frame(host, &frame),
            Ok((Decoded::Unhandled(unhandled), _)) => self.report_unhandled(unhandled),
            Err(err) => self.report_malformed(err, bytes.len()),
        }
    }

    /// Handles back-to-back packets in one buffer.
    ///
    /// Stops at the first packet that cannot be decoded, since its length is
    /// no longer trustworthy.
    pub fn handle_packets<U>(&mut self, host: &mut U, mut bytes: &[u8]) -> Vec<ApplyOutcome>
    where
        U: UiHost<Handle = H> + ?Sized,
    {
        let mut outcomes = Vec::new();
        while !bytes.is_empty() {
            match self.codec.decode(bytes) {
                Ok((decoded, consumed)) => {
                    outcomes.push(match decoded {
                        Decoded::Frame(frame) => self.handle_frame(host, &frame),
                        Decoded::Unhandled(unhandled) => self.report_unhandled(unhandled),
                    });
                    bytes = bytes.get(consumed..).unwrap_or_default();
                },
                Err(err) => {
                    outcomes.push(self.report_malformed(err, bytes.len()));
                    break;
                },
            }
        }
        outcomes
    }

    /// Applies an already decoded frame.
    pub fn handle_frame<U>(&mut self, host: &mut U, frame: &Frame) -> ApplyOutcome
    where
        U: UiHost<Handle = H> + ?Sized,
    {
        let container_id = frame.container();
        let Some(handle) = self.tracker.resolve(host, container_id) else {
            return self.report_unresolved(container_id, frame.element());
        };

        let outcome = match frame {
            Frame::SetProperty { element, value, .. } => host
                .container_mut(handle)
                .map(|c| apply::set_property(c, *element, value)),
            Frame::AddElement {
                element,
                x,
                y,
                payload,
                ..
            } => {
                let spec = WidgetSpec {
                    id: *element,
                    x: *x,
                    y: *y,
                    payload: payload.clone(),
                };
                match host.create_widget(&spec) {
                    Some(widget) => host
                        .container_mut(handle)
                        .map(|c| apply::add_element(c, *element, widget)),
                    None => {
                        debug!(container = %container_id, element = %element, kind = ?payload.kind(), "host cannot build widget");
                        Some(ApplyOutcome::Unsupported {
                            container: container_id,
                            element: *element,
                        })
                    },
                }
            },
            Frame::RemoveElement { element, .. } => host
                .container_mut(handle)
                .map(|c| apply::remove_element(c, *element)),
            Frame::Animation {
                element,
                kind,
                duration_ms,
                ..
            } => host
                .container_mut(handle)
                .map(|c| apply::animate(c, *element, *kind, *duration_ms)),
            Frame::Refresh { .. } => host.container_mut(handle).map(apply::refresh),
            Frame::Close { .. } => {
                if let Some(container) = host.container_mut(handle) {
                    container.dispose();
                }
                let removed = self.tracker.untrack(handle);
                host.close_container(handle);
                trace!(container = %container_id, removed, "container closed");
                Some(ApplyOutcome::Closed)
            },
        };

        match outcome {
            Some(ApplyOutcome::Unresolved { container, element }) => {
                self.report_unresolved(container, element)
            },
            Some(outcome) => outcome,
            None => self.report_unresolved(container_id, frame.element()),
        }
    }

    fn report_unresolved(&self, container: ContainerId, element: Option<ElementId>) -> ApplyOutcome {
        match element {
            Some(element) => report_violation!(
                observer: self.observer.as_ref(),
                container: container,
                ViolationSeverity::Warning,
                ViolationKind::UnresolvedReference,
                "element {} not found in container {}, update dropped",
                element,
                container
            ),
            None => report_violation!(
                observer: self.observer.as_ref(),
                container: container,
                ViolationSeverity::Warning,
                ViolationKind::UnresolvedReference,
                "container {} is not open, frame dropped",
                container
            ),
        }
        ApplyOutcome::Unresolved { container, element }
    }

    fn report_unhandled(&self, unhandled: Unhandled) -> ApplyOutcome {
        match unhandled.container() {
            Some(container) => report_violation!(
                observer: self.observer.as_ref(),
                container: container,
                ViolationSeverity::Warning,
                ViolationKind::UnknownDiscriminant,
                "{}",
                unhandled
            ),
            None => report_violation!(
                observer: self.observer.as_ref(),
                ViolationSeverity::Warning,
                ViolationKind::UnknownDiscriminant,
                "{}",
                unhandled
            ),
        }
        ApplyOutcome::Unhandled(unhandled)
    }

    fn report_malformed(&self, err: CodecError, len: usize) -> ApplyOutcome {
        report_violation!(
            observer: self.observer.as_ref(),
            ViolationSeverity::Warning,
            ViolationKind::MalformedFrame,
            "dropping {}-byte packet: {}",
            len,
            err
        );
        ApplyOutcome::Malformed(err)
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
    use crate::client::host::GumpContainer;
    use crate::client::widget::{TextCapability, Widget};
    use crate::network::codec::encode;
    use crate::network::messages::PropertyValue;
    use crate::telemetry::CollectingObserver;

    #[derive(Default)]
    struct Text {
        value: String,
    }

    impl TextCapability for Text {
        fn set_text(&mut self, text: &str) {
            self.value = text.to_owned();
        }
    }

    impl Widget for Text {
        fn local_id(&self) -> Option<ElementId> {
            None
        }

        fn text_mut(&mut self) -> Option<&mut dyn TextCapability> {
            Some(self)
        }
    }

    struct Form {
        id: ContainerId,
        children: Vec<Box<dyn Widget>>,
        dirty: u32,
        disposed: bool,
    }

    impl GumpContainer for Form {
        fn server_id(&self) -> ContainerId {
            self.id
        }

        fn children(&self) -> &[Box<dyn Widget>] {
            &self.children
        }

        fn children_mut(&mut self) -> &mut Vec<Box<dyn Widget>> {
            &mut self.children
        }

        fn mark_dirty(&mut self) {
            self.dirty += 1;
        }

        fn request_refresh(&mut self) {}

        fn dispose(&mut self) {
            self.disposed = true;
        }

        fn is_disposed(&self) -> bool {
            self.disposed
        }
    }

    struct OneForm(Option<Form>);

    impl UiHost for OneForm {
        type Handle = u8;

        fn container(&self, _: u8) -> Option<&dyn GumpContainer> {
            self.0.as_ref().map(|f| f as &dyn GumpContainer)
        }

        fn container_mut(&mut self, _: u8) -> Option<&mut dyn GumpContainer> {
            self.0.as_mut().map(|f| f as &mut dyn GumpContainer)
        }

        fn open_containers(&self) -> Vec<u8> {
            self.0.iter().map(|_| 0).collect()
        }

        fn create_widget(&mut self, _: &WidgetSpec) -> Option<Box<dyn Widget>> {
            None
        }

        fn close_container(&mut self, _: u8) {
            self.0 = None;
        }
    }

    const GUMP: ContainerId = ContainerId::new(0x4000_0100);

    fn session() -> (ClientSession<u8>, Arc<CollectingObserver>) {
        let observer = Arc::new(CollectingObserver::new());
        let session = ClientSession::new(
            FrameCodec::default(),
            Some(observer.clone() as Arc<dyn ViolationObserver>),
        );
        (session, observer)
    }

    fn host() -> OneForm {
        OneForm(Some(Form {
            id: GUMP,
            children: vec![Box::new(Text::default())],
            dirty: 0,
            disposed: false,
        }))
    }

    fn set_text(text: &str) -> Vec<u8> {
        encode(&Frame::SetProperty {
            container: GUMP,
            element: ElementId::new(0),
            value: PropertyValue::Text(text.to_owned()),
        })
        .unwrap()
    }

    #[test]
    fn applies_by_position_and_marks_dirty() {
        let (mut client, _) = session();
        let mut host = host();
        client.track(GUMP, 0);
        assert_eq!(client.handle_packet(&mut host, &set_text("5")), ApplyOutcome::Applied);
        assert_eq!(host.0.as_ref().unwrap().dirty, 1);
    }

    #[test]
    fn untracked_container_found_by_scan() {
        let (mut client, _) = session();
        let mut host = host();
        assert!(!client.is_tracked(GUMP));
        assert_eq!(client.handle_packet(&mut host, &set_text("7")), ApplyOutcome::Applied);
    }

    #[test]
    fn unknown_sub_command_is_reported() {
        let (mut client, observer) = session();
        let mut host = host();
        let packet = [0xBF, 0x00, 0x02, 0x01, 0x03];
        assert_eq!(
            client.handle_packet(&mut host, &packet),
            ApplyOutcome::Unhandled(Unhandled::SubCommand { value: 0x0103 })
        );
        assert!(observer.has_violation(ViolationKind::UnknownDiscriminant));
    }

    #[test]
    fn truncated_packet_is_malformed() {
        let (mut client, observer) = session();
        let mut host = host();
        let packet = set_text("hello");
        let outcome = client.handle_packet(&mut host, &packet[..packet.len() - 1]);
        assert!(matches!(outcome, ApplyOutcome::Malformed(CodecError::Truncated { .. })));
        assert!(!outcome.changed_ui());
        assert!(observer.has_violation(ViolationKind::MalformedFrame));
        assert_eq!(host.0.as_ref().unwrap().dirty, 0);
    }

    #[test]
    fn back_to_back_packets() {
        let (mut client, _) = session();
        let mut host = host();
        let mut buffer = set_text("1");
        buffer.extend(set_text("2"));
        buffer.extend(encode(&Frame::Close { container: GUMP }).unwrap());
        buffer.push(0xBF);

        let outcomes = client.handle_packets(&mut host, &buffer);
        assert_eq!(outcomes.len(), 4);
        assert_eq!(outcomes[2], ApplyOutcome::Closed);
        assert!(matches!(outcomes[3], ApplyOutcome::Malformed(_)));
        assert!(host.0.is_none());
    }

    #[test]
    fn aliases_are_untracked_together() {
        let (mut client, _) = session();
        client.track(GUMP, 0);
        client.alias(ContainerId::new(77), 0);
        assert_eq!(client.untrack(0), 2);
        assert!(!client.is_tracked(ContainerId::new(77)));
    }
}
