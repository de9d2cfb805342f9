//! Per-container live registry.
//!
//! A [`LiveContainer`] tracks the widgets of one open container that the
//! server wants to keep mutable, records mutations to them as
//! [`PendingUpdate`]s, and flushes the whole queue as frames in one go.
//!
//! Element identifiers are positional: the n-th call to
//! [`register`](LiveContainer::register) returns identifier `n`, so
//! registration must follow the order in which widgets are added to the
//! container's build sequence. The client falls back to the same positions
//! when it cannot find a widget by explicit identifier.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use tracing::{debug, trace};
use web_time::Duration;

use crate::error::LiveGumpError;
use crate::network::codec::{check_payload_len, FrameCodec};
use crate::network::messages::{AnimationKind, PropertyValue, WidgetPayload};
use crate::server::element::LiveElement;
use crate::server::pending::{PendingOp, PendingUpdate};
use crate::telemetry::{
    InvariantChecker, InvariantViolation, ViolationKind, ViolationObserver, ViolationSeverity,
};
use crate::{debug_check_invariants, report_violation, ContainerId, ElementId, Transport};

/// Lifecycle of a server-side container.
///
/// `Building` accepts registrations. The first flush (or [`LiveContainer::open`])
/// moves it to `Open`; nothing stops a late registration, but the client will
/// not have a widget at that position. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerPhase {
    /// Widgets are still being added.
    Building,
    /// Displayed on the client.
    Open,
    /// Displayed, with a periodic refresh running.
    AutoRefreshing,
    /// Closed; the queue and elements are gone.
    Closed,
}

/// Live widgets and pending updates of one open container.
pub struct LiveContainer {
    id: ContainerId,
    phase: ContainerPhase,
    elements: BTreeMap<ElementId, LiveElement>,
    names: BTreeMap<String, ElementId>,
    pending: VecDeque<PendingUpdate>,
    next_id: u32,
    next_sequence: u64,
    observer: Option<Arc<dyn ViolationObserver>>,
}

impl std::fmt::Debug for LiveContainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Self {
            id,
            phase,
            elements,
            names,
            pending,
            next_id,
            next_sequence,
            observer,
        } = self;

        f.debug_struct("LiveContainer")
            .field("id", id)
            .field("phase", phase)
            .field("elements", &elements.keys())
            .field("names", names)
            .field("pending", &pending.len())
            .field("next_id", next_id)
            .field("next_sequence", next_sequence)
            .field("has_observer", &observer.is_some())
            .finish()
    }
}

impl LiveContainer {
    /// Creates an empty container in the `Building` phase.
    #[must_use]
    pub fn new(id: ContainerId) -> Self {
        Self {
            id,
            phase: ContainerPhase::Building,
            elements: BTreeMap::new(),
            names: BTreeMap::new(),
            pending: VecDeque::new(),
            next_id: 0,
            next_sequence: 0,
            observer: None,
        }
    }

    pub(crate) fn with_observer(mut self, observer: Option<Arc<dyn ViolationObserver>>) -> Self {
        self.observer = observer;
        self
    }

    /// The container's instance serial.
    #[must_use]
    pub const fn id(&self) -> ContainerId {
        self.id
    }

    /// The current lifecycle phase.
    #[must_use]
    pub const fn phase(&self) -> ContainerPhase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: ContainerPhase) {
        self.phase = phase;
    }

    /// Marks the container as displayed. Has no effect outside `Building`.
    pub fn open(&mut self) {
        if self.phase == ContainerPhase::Building {
            self.phase = ContainerPhase::Open;
        }
    }

    /// Number of tracked elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Returns true if no elements are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Looks up an element by identifier.
    #[must_use]
    pub fn element(&self, id: ElementId) -> Option<&LiveElement> {
        self.elements.get(&id)
    }

    /// Looks up an element by the name it was registered with.
    #[must_use]
    pub fn element_by_name(&self, name: &str) -> Option<&LiveElement> {
        self.names.get(name).and_then(|id| self.elements.get(id))
    }

    /// Iterates over tracked elements in identifier order.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn elements(&self) -> impl Iterator<Item = &LiveElement> + '_ {
        self.elements.values()
    }

    /// Iterates over queued updates in enqueue order.
    #[must_use = "iterators are lazy and do nothing unless consumed"]
    pub fn pending(&self) -> impl Iterator<Item = &PendingUpdate> + '_ {
        self.pending.iter()
    }

    /// Number of queued updates.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    fn allocate(&mut self, name: Option<&str>) -> ElementId {
        let id = ElementId::new(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        if let Some(name) = name {
            if let Some(previous) = self.names.insert(name.to_owned(), id) {
                debug!(container = %self.id, %previous, %id, name, "element name rebound");
            }
        }
        self.elements
            .insert(id, LiveElement::new(id, name.map(str::to_owned)));
        id
    }

    fn enqueue(&mut self, op: PendingOp) {
        if self.phase == ContainerPhase::Closed {
            debug!(container = %self.id, ?op, "dropping update for closed container");
            return;
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        trace!(container = %self.id, sequence, ?op, "enqueued update");
        self.pending.push_back(PendingUpdate { sequence, op });
    }

    /// Tracks the next widget of the build sequence and returns its identifier.
    ///
    /// Must be called once per widget, in the order the widgets are added to
    /// the container.
    pub fn register(&mut self, name: Option<&str>) -> ElementId {
        if self.phase != ContainerPhase::Building {
            debug!(container = %self.id, phase = ?self.phase, "registering outside the build phase");
        }
        let id = self.allocate(name);
        debug_check_invariants!(self, "after register");
        id
    }

    /// Records a new property value and queues it for sending.
    ///
    /// Returns `false`, and queues nothing, if `id` is not tracked.
    pub fn update_property(&mut self, id: ElementId, value: PropertyValue) -> bool {
        let Some(element) = self.elements.get_mut(&id) else {
            trace!(container = %self.id, %id, "update for untracked element dropped");
            return false;
        };
        element.state_mut().apply(&value);
        self.enqueue(PendingOp::SetProperty { element: id, value });
        true
    }

    /// [`update_property`](Self::update_property) addressed by element name.
    pub fn update_property_by_name(&mut self, name: &str, value: PropertyValue) -> bool {
        match self.names.get(name) {
            Some(&id) => self.update_property(id, value),
            None => {
                trace!(container = %self.id, name, "update for unknown name dropped");
                false
            },
        }
    }

    /// Queues an animation trigger.
    ///
    /// Queued even if `id` is not tracked, since animation targets may be
    /// widgets the registry never saw. Durations beyond 65535ms are capped.
    pub fn trigger_animation(&mut self, id: ElementId, kind: AnimationKind, duration: Duration) {
        let duration_ms = u16::try_from(duration.as_millis()).unwrap_or(u16::MAX);
        self.enqueue(PendingOp::Animation {
            element: id,
            kind,
            duration_ms,
        });
    }

    /// Creates a widget on the client and tracks it under the next identifier.
    ///
    /// # Errors
    /// Returns [`LiveGumpError::Codec`] if the payload cannot fit in one
    /// frame. No identifier is consumed and nothing is queued.
    pub fn add_element(
        &mut self,
        payload: WidgetPayload,
        x: i16,
        y: i16,
    ) -> Result<ElementId, LiveGumpError> {
        if let Err(err) = check_payload_len(&payload) {
            debug!(container = %self.id, kind = ?payload.kind(), %err, "add element rejected");
            return Err(err.into());
        }
        let id = self.allocate(None);
        if let Some(element) = self.elements.get_mut(&id) {
            let state = element.state_mut();
            state.x = x;
            state.y = y;
            match &payload {
                WidgetPayload::Label(label) => {
                    state.text = Some(label.text.clone());
                    state.hue = label.hue;
                },
                WidgetPayload::Image(image) => {
                    state.graphic = Some(image.graphic);
                    state.hue = Some(image.hue);
                },
                WidgetPayload::HtmlText(_)
                | WidgetPayload::Button(_)
                | WidgetPayload::TextEntry(_) => {},
            }
        }
        self.enqueue(PendingOp::AddElement {
            element: id,
            x,
            y,
            payload,
        });
        debug_check_invariants!(self, "after add_element");
        Ok(id)
    }

    /// Stops tracking a widget and queues its removal on the client.
    ///
    /// Returns `false`, and queues nothing, if `id` is not tracked. The
    /// identifier is never handed out again for this container.
    pub fn remove_element(&mut self, id: ElementId) -> bool {
        let Some(element) = self.elements.remove(&id) else {
            trace!(container = %self.id, %id, "removal of untracked element dropped");
            return false;
        };
        if let Some(name) = element.name() {
            if self.names.get(name) == Some(&id) {
                self.names.remove(name);
            }
        }
        self.enqueue(PendingOp::RemoveElement { element: id });
        debug_check_invariants!(self, "after remove_element");
        true
    }

    /// Queues a content refresh of the whole container.
    pub fn request_refresh(&mut self) {
        self.enqueue(PendingOp::Refresh);
    }

    /// Sets the width a full progress bar should have.
    pub fn set_full_width(&mut self, id: ElementId, width: u16) -> bool {
        match self.elements.get_mut(&id) {
            Some(element) => {
                element.state_mut().full_width = Some(width);
                true
            },
            None => false,
        }
    }

    /// Records progress and queues a width update scaled to `value / max`.
    ///
    /// Returns `false` if `id` is not tracked. If the element has no full
    /// width yet, the values are recorded but no update is queued.
    pub fn set_progress(&mut self, id: ElementId, value: u32, max: u32) -> bool {
        let Some(element) = self.elements.get_mut(&id) else {
            trace!(container = %self.id, %id, "progress for untracked element dropped");
            return false;
        };
        let state = element.state_mut();
        state.value = value;
        state.max = max;
        match state.progress_width(value, max) {
            Some(width) => {
                state.width = Some(width);
                self.enqueue(PendingOp::SetProperty {
                    element: id,
                    value: PropertyValue::Width(width),
                });
            },
            None => debug!(container = %self.id, %id, "progress without a full width"),
        }
        true
    }

    /// Sends every queued update, in order, then empties the queue.
    ///
    /// The queue goes out whole or not at all: without a connected transport,
    /// or if any update fails to encode, every update is discarded. Returns
    /// the number of packets sent.
    pub fn flush(&mut self, transport: Option<&mut dyn Transport>, codec: &FrameCodec) -> usize {
        self.open();
        if self.pending.is_empty() {
            return 0;
        }
        let updates = std::mem::take(&mut self.pending);

        let transport = match transport {
            Some(transport) if transport.is_connected() => transport,
            _ => {
                report_violation!(
                    observer: self.observer.as_ref(),
                    container: self.id,
                    ViolationSeverity::Warning,
                    ViolationKind::TransportUnavailable,
                    "no connected transport, discarded {} pending updates",
                    updates.len()
                );
                return 0;
            },
        };

        let encoded: Result<Vec<_>, _> = updates
            .iter()
            .map(|update| {
                codec
                    .encode(&update.to_frame(self.id))
                    .map_err(|err| (update.sequence, err))
            })
            .collect();
        let packets = match encoded {
            Ok(packets) => packets,
            Err((sequence, err)) => {
                report_violation!(
                    observer: self.observer.as_ref(),
                    container: self.id,
                    ViolationSeverity::Error,
                    ViolationKind::MalformedFrame,
                    "update {} could not be encoded ({}), discarded {} pending updates",
                    sequence,
                    err,
                    updates.len()
                );
                return 0;
            },
        };
        for packet in &packets {
            transport.send(packet);
        }
        trace!(container = %self.id, sent = packets.len(), "flushed");
        packets.len()
    }

    /// Closes the container, discarding its queue and elements.
    ///
    /// Returns the number of updates that were discarded.
    pub fn close(&mut self) -> usize {
        let dropped = self.pending.len();
        self.pending.clear();
        self.elements.clear();
        self.names.clear();
        self.phase = ContainerPhase::Closed;
        debug!(container = %self.id, dropped, "container closed");
        dropped
    }
}

impl InvariantChecker for LiveContainer {
    fn check_invariants(&self) -> Result<(), InvariantViolation> {
        if let Some((&last, _)) = self.elements.last_key_value() {
            if last.as_u32() >= self.next_id {
                return Err(InvariantViolation::new(
                    "LiveContainer",
                    "element identifier not below the allocation counter",
                )
                .with_details(format!("id={}, next_id={}", last, self.next_id)));
            }
        }
        for (name, id) in &self.names {
            if self.elements.get(id).and_then(LiveElement::name) != Some(name.as_str()) {
                return Err(InvariantViolation::new(
                    "LiveContainer",
                    "name maps to a missing or differently named element",
                )
                .with_details(format!("name={}, id={}", name, id)));
            }
        }
        if self.phase == ContainerPhase::Closed
            && !(self.pending.is_empty() && self.elements.is_empty())
        {
            return Err(InvariantViolation::new(
                "LiveContainer",
                "closed container still holds state",
            ));
        }
        Ok(())
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
    use crate::network::codec::{decode, CodecError, Decoded};
    use crate::network::loopback::LoopbackTransport;
    use crate::network::messages::{Frame, ImageSpec, LabelSpec};
    use crate::sessions::config::CodecConfig;
    use crate::telemetry::CollectingObserver;

    const GUMP: ContainerId = ContainerId::new(0x4000_0007);

    fn frames(packets: Vec<Vec<u8>>) -> Vec<Frame> {
        packets
            .iter()
            .map(|p| match decode(p).unwrap().0 {
                Decoded::Frame(f) => f,
                Decoded::Unhandled(u) => panic!("unexpected {u}"),
            })
            .collect()
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let mut container = LiveContainer::new(GUMP);
        let ids: Vec<_> = (0..5).map(|_| container.register(None)).collect();
        assert_eq!(ids, (0..5).map(ElementId::new).collect::<Vec<_>>());
        assert_eq!(container.len(), 5);
        assert!(container.check_invariants().is_ok());
    }

    #[test]
    fn update_unknown_element_is_a_no_op() {
        let mut container = LiveContainer::new(GUMP);
        container.register(None);
        assert!(!container.update_property(ElementId::new(3), PropertyValue::Hue(1)));
        assert_eq!(container.pending_len(), 0);
        assert!(container.element(ElementId::new(3)).is_none());
    }

    #[test]
    fn update_is_visible_before_flush_and_not_coalesced() {
        let mut container = LiveContainer::new(GUMP);
        let id = container.register(Some("timer"));
        container.update_property(id, PropertyValue::Text("3".to_owned()));
        container.update_property_by_name("timer", PropertyValue::Text("2".to_owned()));
        assert_eq!(
            container.element(id).unwrap().state().text.as_deref(),
            Some("2")
        );
        let sequences: Vec<_> = container.pending().map(|u| u.sequence).collect();
        assert_eq!(sequences, [0, 1]);
    }

    #[test]
    fn animation_is_queued_for_untracked_element() {
        let mut container = LiveContainer::new(GUMP);
        container.trigger_animation(
            ElementId::new(99),
            AnimationKind::Shake,
            Duration::from_secs(120),
        );
        let update = container.pending().next().unwrap();
        assert_eq!(
            update.op,
            PendingOp::Animation {
                element: ElementId::new(99),
                kind: AnimationKind::Shake,
                duration_ms: u16::MAX,
            }
        );
    }

    #[test]
    fn flush_without_transport_discards_everything() {
        let observer = Arc::new(CollectingObserver::new());
        let mut container = LiveContainer::new(GUMP)
            .with_observer(Some(observer.clone() as Arc<dyn ViolationObserver>));
        let id = container.register(None);
        container.update_property(id, PropertyValue::Text("0".to_owned()));
        container.request_refresh();

        assert_eq!(container.flush(None, &FrameCodec::default()), 0);
        assert_eq!(container.pending_len(), 0);
        assert_eq!(container.phase(), ContainerPhase::Open);
        assert!(observer.has_violation(ViolationKind::TransportUnavailable));
    }

    #[test]
    fn flush_with_disconnected_transport_discards() {
        let (mut transport, inbox) = LoopbackTransport::pair();
        inbox.set_connected(false);
        let mut container = LiveContainer::new(GUMP);
        container.request_refresh();
        assert_eq!(
            container.flush(Some(&mut transport), &FrameCodec::default()),
            0
        );
        assert_eq!(container.pending_len(), 0);
        inbox.set_connected(true);
        assert!(inbox.is_empty());
    }

    #[test]
    fn flush_sends_in_enqueue_order() {
        let (mut transport, inbox) = LoopbackTransport::pair();
        let mut container = LiveContainer::new(GUMP);
        let a = container.register(None);
        let b = container.register(None);
        container.update_property(b, PropertyValue::Visible(false));
        container.update_property(a, PropertyValue::X(4));
        container.trigger_animation(a, AnimationKind::Fade, Duration::from_millis(200));

        let sent = container.flush(Some(&mut transport), &FrameCodec::default());
        assert_eq!(sent, 3);
        assert_eq!(container.pending_len(), 0);
        assert_eq!(
            frames(inbox.drain()),
            vec![
                Frame::SetProperty {
                    container: GUMP,
                    element: b,
                    value: PropertyValue::Visible(false)
                },
                Frame::SetProperty {
                    container: GUMP,
                    element: a,
                    value: PropertyValue::X(4)
                },
                Frame::Animation {
                    container: GUMP,
                    element: a,
                    kind: AnimationKind::Fade,
                    duration_ms: 200
                },
            ]
        );
    }

    #[test]
    fn dynamic_elements_continue_the_sequence() {
        let mut container = LiveContainer::new(GUMP);
        container.register(None);
        let image = container.add_element(
            WidgetPayload::Image(ImageSpec {
                graphic: 9270,
                hue: 0,
            }),
            10,
            20,
        )
        .unwrap();
        assert_eq!(image, ElementId::new(1));
        assert_eq!(container.element(image).unwrap().state().graphic, Some(9270));

        assert!(container.remove_element(image));
        assert!(!container.remove_element(image));
        let label = container
            .add_element(WidgetPayload::Label(LabelSpec::new("x")), 0, 0)
            .unwrap();
        assert_eq!(label, ElementId::new(2));
        assert_eq!(container.pending_len(), 3);
        assert!(container.check_invariants().is_ok());
    }

    #[test]
    fn oversized_add_is_rejected_without_consuming_an_id() {
        let mut container = LiveContainer::new(GUMP);
        let label = container.register(None);
        let err = container
            .add_element(WidgetPayload::HtmlText(vec![0; 70_000]), 0, 0)
            .unwrap_err();
        assert!(matches!(
            err,
            LiveGumpError::Codec(CodecError::PayloadTooLarge { .. })
        ));
        assert_eq!(container.pending_len(), 0);
        assert_eq!(container.len(), 1);

        let next = container
            .add_element(WidgetPayload::Button(vec![1, 2, 3]), 0, 0)
            .unwrap();
        assert_eq!(next, ElementId::new(label.as_u32() + 1));
    }

    #[test]
    fn flush_discards_the_whole_batch_when_one_update_cannot_encode() {
        let observer = Arc::new(CollectingObserver::new());
        let mut container = LiveContainer::new(GUMP)
            .with_observer(Some(observer.clone() as Arc<dyn ViolationObserver>));
        let a = container.register(None);
        let b = container.register(None);
        container.update_property(a, PropertyValue::Hue(1));
        // Fits the default text limit but not a codec that skips validation.
        container.update_property(b, PropertyValue::Text("x".repeat(u16::MAX as usize)));
        container.update_property(a, PropertyValue::Hue(2));

        let (mut transport, inbox) = LoopbackTransport::pair();
        let unchecked = FrameCodec::new(CodecConfig {
            max_text_len: u16::MAX as usize,
            ..CodecConfig::default()
        });
        assert_eq!(container.flush(Some(&mut transport), &unchecked), 0);
        assert_eq!(container.pending_len(), 0);
        assert!(inbox.drain().is_empty());
        assert_eq!(observer.violations_of_kind(ViolationKind::MalformedFrame).len(), 1);

        container.update_property(a, PropertyValue::Hue(3));
        assert_eq!(container.flush(Some(&mut transport), &FrameCodec::default()), 1);
    }

    #[test]
    fn names_follow_removal() {
        let mut container = LiveContainer::new(GUMP);
        let id = container.register(Some("gold"));
        assert_eq!(container.element_by_name("gold").unwrap().id(), id);
        container.remove_element(id);
        assert!(container.element_by_name("gold").is_none());
        assert!(!container.update_property_by_name("gold", PropertyValue::Hue(3)));
    }

    #[test]
    fn progress_emits_scaled_width() {
        let mut container = LiveContainer::new(GUMP);
        let bar = container.register(Some("hp"));
        assert!(container.set_progress(bar, 5, 10));
        assert_eq!(container.pending_len(), 0);

        container.set_full_width(bar, 120);
        container.set_progress(bar, 30, 120);
        let state = container.element(bar).unwrap().state();
        assert_eq!((state.value, state.max, state.width), (30, 120, Some(30)));
        assert_eq!(
            container.pending().last().unwrap().op,
            PendingOp::SetProperty {
                element: bar,
                value: PropertyValue::Width(30)
            }
        );
        assert!(!container.set_progress(ElementId::new(8), 1, 1));
    }

    #[test]
    fn close_discards_and_rejects_further_updates() {
        let mut container = LiveContainer::new(GUMP);
        let id = container.register(None);
        container.update_property(id, PropertyValue::Hue(2));
        assert_eq!(container.close(), 1);
        container.request_refresh();
        assert_eq!(container.pending_len(), 0);
        assert!(container.is_empty());
        assert_eq!(container.phase(), ContainerPhase::Closed);
        assert!(container.check_invariants().is_ok());
    }
}
