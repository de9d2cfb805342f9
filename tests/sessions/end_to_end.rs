//! Server to client scenarios over a loopback transport.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use crate::common::stubs::{Form, Label, StubHost};
use crate::common::{connected_sessions, gump, pump, GUMP_SERIAL};
use livegump::telemetry::{CollectingObserver, ViolationKind};
use livegump::{
    ApplyOutcome, ContainerId, ElementId, Frame, FrameCodec, ImageSpec, LabelSpec, LoopbackTransport,
    PropertyValue, SessionBuilder, WidgetPayload,
};
use std::sync::Arc;

#[test]
fn test_update_reaches_client_after_connect() {
    let observer = Arc::new(CollectingObserver::new());
    let mut server = SessionBuilder::new()
        .with_violation_observer(observer.clone())
        .start_disconnected_server_session::<LoopbackTransport>()
        .unwrap();
    let mut client = SessionBuilder::new().start_client_session::<u32>().unwrap();

    let container = server.open_container(gump()).unwrap();
    let label = container.register(None);
    assert_eq!(label, ElementId::new(0));
    container.update_property(label, PropertyValue::Text("0".to_owned()));

    // No transport yet: the queue is discarded.
    assert_eq!(server.flush(gump()), 0);
    assert_eq!(server.container(gump()).unwrap().pending_len(), 0);
    assert!(observer.has_violation(ViolationKind::TransportUnavailable));

    let (transport, inbox) = LoopbackTransport::pair();
    assert!(server.connect(transport).is_none());
    server
        .container_mut(gump())
        .unwrap()
        .update_property(label, PropertyValue::Text("5".to_owned()));
    assert_eq!(server.flush(gump()), 1);

    let packets = inbox.drain();
    assert_eq!(packets.len(), 1);
    let (decoded, _) = FrameCodec::default().decode(&packets[0]).unwrap();
    assert_eq!(
        decoded,
        livegump::Decoded::Frame(Frame::SetProperty {
            container: gump(),
            element: ElementId::new(0),
            value: PropertyValue::Text("5".to_owned()),
        })
    );

    let mut host = StubHost::new();
    let (widget, state) = Label::new(None, "0");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![widget]));
    client.track(gump(), handle);

    assert_eq!(
        client.handle_packet(&mut host, &packets[0]),
        ApplyOutcome::Applied
    );
    assert_eq!(state.borrow().text, "5");
    assert_eq!(host.form(handle).dirty, 1);
}

#[test]
fn test_add_element_for_untracked_container_is_dropped() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    // An unrelated form is open; nothing matches the addressed serial.
    let handle = host.open(Form::new(0x1000, Vec::new()));

    let frame = Frame::AddElement {
        container: ContainerId::new(GUMP_SERIAL),
        element: ElementId::new(7),
        x: 10,
        y: 20,
        payload: WidgetPayload::Image(ImageSpec {
            graphic: 9270,
            hue: 0,
        }),
    };
    let packet = FrameCodec::default().encode(&frame).unwrap();

    let outcome = s.client.handle_packet(&mut host, &packet);
    assert_eq!(
        outcome,
        ApplyOutcome::Unresolved {
            container: gump(),
            element: Some(ElementId::new(7)),
        }
    );
    assert!(host.created_pictures.is_empty());
    assert!(host.form(handle).children.is_empty());
    assert!(s.observer.has_violation(ViolationKind::UnresolvedReference));
}

#[test]
fn test_close_untracks_and_later_updates_are_dropped() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (widget, state) = Label::new(None, "hp");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![widget]));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let label = container.register(Some("hp"));
    s.server.close_container(gump()).unwrap();

    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Closed]);
    assert!(!s.client.is_tracked(gump()));
    assert_eq!(host.closed, vec![handle]);

    // A stale update still addressed to the closed serial.
    let stale = FrameCodec::default()
        .encode(&Frame::SetProperty {
            container: gump(),
            element: label,
            value: PropertyValue::Text("99".to_owned()),
        })
        .unwrap();
    assert!(matches!(
        s.client.handle_packet(&mut host, &stale),
        ApplyOutcome::Unresolved { .. }
    ));
    assert_eq!(state.borrow().text, "hp");
}

#[test]
fn test_dynamic_widgets_round_trip() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let handle = host.open(Form::new(GUMP_SERIAL, Vec::new()));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let title = container.register(Some("title"));
    let label = LabelSpec::new("Wave 1").with_hue(0x35);
    let banner = container
        .add_element(WidgetPayload::Label(label), 40, 12)
        .unwrap();
    assert_eq!(banner, ElementId::new(1));
    container.update_property(banner, PropertyValue::Text("Wave 2".to_owned()));
    assert!(container.element_by_name("title").is_some_and(|e| e.id() == title));
    s.server.flush(gump());

    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Created, ApplyOutcome::Applied]);
    let created = &host.created_labels[&banner];
    assert_eq!(created.borrow().text, "Wave 2");
    assert_eq!(created.borrow().hue, Some(0x35));
    assert_eq!((created.borrow().x, created.borrow().y), (40, 12));

    assert!(s.server.container_mut(gump()).unwrap().remove_element(banner));
    s.server.flush(gump());
    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Removed]);
    assert!(host.created_labels[&banner].borrow().disposed);
    let children = &host.form(handle).children;
    assert_eq!(children.len(), 1);
    assert!(children[0].is_vacant());
}

#[test]
fn test_unsupported_widget_kind_is_not_created() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let handle = host.open(Form::new(GUMP_SERIAL, Vec::new()));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let button = container
        .add_element(WidgetPayload::Button(vec![1, 2, 3]), 0, 0)
        .unwrap();
    s.server.flush(gump());

    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(
        outcomes,
        vec![ApplyOutcome::Unsupported {
            container: gump(),
            element: button,
        }]
    );
    assert!(host.form(handle).children.is_empty());
}

#[test]
fn test_oversized_add_leaves_the_queue_intact() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (widget, state) = Label::new(None, "hp");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![widget]));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let label = container.register(None);
    assert!(container
        .add_element(WidgetPayload::HtmlText(vec![0; 70_000]), 0, 0)
        .is_err());
    container.update_property(label, PropertyValue::Text("after".to_owned()));
    assert_eq!(container.pending_len(), 1);
    assert_eq!(s.server.flush(gump()), 1);

    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Applied]);
    assert_eq!(state.borrow().text, "after");
    assert!(!s.observer.has_violation(ViolationKind::MalformedFrame));
}

#[test]
fn test_progress_bar_width_follows_value() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (bar, state) = crate::common::stubs::Picture::new(None, 0x0805);
    let handle = host.open(Form::new(GUMP_SERIAL, vec![bar]));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let id = container.register(Some("hp-bar"));
    assert!(container.set_full_width(id, 200));
    assert!(container.set_progress(id, 30, 120));
    s.server.flush(gump());

    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Applied]);
    assert_eq!(state.borrow().width, Some(50));
}

#[test]
fn test_back_to_back_packets_in_one_buffer() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (first, first_state) = Label::new(None, "a");
    let (second, second_state) = Label::new(None, "b");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![first, second]));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let a = container.register(None);
    let b = container.register(None);
    container.update_property(a, PropertyValue::Hue(0x21));
    container.update_property(b, PropertyValue::Visible(false));
    container.request_refresh();
    s.server.flush(gump());

    let buffer: Vec<u8> = s.inbox.drain().concat();
    let outcomes = s.client.handle_packets(&mut host, &buffer);
    assert_eq!(
        outcomes,
        vec![
            ApplyOutcome::Applied,
            ApplyOutcome::Applied,
            ApplyOutcome::Refreshed
        ]
    );
    assert_eq!(first_state.borrow().hue, Some(0x21));
    assert!(!second_state.borrow().visible);
    // Two applied properties plus the explicit refresh.
    assert_eq!(host.form(handle).refreshes, 3);
}
