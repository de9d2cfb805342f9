//! Client resolution and apply engine against the stub toolkit.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::time::Duration;

use crate::common::stubs::{Form, Label, LabelState, Panel, Picture, Shared, StubHost};
use crate::common::{connected_sessions, gump, pump, GUMP_SERIAL};
use livegump::__internal::resolve_element;
use livegump::telemetry::ViolationKind;
use livegump::{
    AnimationKind, ApplyOutcome, ContainerId, ElementId, Frame, FrameCodec, ImageSpec, LabelSpec,
    PropertyValue, Unhandled, WidgetPayload,
};

fn set(element: u32, value: PropertyValue) -> Frame {
    Frame::SetProperty {
        container: gump(),
        element: ElementId::new(element),
        value,
    }
}

fn four_labels_and_42() -> (Form, Vec<Shared<LabelState>>) {
    let mut states = Vec::new();
    let mut children = Vec::new();
    for text in ["a", "b", "c", "d"] {
        let (widget, state) = Label::new(None, text);
        children.push(widget);
        states.push(state);
    }
    let (explicit, state) = Label::new(Some(42), "explicit");
    children.insert(1, explicit);
    states.insert(1, state);
    (Form::new(GUMP_SERIAL, children), states)
}

#[test]
fn test_positional_and_explicit_resolution() {
    let (form, _) = four_labels_and_42();
    // Position 3 holds the third anonymous label ("c") since 42 sits at index 1.
    let path = resolve_element(&form, ElementId::new(3)).unwrap();
    assert_eq!(path.as_slice(), &[3]);
    let path = resolve_element(&form, ElementId::new(42)).unwrap();
    assert_eq!(path.as_slice(), &[1]);
    assert!(resolve_element(&form, ElementId::new(5)).is_none());
}

#[test]
fn test_apply_by_position_and_by_explicit_id() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (form, states) = four_labels_and_42();
    let handle = host.open(form);
    s.client.track(gump(), handle);

    let outcome = s
        .client
        .handle_frame(&mut host, &set(3, PropertyValue::Text("third".to_owned())));
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(states[3].borrow().text, "third");

    let outcome = s.client.handle_frame(&mut host, &set(42, PropertyValue::X(-4)));
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(states[1].borrow().x, -4);
    assert_eq!(host.form(handle).dirty, 2);
}

#[test]
fn test_removal_keeps_later_positions() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let mut states = Vec::new();
    let mut children = Vec::new();
    for text in ["a", "b", "c", "d"] {
        let (widget, state) = Label::new(None, text);
        children.push(widget);
        states.push(state);
    }
    let handle = host.open(Form::new(GUMP_SERIAL, children));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let ids: Vec<_> = (0..4).map(|_| container.register(None)).collect();
    assert!(container.remove_element(ids[1]));
    container.update_property(ids[2], PropertyValue::Text("C!".to_owned()));
    s.server.flush(gump());

    let outcomes = pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Removed, ApplyOutcome::Applied]);
    assert!(states[1].borrow().disposed);
    assert_eq!(states[2].borrow().text, "C!");
    assert_eq!(states[3].borrow().text, "d");
    assert_eq!(host.form(handle).children.len(), 4);

    // The vacated position no longer resolves.
    let outcome = s
        .client
        .handle_frame(&mut host, &set(1, PropertyValue::Text("b?".to_owned())));
    assert_eq!(
        outcome,
        ApplyOutcome::Unresolved {
            container: gump(),
            element: Some(ids[1]),
        }
    );
    let again = Frame::RemoveElement {
        container: gump(),
        element: ids[1],
    };
    assert!(matches!(
        s.client.handle_frame(&mut host, &again),
        ApplyOutcome::Unresolved { .. }
    ));

    let outcome = s
        .client
        .handle_frame(&mut host, &set(3, PropertyValue::Hue(5)));
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(states[3].borrow().hue, Some(5));
}

#[test]
fn test_explicit_id_found_inside_panel() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (nested, state) = Label::new(Some(42), "nested");
    let (filler, _) = Label::new(None, "filler");
    let handle = host.open(Form::new(
        GUMP_SERIAL,
        vec![filler, Panel::new(None, vec![nested])],
    ));
    s.client.track(gump(), handle);

    let outcome = s
        .client
        .handle_frame(&mut host, &set(42, PropertyValue::Hue(7)));
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(state.borrow().hue, Some(7));
}

#[test]
fn test_missing_capability_is_unsupported_and_not_dirty() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (picture, _) = Picture::new(None, 0x1234);
    let handle = host.open(Form::new(GUMP_SERIAL, vec![picture]));
    s.client.track(gump(), handle);

    let outcome = s
        .client
        .handle_frame(&mut host, &set(0, PropertyValue::Text("no".to_owned())));
    assert_eq!(
        outcome,
        ApplyOutcome::Unsupported {
            container: gump(),
            element: ElementId::new(0),
        }
    );
    assert_eq!(host.form(handle).dirty, 0);

    let anim = Frame::Animation {
        container: gump(),
        element: ElementId::new(0),
        kind: AnimationKind::Pulse,
        duration_ms: 300,
    };
    assert!(matches!(
        s.client.handle_frame(&mut host, &anim),
        ApplyOutcome::Unsupported { .. }
    ));
}

#[test]
fn test_animation_reaches_animatable_widget() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (label, state) = Label::new(None, "!");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![label]));
    s.client.track(gump(), handle);

    let container = s.server.open_container(gump()).unwrap();
    let id = container.register(None);
    container.trigger_animation(id, AnimationKind::Shake, Duration::from_millis(400));
    s.server.flush(gump());

    let outcomes = crate::common::pump(&mut s.client, &mut host, &s.inbox);
    assert_eq!(outcomes, vec![ApplyOutcome::Animated]);
    assert_eq!(
        state.borrow().animations,
        vec![(AnimationKind::Shake, Duration::from_millis(400))]
    );
}

#[test]
fn test_untracked_container_found_by_local_id() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (label, state) = Label::new(None, "x");
    host.open(Form::new(0x9999, vec![label]).with_local_id(GUMP_SERIAL));

    let outcome = s
        .client
        .handle_frame(&mut host, &set(0, PropertyValue::Text("y".to_owned())));
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(state.borrow().text, "y");
}

#[test]
fn test_disposed_tracked_form_falls_back_to_scan() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (stale, stale_state) = Label::new(None, "old");
    let (fresh, fresh_state) = Label::new(None, "old");
    let stale_handle = host.open(Form::new(GUMP_SERIAL, vec![stale]));
    host.forms.get_mut(&stale_handle).unwrap().disposed = true;
    let fresh_handle = host.open(Form::new(GUMP_SERIAL, vec![fresh]));
    s.client.track(gump(), stale_handle);

    assert_eq!(s.client.resolve_container(&host, gump()), Some(fresh_handle));
    let outcome = s
        .client
        .handle_frame(&mut host, &set(0, PropertyValue::Text("new".to_owned())));
    assert_eq!(outcome, ApplyOutcome::Applied);
    assert_eq!(stale_state.borrow().text, "old");
    assert_eq!(fresh_state.borrow().text, "new");
}

#[test]
fn test_alias_resolves_and_close_untracks_all() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (label, state) = Label::new(None, "x");
    // The form reports a different serial so only the table can resolve the alias.
    let handle = host.open(Form::new(0x7777, vec![label]));
    let alias = ContainerId::new(0x0000_0005);
    s.client.track(gump(), handle);
    s.client.alias(alias, handle);

    let frame = Frame::SetProperty {
        container: alias,
        element: ElementId::new(0),
        value: PropertyValue::Visible(false),
    };
    assert_eq!(s.client.handle_frame(&mut host, &frame), ApplyOutcome::Applied);
    assert!(!state.borrow().visible);

    let close = Frame::Close { container: gump() };
    assert_eq!(s.client.handle_frame(&mut host, &close), ApplyOutcome::Closed);
    assert!(!s.client.is_tracked(gump()));
    assert!(!s.client.is_tracked(alias));
}

#[test]
fn test_duplicate_add_replaces_widget() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let handle = host.open(Form::new(GUMP_SERIAL, Vec::new()));
    s.client.track(gump(), handle);

    let add = |graphic| Frame::AddElement {
        container: gump(),
        element: ElementId::new(7),
        x: 10,
        y: 20,
        payload: WidgetPayload::Image(ImageSpec { graphic, hue: 0 }),
    };
    assert_eq!(s.client.handle_frame(&mut host, &add(1)), ApplyOutcome::Created);
    let first = host.created_pictures[&ElementId::new(7)].clone();
    assert_eq!(s.client.handle_frame(&mut host, &add(9270)), ApplyOutcome::Created);

    assert!(first.borrow().disposed);
    assert_eq!(host.form(handle).children.len(), 1);
    assert_eq!(
        host.created_pictures[&ElementId::new(7)].borrow().graphic,
        9270
    );
}

#[test]
fn test_refresh_frame_requests_refresh() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let handle = host.open(Form::new(GUMP_SERIAL, Vec::new()));
    s.client.track(gump(), handle);

    let outcome = s
        .client
        .handle_frame(&mut host, &Frame::Refresh { container: gump() });
    assert_eq!(outcome, ApplyOutcome::Refreshed);
    assert_eq!(host.form(handle).refreshes, 1);
    assert_eq!(host.form(handle).dirty, 0);
}

#[test]
fn test_unknown_property_and_sub_command_are_skipped() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (label, state) = Label::new(None, "keep");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![label]));
    s.client.track(gump(), handle);

    // SetProperty with property id 0x7F.
    let mut packet = vec![0xBF, 0x00, 0x0D, 0x01, 0x00];
    packet.extend_from_slice(&GUMP_SERIAL.to_be_bytes());
    packet.extend_from_slice(&0u32.to_be_bytes());
    packet.push(0x7F);
    packet.extend_from_slice(&[0xAA, 0xBB]);
    assert!(matches!(
        s.client.handle_packet(&mut host, &packet),
        ApplyOutcome::Unhandled(Unhandled::Property { value: 0x7F, .. })
    ));

    // Sub-command 0x0103 has no defined body.
    let packet = [0xBF, 0x00, 0x02, 0x01, 0x03];
    assert_eq!(
        s.client.handle_packet(&mut host, &packet),
        ApplyOutcome::Unhandled(Unhandled::SubCommand { value: 0x0103 })
    );

    assert_eq!(state.borrow().text, "keep");
    assert_eq!(
        s.observer
            .violations_of_kind(ViolationKind::UnknownDiscriminant)
            .len(),
        2
    );
}

#[test]
fn test_truncated_packet_is_malformed_and_harmless() {
    let mut s = connected_sessions();
    let mut host = StubHost::new();
    let (label, state) = Label::new(None, "keep");
    let handle = host.open(Form::new(GUMP_SERIAL, vec![label]));
    s.client.track(gump(), handle);

    let mut label_spec = LabelSpec::new("spawned");
    label_spec.font = Some(3);
    let packet = FrameCodec::default()
        .encode(&Frame::AddElement {
            container: gump(),
            element: ElementId::new(9),
            x: 0,
            y: 0,
            payload: WidgetPayload::Label(label_spec),
        })
        .unwrap();

    for cut in 0..packet.len() {
        let outcome = s.client.handle_packet(&mut host, &packet[..cut]);
        assert!(matches!(outcome, ApplyOutcome::Malformed(_)), "cut at {cut}");
    }
    assert!(host.created_labels.is_empty());
    assert_eq!(state.borrow().text, "keep");
    assert!(s.observer.has_violation(ViolationKind::MalformedFrame));
}
