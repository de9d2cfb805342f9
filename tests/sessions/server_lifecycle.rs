//! Server session lifecycle: registration, flushing, refresh and close.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use std::time::{Duration, Instant};

use crate::common::stubs::RecordingTransport;
use crate::common::{connected_sessions, gump};
use livegump::network::snapshot::decode_pending;
use livegump::{
    AnimationKind, ContainerId, ContainerPhase, Decoded, ElementId, Frame, FrameCodec,
    LiveGumpError, PendingOp, PropertyValue, RefreshConfig, RefreshFault, SessionBuilder,
};

fn decode_all(packets: &[Vec<u8>]) -> Vec<Frame> {
    let codec = FrameCodec::default();
    packets
        .iter()
        .map(|p| match codec.decode(p).unwrap().0 {
            Decoded::Frame(frame) => frame,
            Decoded::Unhandled(u) => panic!("unexpected unhandled {u}"),
        })
        .collect()
}

#[test]
fn test_register_assigns_sequential_ids() {
    let mut s = connected_sessions();
    let container = s.server.open_container(gump()).unwrap();
    let ids: Vec<_> = (0..16).map(|_| container.register(None)).collect();
    let expected: Vec<_> = (0..16).map(ElementId::new).collect();
    assert_eq!(ids, expected);
    assert_eq!(container.len(), 16);
    assert_eq!(container.phase(), ContainerPhase::Building);
}

#[test]
fn test_update_of_unregistered_element_is_noop() {
    let mut s = connected_sessions();
    let container = s.server.open_container(gump()).unwrap();
    let id = container.register(Some("gold"));
    container.update_property(id, PropertyValue::Text("10".to_owned()));
    let before: Vec<_> = container.pending().cloned().collect();

    assert!(!container.update_property(ElementId::new(99), PropertyValue::Hue(1)));
    assert!(!container.update_property_by_name("silver", PropertyValue::Hue(1)));
    assert!(!container.remove_element(ElementId::new(99)));
    let after: Vec<_> = container.pending().cloned().collect();
    assert_eq!(before, after);
    assert_eq!(
        container.element(id).unwrap().state().text.as_deref(),
        Some("10")
    );
}

#[test]
fn test_flush_sends_in_enqueue_order() {
    let mut server = SessionBuilder::new()
        .start_server_session(RecordingTransport::connected())
        .unwrap();
    let container = server.open_container(gump()).unwrap();
    let a = container.register(Some("a"));
    let b = container.register(Some("b"));
    container.update_property_by_name("b", PropertyValue::Y(3));
    container.update_property(a, PropertyValue::Graphic(0x0EED));
    container.trigger_animation(b, AnimationKind::Flash, Duration::from_millis(120));
    container.request_refresh();

    assert_eq!(server.flush(gump()), 4);
    assert_eq!(server.container(gump()).unwrap().pending_len(), 0);
    assert_eq!(server.container(gump()).unwrap().phase(), ContainerPhase::Open);

    let frames = decode_all(&server.transport().unwrap().packets);
    assert_eq!(
        frames,
        vec![
            Frame::SetProperty {
                container: gump(),
                element: b,
                value: PropertyValue::Y(3),
            },
            Frame::SetProperty {
                container: gump(),
                element: a,
                value: PropertyValue::Graphic(0x0EED),
            },
            Frame::Animation {
                container: gump(),
                element: b,
                kind: AnimationKind::Flash,
                duration_ms: 120,
            },
            Frame::Refresh { container: gump() },
        ]
    );
    // Nothing left to send.
    assert_eq!(server.flush(gump()), 0);
}

#[test]
fn test_flush_all_and_disconnect() {
    let mut s = connected_sessions();
    let other = ContainerId::new(0x4000_0099);
    for id in [gump(), other] {
        let container = s.server.open_container(id).unwrap();
        let e = container.register(None);
        container.update_property(e, PropertyValue::Visible(false));
    }
    assert_eq!(
        s.server.container_ids().collect::<Vec<_>>(),
        vec![gump(), other]
    );
    assert_eq!(s.server.flush_all(), 2);
    assert_eq!(s.inbox.drain().len(), 2);

    s.inbox.set_connected(false);
    assert!(!s.server.is_connected());
    s.server
        .container_mut(gump())
        .unwrap()
        .request_refresh();
    assert_eq!(s.server.flush_all(), 0);
    assert_eq!(s.server.container(gump()).unwrap().pending_len(), 0);
    assert!(s.inbox.is_empty());

    assert!(s.server.disconnect().is_some());
    assert!(s.server.transport().is_none());
    assert_eq!(s.server.flush(ContainerId::new(1)), 0);
}

#[test]
fn test_close_errors_and_reopen() {
    let mut s = connected_sessions();
    assert_eq!(
        s.server.close_container(gump()),
        Err(LiveGumpError::UnknownContainer { container: gump() })
    );
    s.server.open_container(gump()).unwrap();
    assert!(matches!(
        s.server.open_container(gump()),
        Err(LiveGumpError::ContainerAlreadyOpen { .. })
    ));
    s.server.close_container(gump()).unwrap();
    assert_eq!(
        decode_all(&s.inbox.drain()),
        vec![Frame::Close { container: gump() }]
    );
    assert!(s.server.open_container(gump()).is_ok());
}

#[test]
fn test_periodic_refresh_drives_updates() {
    let mut s = connected_sessions();
    let container = s.server.open_container(gump()).unwrap();
    let clock = container.register(Some("clock"));
    let start = Instant::now();
    let mut ticks = 0u32;
    s.server
        .start_periodic_refresh_at(gump(), Duration::from_secs(1), start, move |c| {
            ticks += 1;
            c.update_property(clock, PropertyValue::Text(format!("{ticks}s")));
            Ok(())
        })
        .unwrap();
    assert!(s.server.is_auto_refreshing(gump()));

    // A late poll runs one tick, not a burst of missed ones.
    assert_eq!(s.server.poll_refresh(start + Duration::from_secs(3)), 1);
    assert_eq!(s.server.poll_refresh(start + Duration::from_secs(3)), 0);
    assert_eq!(s.server.poll_refresh(start + Duration::from_secs(4)), 1);
    let frames = decode_all(&s.inbox.drain());
    assert_eq!(
        frames,
        vec![
            Frame::SetProperty {
                container: gump(),
                element: clock,
                value: PropertyValue::Text("1s".to_owned()),
            },
            Frame::SetProperty {
                container: gump(),
                element: clock,
                value: PropertyValue::Text("2s".to_owned()),
            },
        ]
    );

    assert!(s.server.stop_periodic_refresh(gump()));
    assert!(!s.server.stop_periodic_refresh(gump()));
    assert_eq!(s.server.container(gump()).unwrap().phase(), ContainerPhase::Open);
    assert_eq!(s.server.next_refresh_due(), None);
}

#[test]
fn test_failing_refresh_cancels_itself() {
    let mut s = connected_sessions();
    s.server.open_container(gump()).unwrap();
    let start = Instant::now();
    let mut calls = 0;
    s.server
        .start_periodic_refresh_at(gump(), Duration::from_millis(250), start, move |_| {
            calls += 1;
            if calls == 2 {
                Err(RefreshFault::new("leaderboard unavailable"))
            } else {
                Ok(())
            }
        })
        .unwrap();

    assert_eq!(s.server.poll_refresh(start + Duration::from_millis(250)), 1);
    assert_eq!(s.server.poll_refresh(start + Duration::from_millis(500)), 1);
    assert!(!s.server.is_auto_refreshing(gump()));
    assert_eq!(s.server.poll_refresh(start + Duration::from_millis(750)), 0);
    assert!(s
        .observer
        .has_violation(livegump::telemetry::ViolationKind::RefreshFault));
}

#[test]
fn test_refresh_interval_respects_minimum() {
    let mut server = SessionBuilder::new()
        .with_refresh_config(RefreshConfig::relaxed())
        .start_server_session(RecordingTransport::connected())
        .unwrap();
    server.open_container(gump()).unwrap();
    let too_fast = Duration::from_millis(10);
    assert!(matches!(
        server.start_periodic_refresh(gump(), too_fast, |_| Ok(())),
        Err(LiveGumpError::InvalidConfig { .. })
    ));
    assert!(server.start_default_refresh(gump(), |_| Ok(())).is_ok());
    assert_eq!(
        server.container(gump()).unwrap().phase(),
        ContainerPhase::AutoRefreshing
    );
}

#[test]
fn test_pending_snapshot_is_inspectable() {
    let mut s = connected_sessions();
    let container = s.server.open_container(gump()).unwrap();
    let hp = container.register(Some("hp"));
    container.update_property(hp, PropertyValue::Width(80));
    container.request_refresh();

    let bytes = s.server.snapshot_pending(gump()).unwrap();
    let ops: Vec<_> = decode_pending(&bytes)
        .unwrap()
        .into_iter()
        .map(|u| u.op)
        .collect();
    assert_eq!(
        ops,
        vec![
            PendingOp::SetProperty {
                element: hp,
                value: PropertyValue::Width(80),
            },
            PendingOp::Refresh,
        ]
    );
    assert!(matches!(
        s.server.snapshot_pending(ContainerId::new(3)),
        Err(LiveGumpError::UnknownContainer { .. })
    ));
}
