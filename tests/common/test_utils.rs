//! Session wiring helpers.

#![allow(dead_code)]

use std::sync::Arc;

use livegump::telemetry::CollectingObserver;
use livegump::{
    ApplyOutcome, ClientSession, ContainerId, LoopbackInbox, LoopbackTransport, ServerSession,
    SessionBuilder, UiHost,
};

/// Serial used by most scenarios.
pub const GUMP_SERIAL: u32 = 0x4000_0042;

/// Both halves of one connection, with a shared observer.
pub struct Sessions {
    pub server: ServerSession<LoopbackTransport>,
    pub inbox: LoopbackInbox,
    pub client: ClientSession<u32>,
    pub observer: Arc<CollectingObserver>,
}

/// Routes `tracing` output to the test harness. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub fn connected_sessions() -> Sessions {
    init_tracing();
    let observer = Arc::new(CollectingObserver::new());
    let (transport, inbox) = LoopbackTransport::pair();
    let server = SessionBuilder::new()
        .with_violation_observer(observer.clone())
        .start_server_session(transport)
        .expect("default config is valid");
    let client = SessionBuilder::new()
        .with_violation_observer(observer.clone())
        .start_client_session()
        .expect("default config is valid");
    Sessions {
        server,
        inbox,
        client,
        observer,
    }
}

/// Delivers every packet waiting in `inbox` to the client.
pub fn pump<U>(client: &mut ClientSession<u32>, host: &mut U, inbox: &LoopbackInbox) -> Vec<ApplyOutcome>
where
    U: UiHost<Handle = u32>,
{
    inbox
        .drain()
        .iter()
        .map(|packet| client.handle_packet(host, packet))
        .collect()
}

pub const fn gump() -> ContainerId {
    ContainerId::new(GUMP_SERIAL)
}
