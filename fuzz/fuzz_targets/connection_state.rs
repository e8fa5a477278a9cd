//! Fuzz target for the [`Connection`] state machine
//!
//! # Strategy
//!
//! - Event sequences: arbitrary interleavings of link outcomes, frames,
//!   sends and closes, including ones that are invalid for the current state
//!
//! # Invariants
//!
//! - No transition FROM `Closed` or `Failed` (terminal invariant)
//! - Frames and sends are only accepted while `Open`
//! - The negotiated transport never changes once set
//! - Resume attempts never exceed the configured maximum
//! - NEVER panic on an unexpected event

#![no_main]

use arbitrary::Arbitrary;
use distlock_core::{Connection, ConnectionConfig, ConnectionState, TransportKind};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Clone, Arbitrary)]
enum Event {
    Opened { long_polling: bool },
    NegotiationFailed { long_polling: bool },
    Lost,
    ReconnectFailed,
    Frame,
    Send,
    Fault,
    Close,
    RemoteClosed,
}

#[derive(Debug, Arbitrary)]
struct Input {
    max_reconnect_attempts: u8,
    same_fallback: bool,
    events: Vec<Event>,
}

fn kind(long_polling: bool) -> TransportKind {
    if long_polling { TransportKind::LongPolling } else { TransportKind::WebSocket }
}

fuzz_target!(|input: Input| {
    let config = ConnectionConfig {
        max_reconnect_attempts: u32::from(input.max_reconnect_attempts % 8),
        fallback: if input.same_fallback {
            TransportKind::WebSocket
        } else {
            TransportKind::LongPolling
        },
        ..Default::default()
    };
    let max = config.max_reconnect_attempts;
    let (mut conn, _) = Connection::open(config);
    let mut negotiated = None;

    for event in input.events {
        let before = conn.state();

        let accepted = match event {
            Event::Opened { long_polling } => conn.opened(kind(long_polling)).is_ok(),
            Event::NegotiationFailed { long_polling } => {
                conn.negotiation_failed(kind(long_polling), "fuzz").is_ok()
            },
            Event::Lost => conn.connection_lost("fuzz").is_ok(),
            Event::ReconnectFailed => conn.reconnect_failed("fuzz").is_ok(),
            Event::Frame => conn.frame_received("{}".to_string()).is_ok(),
            Event::Send => conn.send("{}".to_string()).is_ok(),
            Event::Fault => {
                conn.fault("fuzz");
                true
            },
            Event::Close => {
                conn.close();
                true
            },
            Event::RemoteClosed => {
                conn.remote_closed();
                true
            },
        };

        if before.is_terminal() {
            assert_eq!(conn.state(), before, "left terminal state on {event:?}");
        }
        if matches!(event, Event::Frame | Event::Send) {
            assert_eq!(accepted, before == ConnectionState::Open);
        }

        match (negotiated, conn.descriptor().negotiated) {
            (None, now) => negotiated = now,
            (Some(prev), now) => assert_eq!(Some(prev), now, "negotiated transport changed"),
        }
        assert!(conn.reconnect_attempts() <= max.max(1));
    }
});
