//! Fuzz target for notification decoding
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary input
//! - A decoded notification re-encodes, and the re-encoded frame decodes to
//!   the same notification

#![no_main]

use distlock_proto::Notification;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(notification) = Notification::decode(raw) else {
        return;
    };

    let encoded = notification.encode().expect("decoded notification must encode");
    let again = Notification::decode(&encoded).expect("encoded notification must decode");
    assert_eq!(again, notification);
});
