//! Fuzz target for request decoding
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary input
//! - A decoded request has at least one parameter
//! - Encoding a decoded request yields a frame that decodes to it

#![no_main]

use distlock_proto::Request;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(request) = Request::decode(raw) else {
        return;
    };

    assert!(!request.params().is_empty());
    let encoded = request.encode().expect("decoded request must encode");
    assert_eq!(Request::decode(&encoded).expect("round trip"), request);
});
