//! Fuzz target for frame decoding.
//!
//! This target tests that arbitrary bytes cannot crash the frame decoder.
//! Malformed or malicious packets must be reported as errors or unhandled
//! discriminants, never as panics.
//!
//! # Safety Properties Tested
//! - No panics on arbitrary input
//! - Consumed length never exceeds the input
//! - A decoded frame re-encodes, and the re-encoded bytes are a fixed point

#![no_main]

use libfuzzer_sys::fuzz_target;

use livegump::{Decoded, FrameCodec};

fuzz_target!(|data: &[u8]| {
    let codec = FrameCodec::default();
    let Ok((decoded, consumed)) = codec.decode(data) else {
        return;
    };
    assert!(consumed <= data.len());

    if let Decoded::Frame(frame) = decoded {
        // Lossy text can grow past the limit and be clamped again, so compare bytes.
        let bytes = codec.encode(&frame).expect("decoded frames always re-encode");
        let (again, again_consumed) = codec.decode(&bytes).expect("re-encoded frame decodes");
        assert_eq!(again_consumed, bytes.len());
        let Decoded::Frame(again) = again else {
            panic!("re-encoded frame decoded as unhandled");
        };
        assert_eq!(codec.encode(&again).expect("stable frame re-encodes"), bytes);
    }
});
