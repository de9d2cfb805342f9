//! Property-based tests for the frame codec and the server registry.
//!
//! These tests use proptest to verify invariants hold under random inputs,
//! leveraging the exposed __internal module for direct component testing.
//!
//! # Invariants Tested
//!
//! ## Codec
//! - Every frame with in-range fields decodes to itself.
//! - Any strict prefix of an encoded frame fails to decode.
//! - Trailing bytes never change the leading frame.
//! - Arbitrary input never panics the decoder.
//! - Oversized text is clamped to a char-boundary prefix.
//!
//! ## Registry
//! - N registrations yield identifiers 0..N.
//! - Flush sends exactly the queued updates, in order, and empties the queue.

// Allow test-specific patterns that are appropriate for test code
#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing
)]

use livegump::__internal::{decode_body, WireReader};
use livegump::network::codec::WireField;
use livegump::{
    AnimationKind, ContainerId, Decoded, ElementId, Frame, FrameCodec, ImageSpec, LabelSpec,
    LiveContainer, LoopbackTransport, PropertyValue, Transport, WidgetPayload, MAX_TEXT_LEN,
};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn short_text() -> impl Strategy<Value = String> {
    proptest::string::string_regex("[ -~äß€🎉]{0,48}").unwrap()
}

fn property_value() -> impl Strategy<Value = PropertyValue> {
    prop_oneof![
        short_text().prop_map(PropertyValue::Text),
        any::<u16>().prop_map(PropertyValue::Hue),
        any::<bool>().prop_map(PropertyValue::Visible),
        any::<i16>().prop_map(PropertyValue::X),
        any::<i16>().prop_map(PropertyValue::Y),
        any::<u16>().prop_map(PropertyValue::Width),
        any::<u16>().prop_map(PropertyValue::Height),
        any::<u16>().prop_map(PropertyValue::Graphic),
    ]
}

fn payload() -> impl Strategy<Value = WidgetPayload> {
    let bytes = proptest::collection::vec(any::<u8>(), 0..32);
    prop_oneof![
        // Reserved hue/font values fold to None through the builders.
        (short_text(), proptest::option::of(any::<u16>()), proptest::option::of(any::<u8>()))
            .prop_map(|(text, hue, font)| {
                let mut label = LabelSpec::new(text);
                if let Some(hue) = hue {
                    label = label.with_hue(hue);
                }
                if let Some(font) = font {
                    label = label.with_font(font);
                }
                WidgetPayload::Label(label)
            }),
        (any::<u16>(), any::<u16>())
            .prop_map(|(graphic, hue)| WidgetPayload::Image(ImageSpec { graphic, hue })),
        bytes.clone().prop_map(WidgetPayload::HtmlText),
        bytes.clone().prop_map(WidgetPayload::Button),
        bytes.prop_map(WidgetPayload::TextEntry),
    ]
}

fn animation_kind() -> impl Strategy<Value = AnimationKind> {
    (1u8..=7).prop_map(|raw| AnimationKind::from_u8(raw).unwrap())
}

fn frame() -> impl Strategy<Value = Frame> {
    let container = any::<u32>().prop_map(ContainerId::new);
    let element = any::<u32>().prop_map(ElementId::new);
    prop_oneof![
        (container.clone(), element.clone(), property_value()).prop_map(
            |(container, element, value)| Frame::SetProperty {
                container,
                element,
                value
            }
        ),
        (
            container.clone(),
            element.clone(),
            any::<i16>(),
            any::<i16>(),
            payload()
        )
            .prop_map(|(container, element, x, y, payload)| Frame::AddElement {
                container,
                element,
                x,
                y,
                payload
            }),
        (container.clone(), element.clone())
            .prop_map(|(container, element)| Frame::RemoveElement { container, element }),
        (container.clone(), element, animation_kind(), any::<u16>()).prop_map(
            |(container, element, kind, duration_ms)| Frame::Animation {
                container,
                element,
                kind,
                duration_ms
            }
        ),
        container
            .clone()
            .prop_map(|container| Frame::Refresh { container }),
        container.prop_map(|container| Frame::Close { container }),
    ]
}

// ============================================================================
// Codec properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn prop_round_trip(frame in frame()) {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&frame).unwrap();
        let (decoded, consumed) = codec.decode(&bytes).unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(decoded, Decoded::Frame(frame));
    }

    #[test]
    fn prop_prefix_never_decodes(frame in frame(), cut in any::<prop::sample::Index>()) {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&frame).unwrap();
        let cut = cut.index(bytes.len());
        prop_assert!(codec.decode(&bytes[..cut]).is_err());
    }

    #[test]
    fn prop_trailing_bytes_ignored(
        frame in frame(),
        tail in proptest::collection::vec(any::<u8>(), 1..16),
    ) {
        let codec = FrameCodec::default();
        let bytes = codec.encode(&frame).unwrap();
        let mut padded = bytes.clone();
        padded.extend_from_slice(&tail);
        let (decoded, consumed) = codec.decode(&padded).unwrap();
        prop_assert_eq!(consumed, bytes.len());
        prop_assert_eq!(decoded, Decoded::Frame(frame));
    }

    #[test]
    fn prop_arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..64)) {
        if let Ok((_, consumed)) = FrameCodec::default().decode(&bytes) {
            prop_assert!(consumed <= bytes.len());
        }
    }

    #[test]
    fn prop_arbitrary_bodies_never_panic(
        sub_command in 0x00FFu16..0x0109,
        body in proptest::collection::vec(any::<u8>(), 0..40),
    ) {
        let _ = decode_body(sub_command, &body, MAX_TEXT_LEN);
    }

    #[test]
    fn prop_reader_stays_in_bounds(
        bytes in proptest::collection::vec(any::<u8>(), 0..16),
        takes in proptest::collection::vec(0usize..8, 0..8),
    ) {
        let mut reader = WireReader::new(&bytes);
        for take in takes {
            let before = reader.position();
            if reader.read_bytes(take, WireField::Packet).is_ok() {
                prop_assert_eq!(reader.position(), before + take);
            } else {
                prop_assert_eq!(reader.position(), before);
            }
        }
        prop_assert!(reader.position() <= bytes.len());
    }

    #[test]
    fn prop_text_clamped_at_char_boundary(extra in 1usize..64, ch in prop::sample::select(vec!['a', 'é', '€', '🎉'])) {
        let text: String = std::iter::repeat(ch).take(MAX_TEXT_LEN / ch.len_utf8() + extra).collect();
        let frame = Frame::SetProperty {
            container: ContainerId::new(1),
            element: ElementId::new(0),
            value: PropertyValue::Text(text.clone()),
        };
        let codec = FrameCodec::default();
        let (decoded, _) = codec.decode(&codec.encode(&frame).unwrap()).unwrap();
        match decoded {
            Decoded::Frame(Frame::SetProperty { value: PropertyValue::Text(clamped), .. }) => {
                prop_assert!(clamped.len() <= MAX_TEXT_LEN);
                prop_assert!(MAX_TEXT_LEN - clamped.len() < ch.len_utf8());
                prop_assert!(text.starts_with(&clamped));
            },
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }
}

// ============================================================================
// Registry properties
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Update(u32, PropertyValue),
    Animate(u32, AnimationKind, u16),
    Refresh,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u32..12, property_value()).prop_map(|(id, value)| Op::Update(id, value)),
        (0u32..12, animation_kind(), any::<u16>()).prop_map(|(id, kind, ms)| Op::Animate(id, kind, ms)),
        Just(Op::Refresh),
    ]
}

proptest! {
    #[test]
    fn prop_register_is_sequential(n in 0usize..64) {
        let mut container = LiveContainer::new(ContainerId::new(9));
        for expected in 0..n {
            prop_assert_eq!(container.register(None), ElementId::new(expected as u32));
        }
        prop_assert_eq!(container.len(), n);
    }

    #[test]
    fn prop_flush_sends_queue_in_order(registered in 0u32..8, ops in proptest::collection::vec(op(), 0..32)) {
        let gump = ContainerId::new(0x4000_0001);
        let mut container = LiveContainer::new(gump);
        for _ in 0..registered {
            container.register(None);
        }
        for op in ops {
            match op {
                Op::Update(id, value) => {
                    let tracked = id < registered;
                    prop_assert_eq!(container.update_property(ElementId::new(id), value), tracked);
                },
                Op::Animate(id, kind, ms) => container.trigger_animation(
                    ElementId::new(id),
                    kind,
                    std::time::Duration::from_millis(u64::from(ms)),
                ),
                Op::Refresh => container.request_refresh(),
            }
        }
        let expected: Vec<Frame> = container.pending().map(|u| u.to_frame(gump)).collect();

        let (mut transport, inbox) = LoopbackTransport::pair();
        let codec = FrameCodec::default();
        let sent = container.flush(Some(&mut transport as &mut dyn Transport), &codec);
        prop_assert_eq!(sent, expected.len());
        prop_assert_eq!(container.pending_len(), 0);

        let received: Vec<Frame> = inbox
            .drain()
            .iter()
            .map(|p| match codec.decode(p).unwrap().0 {
                Decoded::Frame(frame) => frame,
                Decoded::Unhandled(u) => panic!("unexpected {u}"),
            })
            .collect();
        prop_assert_eq!(received, expected);
    }
}
