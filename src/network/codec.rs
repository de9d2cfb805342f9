//! Packet layout:
//!
//! ```text
//! frame_id(1) | total_len(2) | sub_command(2) | body
//!               \______ total_len covers these ______/
//! ```
//!
//! All multi-byte integers are big-endian. Body layouts per sub-command:
//!
//! | Sub-command | Body |
//! |---|---|
//! | SetProperty | container(4) element(4) property(1) value |
//! | AddElement | container(4) element(4) widget_type(1) x(i16) y(i16) payload |
//! | RemoveElement | container(4) element(4) |
//! | Animation | container(4) element(4) animation(1) duration_ms(2) |
//! | Refresh / Close | container(4) |
//!
//! Text values are prefixed with a 16-bit byte length and clamped to
//! [`CodecConfig::max_text_len`] in both directions.
//!
//! Decoding never reads past the buffer. A short field yields
//! [`CodecError::Truncated`]; an unknown sub-command, property, widget type or
//! animation type yields [`Decoded::Unhandled`], which is not an error.
//!
//! # Examples
//!
//! ```
//! use livegump::network::codec::{decode, encode, Decoded};
//! use livegump::{ContainerId, Frame};
//!
//! let frame = Frame::Refresh { container: ContainerId::new(0x4000_0001) };
//! let packet = encode(&frame).expect("encoding should succeed");
//! assert_eq!(packet, [0xBF, 0x00, 0x06, 0x01, 0x06, 0x40, 0x00, 0x00, 0x01]);
//!
//! let (decoded, consumed) = decode(&packet).expect("decoding should succeed");
//! assert_eq!(decoded, Decoded::Frame(frame));
//! assert_eq!(consumed, packet.len());
//! ```

use std::fmt;

use tracing::debug;

use crate::network::messages::{
    AnimationKind, Frame, ImageSpec, LabelSpec, PropertyId, PropertyValue, SubCommand,
    WidgetKind, WidgetPayload,
};
use crate::network::wire::{WireReader, WireWriter};
use crate::sessions::config::CodecConfig;
use crate::{ContainerId, ElementId, FONT_ABSENT, HUE_ABSENT};

/// Bytes before the length-covered region: the frame id and the length itself.
pub const ENVELOPE_PREFIX_LEN: usize = 3;

/// Bytes of the sub-command field, which the length covers.
pub const SUB_COMMAND_LEN: usize = 2;

/// Largest body one frame can carry.
pub const MAX_BODY_LEN: usize = u16::MAX as usize - SUB_COMMAND_LEN;

/// Fixed bytes of an AddElement body ahead of the payload: ids, kind, position.
const ADD_ELEMENT_HEADER_LEN: usize = 4 + 4 + 1 + 2 + 2;

/// Fixed bytes around the text of a label AddElement, the largest
/// text-carrying body: header, text length, hue, font.
const LABEL_BODY_OVERHEAD: usize = ADD_ELEMENT_HEADER_LEN + 2 + 2 + 1;

/// Largest text limit for which every text-carrying frame fits in one packet.
pub const MAX_TEXT_LIMIT: usize = MAX_BODY_LEN - LABEL_BODY_OVERHEAD;

/// Names a field of the wire format, for truncation diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum WireField {
    /// The host protocol's frame identifier byte.
    FrameId,
    /// The 16-bit total length.
    Length,
    /// The region covered by the total length.
    Packet,
    /// The 16-bit sub-command.
    SubCommand,
    /// The 32-bit container identifier.
    ContainerId,
    /// The 32-bit element identifier.
    ElementId,
    /// The property discriminant.
    PropertyId,
    /// The 16-bit text length prefix.
    TextLength,
    /// Text bytes.
    Text,
    /// A color value.
    Hue,
    /// A visibility flag.
    Visible,
    /// A horizontal position.
    X,
    /// A vertical position.
    Y,
    /// A width.
    Width,
    /// A height.
    Height,
    /// A graphic reference.
    Graphic,
    /// The widget-type discriminant.
    WidgetType,
    /// A label font.
    Font,
    /// The animation discriminant.
    AnimationType,
    /// An animation duration.
    Duration,
}

impl WireField {
    /// Returns a string representation suitable for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FrameId => "frame_id",
            Self::Length => "total_len",
            Self::Packet => "packet",
            Self::SubCommand => "sub_command",
            Self::ContainerId => "container_id",
            Self::ElementId => "element_id",
            Self::PropertyId => "property_id",
            Self::TextLength => "text_len",
            Self::Text => "text",
            Self::Hue => "hue",
            Self::Visible => "visible",
            Self::X => "x",
            Self::Y => "y",
            Self::Width => "width",
            Self::Height => "height",
            Self::Graphic => "graphic",
            Self::WidgetType => "widget_type",
            Self::Font => "font",
            Self::AnimationType => "animation_type",
            Self::Duration => "duration_ms",
        }
    }
}

impl fmt::Display for WireField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CodecError {
    /// A field needed more bytes than were left.
    Truncated {
        /// The field being read.
        field: WireField,
        /// Bytes the field needs.
        needed: usize,
        /// Bytes that were left.
        remaining: usize,
    },
    /// The packet does not belong to the extended command channel.
    WrongFrameId {
        /// The configured frame id.
        expected: u8,
        /// The frame id found.
        actual: u8,
    },
    /// The declared length cannot even cover the sub-command.
    LengthOutOfRange {
        /// The declared total length.
        declared: u16,
    },
    /// The encoded frame would not fit the 16-bit length field.
    PayloadTooLarge {
        /// Length the frame would need.
        len: usize,
        /// Largest length the field can express.
        max: usize,
    },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated {
                field,
                needed,
                remaining,
            } => write!(
                f,
                "truncated frame: {field} needs {needed} bytes, only {remaining} left"
            ),
            Self::WrongFrameId { expected, actual } => write!(
                f,
                "unexpected frame id 0x{actual:02X} (expected 0x{expected:02X})"
            ),
            Self::LengthOutOfRange { declared } => {
                write!(f, "declared length {declared} is shorter than a sub-command")
            },
            Self::PayloadTooLarge { len, max } => {
                write!(f, "frame length {len} exceeds the maximum of {max}")
            },
        }
    }
}

impl std::error::Error for CodecError {}

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// A discriminant the decoder does not recognize.
///
/// The frame is dropped without side effects. Element-level variants keep the
/// identifiers that were read before the unknown value, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unhandled {
    /// A reserved or foreign sub-command.
    SubCommand {
        /// The raw sub-command.
        value: u16,
    },
    /// An unknown property id in a SetProperty frame.
    Property {
        /// Owning container.
        container: ContainerId,
        /// Target widget.
        element: ElementId,
        /// The raw property id.
        value: u8,
    },
    /// An unknown widget type in an AddElement frame.
    Widget {
        /// Owning container.
        container: ContainerId,
        /// Requested identifier.
        element: ElementId,
        /// The raw widget type.
        value: u8,
    },
    /// An unknown animation type in an Animation frame.
    Animation {
        /// Owning container.
        container: ContainerId,
        /// Target widget.
        element: ElementId,
        /// The raw animation type.
        value: u8,
    },
}

impl Unhandled {
    /// The container named by the frame, when it was read.
    #[must_use]
    pub const fn container(&self) -> Option<ContainerId> {
        match self {
            Self::SubCommand { .. } => None,
            Self::Property { container, .. }
            | Self::Widget { container, .. }
            | Self::Animation { container, .. } => Some(*container),
        }
    }
}

impl fmt::Display for Unhandled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SubCommand { value } => write!(f, "unhandled sub-command 0x{value:04X}"),
            Self::Property { value, .. } => write!(f, "unhandled property id 0x{value:02X}"),
            Self::Widget { value, .. } => write!(f, "unhandled widget type 0x{value:02X}"),
            Self::Animation { value, .. } => write!(f, "unhandled animation type 0x{value:02X}"),
        }
    }
}

/// Outcome of decoding one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    /// A recognized frame.
    Frame(Frame),
    /// A well-formed packet with an unrecognized discriminant.
    Unhandled(Unhandled),
}

/// Encoder/decoder bound to one [`CodecConfig`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameCodec {
    config: CodecConfig,
}

impl FrameCodec {
    /// Creates a codec for the given configuration.
    #[must_use]
    pub const fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    /// The configuration this codec uses.
    #[must_use]
    pub const fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encodes one frame into a complete packet.
    pub fn encode(&self, frame: &Frame) -> CodecResult<Vec<u8>> {
        let mut out = Vec::new();
        self.encode_append(frame, &mut out)?;
        Ok(out)
    }

    /// Appends one complete packet to `out`, returning the bytes written.
    ///
    /// On error `out` is left unchanged.
    pub fn encode_append(&self, frame: &Frame, out: &mut Vec<u8>) -> CodecResult<usize> {
        let mut body = WireWriter::new();
        encode_body(frame, self.config.max_text_len, &mut body)?;

        let total = SUB_COMMAND_LEN + body.len();
        let total_len = u16::try_from(total).map_err(|_| CodecError::PayloadTooLarge {
            len: total,
            max: u16::MAX as usize,
        })?;

        let start = out.len();
        out.reserve(ENVELOPE_PREFIX_LEN + total);
        out.push(self.config.frame_id);
        out.extend_from_slice(&total_len.to_be_bytes());
        out.extend_from_slice(&frame.sub_command().as_u16().to_be_bytes());
        out.extend_from_slice(&body.into_inner());
        Ok(out.len() - start)
    }

    /// Decodes the packet at the start of `bytes`.
    ///
    /// Returns the outcome and the number of bytes the packet occupied. Bytes
    /// after the declared length are not examined.
    pub fn decode(&self, bytes: &[u8]) -> CodecResult<(Decoded, usize)> {
        let mut reader = WireReader::new(bytes);
        let frame_id = reader.read_u8(WireField::FrameId)?;
        if frame_id != self.config.frame_id {
            return Err(CodecError::WrongFrameId {
                expected: self.config.frame_id,
                actual: frame_id,
            });
        }
        let declared = reader.read_u16(WireField::Length)?;
        if (declared as usize) < SUB_COMMAND_LEN {
            return Err(CodecError::LengthOutOfRange { declared });
        }
        let packet = reader.read_bytes(declared as usize, WireField::Packet)?;

        let mut inner = WireReader::new(packet);
        let sub_command = inner.read_u16(WireField::SubCommand)?;
        let body = inner.read_rest();
        let decoded = decode_body(sub_command, body, self.config.max_text_len)?;
        Ok((decoded, reader.position()))
    }
}

/// Encodes a frame with the default configuration.
pub fn encode(frame: &Frame) -> CodecResult<Vec<u8>> {
    FrameCodec::default().encode(frame)
}

/// Decodes a packet with the default configuration.
pub fn decode(bytes: &[u8]) -> CodecResult<(Decoded, usize)> {
    FrameCodec::default().decode(bytes)
}

fn clamp_text(text: &str, max_len: usize) -> &str {
    if text.len() <= max_len {
        return text;
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.get(..end).unwrap_or_default()
}

fn put_text(out: &mut WireWriter, text: &str, max_len: usize) {
    let clamped = clamp_text(text, max_len.min(u16::MAX as usize));
    out.put_u16(clamped.len() as u16);
    out.put_bytes(clamped.as_bytes());
}

fn read_text(reader: &mut WireReader<'_>, max_len: usize) -> CodecResult<String> {
    let declared = reader.read_u16(WireField::TextLength)? as usize;
    let len = if declared > max_len {
        debug!(declared, max_len, "clamping declared text length");
        max_len
    } else {
        declared
    };
    let bytes = reader.read_bytes(len, WireField::Text)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

/// Checks that an AddElement carrying `payload` fits in one frame.
///
/// Label text is clamped on encode and always fits under a validated
/// configuration; only opaque payloads can be too long.
///
/// # Errors
/// Returns [`CodecError::PayloadTooLarge`] if the frame would exceed the
/// 16-bit length field.
pub fn check_payload_len(payload: &WidgetPayload) -> CodecResult<()> {
    let len = match payload {
        WidgetPayload::HtmlText(bytes)
        | WidgetPayload::Button(bytes)
        | WidgetPayload::TextEntry(bytes) => bytes.len(),
        WidgetPayload::Label(_) | WidgetPayload::Image(_) => return Ok(()),
    };
    let total = SUB_COMMAND_LEN + ADD_ELEMENT_HEADER_LEN + len;
    if total > u16::MAX as usize {
        return Err(CodecError::PayloadTooLarge {
            len: total,
            max: u16::MAX as usize,
        });
    }
    Ok(())
}

/// Writes the body of `frame` (everything after the sub-command).
pub fn encode_body(frame: &Frame, max_text_len: usize, out: &mut WireWriter) -> CodecResult<()> {
    match frame {
        Frame::SetProperty {
            container,
            element,
            value,
        } => {
            out.put_u32(container.as_u32());
            out.put_u32(element.as_u32());
            out.put_u8(value.id().as_u8());
            match value {
                PropertyValue::Text(text) => put_text(out, text, max_text_len),
                PropertyValue::Hue(v)
                | PropertyValue::Width(v)
                | PropertyValue::Height(v)
                | PropertyValue::Graphic(v) => out.put_u16(*v),
                PropertyValue::X(v) | PropertyValue::Y(v) => out.put_i16(*v),
                PropertyValue::Visible(v) => out.put_u8(u8::from(*v)),
            }
        },
        Frame::AddElement {
            container,
            element,
            x,
            y,
            payload,
        } => {
            out.put_u32(container.as_u32());
            out.put_u32(element.as_u32());
            out.put_u8(payload.kind().as_u8());
            out.put_i16(*x);
            out.put_i16(*y);
            match payload {
                WidgetPayload::Label(label) => {
                    put_text(out, &label.text, max_text_len);
                    out.put_u16(label.hue_on_wire());
                    out.put_u8(label.font_on_wire());
                },
                WidgetPayload::Image(image) => {
                    out.put_u16(image.graphic);
                    out.put_u16(image.hue);
                },
                WidgetPayload::HtmlText(data)
                | WidgetPayload::Button(data)
                | WidgetPayload::TextEntry(data) => out.put_bytes(data),
            }
        },
        Frame::RemoveElement { container, element } => {
            out.put_u32(container.as_u32());
            out.put_u32(element.as_u32());
        },
        Frame::Animation {
            container,
            element,
            kind,
            duration_ms,
        } => {
            out.put_u32(container.as_u32());
            out.put_u32(element.as_u32());
            out.put_u8(kind.as_u8());
            out.put_u16(*duration_ms);
        },
        Frame::Refresh { container } | Frame::Close { container } => {
            out.put_u32(container.as_u32());
        },
    }
    Ok(())
}

fn read_target(reader: &mut WireReader<'_>) -> CodecResult<(ContainerId, ElementId)> {
    let container = ContainerId::new(reader.read_u32(WireField::ContainerId)?);
    let element = ElementId::new(reader.read_u32(WireField::ElementId)?);
    Ok((container, element))
}

/// Decodes the body of a packet whose sub-command has already been read.
pub fn decode_body(sub_command: u16, body: &[u8], max_text_len: usize) -> CodecResult<Decoded> {
    let Some(command) = SubCommand::from_u16(sub_command) else {
        return Ok(Decoded::Unhandled(Unhandled::SubCommand { value: sub_command }));
    };
    let mut reader = WireReader::new(body);

    let frame = match command {
        SubCommand::SetProperty => {
            let (container, element) = read_target(&mut reader)?;
            let raw = reader.read_u8(WireField::PropertyId)?;
            let Some(property) = PropertyId::from_u8(raw) else {
                return Ok(Decoded::Unhandled(Unhandled::Property {
                    container,
                    element,
                    value: raw,
                }));
            };
            let value = match property {
                PropertyId::Text => PropertyValue::Text(read_text(&mut reader, max_text_len)?),
                PropertyId::Hue => PropertyValue::Hue(reader.read_u16(WireField::Hue)?),
                PropertyId::Visible => {
                    PropertyValue::Visible(reader.read_u8(WireField::Visible)? != 0)
                },
                PropertyId::X => PropertyValue::X(reader.read_i16(WireField::X)?),
                PropertyId::Y => PropertyValue::Y(reader.read_i16(WireField::Y)?),
                PropertyId::Width => PropertyValue::Width(reader.read_u16(WireField::Width)?),
                PropertyId::Height => PropertyValue::Height(reader.read_u16(WireField::Height)?),
                PropertyId::Graphic => {
                    PropertyValue::Graphic(reader.read_u16(WireField::Graphic)?)
                },
            };
            Frame::SetProperty {
                container,
                element,
                value,
            }
        },
        SubCommand::AddElement => {
            let (container, element) = read_target(&mut reader)?;
            let raw = reader.read_u8(WireField::WidgetType)?;
            let Some(kind) = WidgetKind::from_u8(raw) else {
                return Ok(Decoded::Unhandled(Unhandled::Widget {
                    container,
                    element,
                    value: raw,
                }));
            };
            let x = reader.read_i16(WireField::X)?;
            let y = reader.read_i16(WireField::Y)?;
            let payload = match kind {
                WidgetKind::Label => {
                    let text = read_text(&mut reader, max_text_len)?;
                    let hue = reader
                        .read_u16_opt(WireField::Hue)
                        .filter(|hue| *hue != HUE_ABSENT);
                    let font = reader
                        .read_u8_opt(WireField::Font)
                        .filter(|font| *font != FONT_ABSENT);
                    WidgetPayload::Label(LabelSpec { text, hue, font })
                },
                WidgetKind::Image => WidgetPayload::Image(ImageSpec {
                    graphic: reader.read_u16(WireField::Graphic)?,
                    hue: reader.read_u16(WireField::Hue)?,
                }),
                WidgetKind::HtmlText => WidgetPayload::HtmlText(reader.read_rest().to_vec()),
                WidgetKind::Button => WidgetPayload::Button(reader.read_rest().to_vec()),
                WidgetKind::TextEntry => WidgetPayload::TextEntry(reader.read_rest().to_vec()),
            };
            Frame::AddElement {
                container,
                element,
                x,
                y,
                payload,
            }
        },
        SubCommand::RemoveElement => {
            let (container, element) = read_target(&mut reader)?;
            Frame::RemoveElement { container, element }
        },
        SubCommand::Animation => {
            let (container, element) = read_target(&mut reader)?;
            let raw = reader.read_u8(WireField::AnimationType)?;
            let Some(kind) = AnimationKind::from_u8(raw) else {
                return Ok(Decoded::Unhandled(Unhandled::Animation {
                    container,
                    element,
                    value: raw,
                }));
            };
            let duration_ms = reader.read_u16(WireField::Duration)?;
            Frame::Animation {
                container,
                element,
                kind,
                duration_ms,
            }
        },
        SubCommand::Refresh => Frame::Refresh {
            container: ContainerId::new(reader.read_u32(WireField::ContainerId)?),
        },
        SubCommand::Close => Frame::Close {
            container: ContainerId::new(reader.read_u32(WireField::ContainerId)?),
        },
    };
    Ok(Decoded::Frame(frame))
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
    use crate::MAX_TEXT_LEN;

    const GUMP: ContainerId = ContainerId::new(0x4000_0010);

    fn text_frame(text: &str) -> Frame {
        Frame::SetProperty {
            container: GUMP,
            element: ElementId::new(0),
            value: PropertyValue::Text(text.to_owned()),
        }
    }

    fn round_trip(frame: &Frame) -> Frame {
        let bytes = encode(frame).unwrap();
        let (decoded, consumed) = decode(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        match decoded {
            Decoded::Frame(f) => f,
            Decoded::Unhandled(u) => panic!("unexpected {u}"),
        }
    }

    #[test]
    fn set_text_layout() {
        let bytes = encode(&text_frame("5")).unwrap();
        assert_eq!(
            bytes,
            [
                0xBF, 0x00, 0x0E, // frame id, total_len = 2 + 12
                0x01, 0x00, // sub-command
                0x40, 0x00, 0x00, 0x10, // container
                0x00, 0x00, 0x00, 0x00, // element
                0x01, // property = text
                0x00, 0x01, b'5',
            ]
        );
    }

    #[test]
    fn length_covers_sub_command_onward() {
        let bytes = encode(&Frame::Close { container: GUMP }).unwrap();
        let declared = u16::from_be_bytes([bytes[1], bytes[2]]) as usize;
        assert_eq!(declared, bytes.len() - ENVELOPE_PREFIX_LEN);
    }

    #[test]
    fn text_boundaries() {
        for len in [0usize, 1, MAX_TEXT_LEN] {
            let text = "a".repeat(len);
            assert_eq!(round_trip(&text_frame(&text)), text_frame(&text));
        }
        let long = "b".repeat(MAX_TEXT_LEN + 1);
        assert_eq!(
            round_trip(&text_frame(&long)),
            text_frame(&"b".repeat(MAX_TEXT_LEN))
        );
    }

    #[test]
    fn clamp_respects_char_boundaries() {
        // 'é' is two bytes; a limit of 3 cannot split the second one.
        assert_eq!(clamp_text("éé", 3), "é");
        assert_eq!(clamp_text("abc", 3), "abc");
    }

    #[test]
    fn declared_text_length_is_clamped_on_decode() {
        let mut body = WireWriter::new();
        body.put_u32(GUMP.as_u32());
        body.put_u32(1);
        body.put_u8(PropertyId::Text.as_u8());
        body.put_u16(u16::MAX);
        body.put_bytes(&[b'z'; 16]);
        let body = body.into_inner();

        let decoded = decode_body(SubCommand::SetProperty.as_u16(), &body, 8).unwrap();
        assert_eq!(
            decoded,
            Decoded::Frame(Frame::SetProperty {
                container: GUMP,
                element: ElementId::new(1),
                value: PropertyValue::Text("zzzzzzzz".to_owned()),
            })
        );
    }

    #[test]
    fn label_without_optional_fields_uses_sentinels() {
        let mut body = WireWriter::new();
        body.put_u32(GUMP.as_u32());
        body.put_u32(4);
        body.put_u8(WidgetKind::Label.as_u8());
        body.put_i16(-5);
        body.put_i16(12);
        body.put_u16(2);
        body.put_bytes(b"hi");
        let body = body.into_inner();

        let decoded = decode_body(SubCommand::AddElement.as_u16(), &body, MAX_TEXT_LEN).unwrap();
        assert_eq!(
            decoded,
            Decoded::Frame(Frame::AddElement {
                container: GUMP,
                element: ElementId::new(4),
                x: -5,
                y: 12,
                payload: WidgetPayload::Label(LabelSpec::new("hi")),
            })
        );
    }

    #[test]
    fn label_with_hue_and_font() {
        let frame = Frame::AddElement {
            container: GUMP,
            element: ElementId::new(1),
            x: 40,
            y: 60,
            payload: WidgetPayload::Label(LabelSpec {
                text: "Gold".to_owned(),
                hue: Some(0x0035),
                font: Some(1),
            }),
        };
        assert_eq!(round_trip(&frame), frame);
    }

    #[test]
    fn reserved_label_values_read_back_as_absent() {
        let add = |spec| Frame::AddElement {
            container: GUMP,
            element: ElementId::new(1),
            x: 0,
            y: 0,
            payload: WidgetPayload::Label(spec),
        };
        let raw = LabelSpec {
            text: "Gold".to_owned(),
            hue: Some(HUE_ABSENT),
            font: Some(FONT_ABSENT),
        };
        assert_eq!(round_trip(&add(raw)), add(LabelSpec::new("Gold")));

        let built = LabelSpec::new("Gold").with_hue(HUE_ABSENT).with_font(FONT_ABSENT);
        assert_eq!(built, LabelSpec::new("Gold"));
        assert_eq!(round_trip(&add(built.clone())), add(built));

        let built = LabelSpec::new("Gold").with_hue(0xFFFE).with_font(0xFE);
        assert_eq!(round_trip(&add(built.clone())), add(built));
    }

    #[test]
    fn image_layout() {
        let frame = Frame::AddElement {
            container: GUMP,
            element: ElementId::new(7),
            x: 10,
            y: 20,
            payload: WidgetPayload::Image(ImageSpec {
                graphic: 9270,
                hue: 0,
            }),
        };
        let bytes = encode(&frame).unwrap();
        // prefix(3) + sub(2) + ids(8) + type(1) + xy(4) + graphic/hue(4)
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[18..], &[0x24, 0x36, 0x00, 0x00]);
        assert_eq!(round_trip(&frame), frame);
    }

    #[test]
    fn opaque_payload_is_the_rest_of_the_body() {
        let frame = Frame::AddElement {
            container: GUMP,
            element: ElementId::new(3),
            x: 0,
            y: 0,
            payload: WidgetPayload::Button(vec![0x0F, 0xA0, 0x01]),
        };
        assert_eq!(round_trip(&frame), frame);
    }

    #[test]
    fn unknown_discriminants_are_unhandled() {
        let decoded = decode_body(0x0103, &[], MAX_TEXT_LEN).unwrap();
        assert_eq!(
            decoded,
            Decoded::Unhandled(Unhandled::SubCommand { value: 0x0103 })
        );

        let mut body = WireWriter::new();
        body.put_u32(GUMP.as_u32());
        body.put_u32(2);
        body.put_u8(0x42);
        let body = body.into_inner();
        for (sub, expected) in [
            (
                SubCommand::SetProperty,
                Unhandled::Property {
                    container: GUMP,
                    element: ElementId::new(2),
                    value: 0x42,
                },
            ),
            (
                SubCommand::AddElement,
                Unhandled::Widget {
                    container: GUMP,
                    element: ElementId::new(2),
                    value: 0x42,
                },
            ),
            (
                SubCommand::Animation,
                Unhandled::Animation {
                    container: GUMP,
                    element: ElementId::new(2),
                    value: 0x42,
                },
            ),
        ] {
            assert_eq!(
                decode_body(sub.as_u16(), &body, MAX_TEXT_LEN).unwrap(),
                Decoded::Unhandled(expected)
            );
        }
    }

    #[test]
    fn every_strict_prefix_is_truncated() {
        let frame = Frame::Animation {
            container: GUMP,
            element: ElementId::new(5),
            kind: AnimationKind::Pulse,
            duration_ms: 750,
        };
        let bytes = encode(&frame).unwrap();
        for cut in 0..bytes.len() {
            let err = decode(&bytes[..cut]).unwrap_err();
            assert!(
                matches!(err, CodecError::Truncated { .. }),
                "prefix {cut}: {err}"
            );
        }
    }

    #[test]
    fn truncated_body_inside_a_valid_envelope() {
        // Envelope claims 6 bytes: sub-command + 4-byte body, too short for RemoveElement.
        let bytes = [0xBF, 0x00, 0x06, 0x01, 0x02, 0x00, 0x00, 0x00, 0x01];
        let err = decode(&bytes).unwrap_err();
        assert_eq!(
            err,
            CodecError::Truncated {
                field: WireField::ElementId,
                needed: 4,
                remaining: 0
            }
        );
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let frame = Frame::RemoveElement {
            container: GUMP,
            element: ElementId::new(9),
        };
        let bytes = encode(&frame).unwrap();
        let mut padded = bytes.clone();
        padded.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let (decoded, consumed) = decode(&padded).unwrap();
        assert_eq!(decoded, Decoded::Frame(frame));
        assert_eq!(consumed, bytes.len());
    }

    #[test]
    fn wrong_frame_id_and_bad_length() {
        assert_eq!(
            decode(&[0x22, 0x00, 0x02, 0x01, 0x06]).unwrap_err(),
            CodecError::WrongFrameId {
                expected: 0xBF,
                actual: 0x22
            }
        );
        assert_eq!(
            decode(&[0xBF, 0x00, 0x01, 0x01]).unwrap_err(),
            CodecError::LengthOutOfRange { declared: 1 }
        );
    }

    #[test]
    fn custom_frame_id() {
        let codec = FrameCodec::new(CodecConfig {
            frame_id: 0xF0,
            ..CodecConfig::default()
        });
        let bytes = codec.encode(&Frame::Refresh { container: GUMP }).unwrap();
        assert_eq!(bytes[0], 0xF0);
        assert!(decode(&bytes).is_err());
        assert!(codec.decode(&bytes).is_ok());
    }

    #[test]
    fn label_at_the_text_limit_fills_one_frame() {
        let codec = FrameCodec::new(CodecConfig {
            max_text_len: MAX_TEXT_LIMIT,
            ..CodecConfig::default()
        });
        let label = LabelSpec {
            text: "x".repeat(MAX_TEXT_LIMIT + 10),
            hue: Some(1),
            font: Some(1),
        };
        let frame = Frame::AddElement {
            container: GUMP,
            element: ElementId::new(0),
            x: 0,
            y: 0,
            payload: WidgetPayload::Label(label),
        };
        let bytes = codec.encode(&frame).unwrap();
        assert_eq!(bytes.len(), ENVELOPE_PREFIX_LEN + u16::MAX as usize);
    }

    #[test]
    fn payload_check_matches_encode() {
        let largest = MAX_BODY_LEN - ADD_ELEMENT_HEADER_LEN;
        let add = |len: usize| Frame::AddElement {
            container: GUMP,
            element: ElementId::new(0),
            x: 0,
            y: 0,
            payload: WidgetPayload::Button(vec![7; len]),
        };
        for len in [largest, largest + 1] {
            let payload = WidgetPayload::Button(vec![7; len]);
            assert_eq!(check_payload_len(&payload).is_ok(), encode(&add(len)).is_ok());
        }
        assert!(encode(&add(largest)).is_ok());
        assert!(matches!(
            check_payload_len(&WidgetPayload::Button(vec![0; largest + 1])),
            Err(CodecError::PayloadTooLarge { .. })
        ));
        let long_label = WidgetPayload::Label(LabelSpec::new("x".repeat(70_000)));
        assert!(check_payload_len(&long_label).is_ok());
    }

    #[test]
    fn oversized_opaque_payload_is_rejected() {
        let frame = Frame::AddElement {
            container: GUMP,
            element: ElementId::new(0),
            x: 0,
            y: 0,
            payload: WidgetPayload::HtmlText(vec![0; u16::MAX as usize]),
        };
        let mut out = vec![1, 2, 3];
        let err = FrameCodec::default()
            .encode_append(&frame, &mut out)
            .unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge { .. }));
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn visible_is_any_nonzero_byte() {
        let mut body = WireWriter::new();
        body.put_u32(GUMP.as_u32());
        body.put_u32(0);
        body.put_u8(PropertyId::Visible.as_u8());
        body.put_u8(0x7F);
        let decoded = decode_body(
            SubCommand::SetProperty.as_u16(),
            &body.into_inner(),
            MAX_TEXT_LEN,
        )
        .unwrap();
        assert!(matches!(
            decoded,
            Decoded::Frame(Frame::SetProperty {
                value: PropertyValue::Visible(true),
                ..
            })
        ));
    }

    #[test]
    fn error_display() {
        let err = CodecError::Truncated {
            field: WireField::TextLength,
            needed: 2,
            remaining: 1,
        };
        assert_eq!(
            err.to_string(),
            "truncated frame: text_len needs 2 bytes, only 1 left"
        );
        assert!(CodecError::WrongFrameId {
            expected: 0xBF,
            actual: 0x01
        }
        .to_string()
        .contains("0x01"));
    }
}
