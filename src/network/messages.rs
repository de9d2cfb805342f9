//! Frame types carried by the update protocol.
//!
//! A [`Frame`] is one self-delimited operation on one container. The numeric
//! discriminants here are part of the wire format and must not change.

use serde::{Deserialize, Serialize};

use crate::{ContainerId, ElementId, FONT_ABSENT, HUE_ABSENT};

/// Sub-command discriminant inside the host protocol's extended command.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum SubCommand {
    /// Change one property of an existing widget.
    SetProperty = 0x0100,
    /// Create a widget.
    AddElement = 0x0101,
    /// Destroy a widget.
    RemoveElement = 0x0102,
    /// Trigger a widget animation.
    Animation = 0x0105,
    /// Ask the client to recompute container content.
    Refresh = 0x0106,
    /// Close the container.
    Close = 0x0107,
}

impl SubCommand {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Maps a wire value to a sub-command. Reserved and foreign values yield `None`.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0100 => Some(Self::SetProperty),
            0x0101 => Some(Self::AddElement),
            0x0102 => Some(Self::RemoveElement),
            0x0105 => Some(Self::Animation),
            0x0106 => Some(Self::Refresh),
            0x0107 => Some(Self::Close),
            _ => None,
        }
    }
}

/// Property discriminant of a SetProperty frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum PropertyId {
    /// Widget text.
    Text = 0x01,
    /// Color.
    Hue = 0x02,
    /// Visibility flag.
    Visible = 0x03,
    /// Horizontal position.
    X = 0x04,
    /// Vertical position.
    Y = 0x05,
    /// Width.
    Width = 0x06,
    /// Height.
    Height = 0x07,
    /// Graphic (art) reference.
    Graphic = 0x08,
}

impl PropertyId {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a wire value to a property id.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Text),
            0x02 => Some(Self::Hue),
            0x03 => Some(Self::Visible),
            0x04 => Some(Self::X),
            0x05 => Some(Self::Y),
            0x06 => Some(Self::Width),
            0x07 => Some(Self::Height),
            0x08 => Some(Self::Graphic),
            _ => None,
        }
    }
}

/// A property together with its new value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PropertyValue {
    /// New text. Clamped to [`MAX_TEXT_LEN`](crate::MAX_TEXT_LEN) bytes on the wire.
    Text(String),
    /// New color.
    Hue(u16),
    /// Shown or hidden.
    Visible(bool),
    /// New horizontal position.
    X(i16),
    /// New vertical position.
    Y(i16),
    /// New width.
    Width(u16),
    /// New height.
    Height(u16),
    /// New graphic reference.
    Graphic(u16),
}

impl PropertyValue {
    /// The property this value targets.
    #[must_use]
    pub const fn id(&self) -> PropertyId {
        match self {
            Self::Text(_) => PropertyId::Text,
            Self::Hue(_) => PropertyId::Hue,
            Self::Visible(_) => PropertyId::Visible,
            Self::X(_) => PropertyId::X,
            Self::Y(_) => PropertyId::Y,
            Self::Width(_) => PropertyId::Width,
            Self::Height(_) => PropertyId::Height,
            Self::Graphic(_) => PropertyId::Graphic,
        }
    }
}

/// Widget-type discriminant of an AddElement frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WidgetKind {
    /// Plain text label.
    Label = 0x01,
    /// HTML text area.
    HtmlText = 0x02,
    /// Static image.
    Image = 0x03,
    /// Clickable button.
    Button = 0x04,
    /// Editable text field.
    TextEntry = 0x05,
}

impl WidgetKind {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a wire value to a widget kind.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Label),
            0x02 => Some(Self::HtmlText),
            0x03 => Some(Self::Image),
            0x04 => Some(Self::Button),
            0x05 => Some(Self::TextEntry),
            _ => None,
        }
    }
}

/// Creation data for a label.
///
/// `0xFFFF` ([`HUE_ABSENT`]) and `0xFF` ([`FONT_ABSENT`]) are reserved on the
/// wire to mean "not set". `Some` of a reserved value is sent as that sentinel
/// and arrives as `None`; [`with_hue`](Self::with_hue) and
/// [`with_font`](Self::with_font) fold it to `None` up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct LabelSpec {
    /// Initial text.
    pub text: String,
    /// Color; written as `0xFFFF` when absent. `Some(0xFFFF)` reads back as `None`.
    pub hue: Option<u16>,
    /// Font index; written as `0xFF` when absent. `Some(0xFF)` reads back as `None`.
    pub font: Option<u8>,
}

impl LabelSpec {
    /// A label with text only.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            hue: None,
            font: None,
        }
    }

    /// Sets the color. The reserved value `0xFFFF` leaves it unset.
    #[must_use]
    pub fn with_hue(mut self, hue: u16) -> Self {
        self.hue = (hue != HUE_ABSENT).then_some(hue);
        self
    }

    /// Sets the font. The reserved value `0xFF` leaves it unset.
    #[must_use]
    pub fn with_font(mut self, font: u8) -> Self {
        self.font = (font != FONT_ABSENT).then_some(font);
        self
    }

    pub(crate) fn hue_on_wire(&self) -> u16 {
        self.hue.unwrap_or(HUE_ABSENT)
    }

    pub(crate) fn font_on_wire(&self) -> u8 {
        self.font.unwrap_or(FONT_ABSENT)
    }
}

/// Creation data for an image.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ImageSpec {
    /// Art reference.
    pub graphic: u16,
    /// Color.
    pub hue: u16,
}

/// Widget-type specific creation payload.
///
/// Only labels and images have a payload layout defined by this protocol. The
/// remaining kinds carry opaque bytes whose meaning is agreed between the
/// application and its UI framework.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WidgetPayload {
    /// A text label.
    Label(LabelSpec),
    /// An HTML text area.
    HtmlText(Vec<u8>),
    /// An image.
    Image(ImageSpec),
    /// A button.
    Button(Vec<u8>),
    /// A text entry.
    TextEntry(Vec<u8>),
}

impl WidgetPayload {
    /// The widget kind this payload creates.
    #[must_use]
    pub const fn kind(&self) -> WidgetKind {
        match self {
            Self::Label(_) => WidgetKind::Label,
            Self::HtmlText(_) => WidgetKind::HtmlText,
            Self::Image(_) => WidgetKind::Image,
            Self::Button(_) => WidgetKind::Button,
            Self::TextEntry(_) => WidgetKind::TextEntry,
        }
    }
}

/// Animation discriminant of an Animation frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AnimationKind {
    /// Fade out and back in.
    Fade = 0x01,
    /// Grow and shrink once.
    Pulse = 0x02,
    /// Blink on and off.
    Flash = 0x03,
    /// Horizontal jitter.
    Shake = 0x04,
    /// Scale up from nothing.
    Scale = 0x05,
    /// Decaying vertical bounce.
    Bounce = 0x06,
    /// Cycle the hue.
    ColorPulse = 0x07,
}

impl AnimationKind {
    /// Returns the wire value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Maps a wire value to an animation kind.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x01 => Some(Self::Fade),
            0x02 => Some(Self::Pulse),
            0x03 => Some(Self::Flash),
            0x04 => Some(Self::Shake),
            0x05 => Some(Self::Scale),
            0x06 => Some(Self::Bounce),
            0x07 => Some(Self::ColorPulse),
            _ => None,
        }
    }
}

/// One protocol operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Frame {
    /// Change one property of an existing widget.
    SetProperty {
        /// Owning container.
        container: ContainerId,
        /// Target widget.
        element: ElementId,
        /// Property and new value.
        value: PropertyValue,
    },
    /// Create a widget with an explicit identifier.
    AddElement {
        /// Owning container.
        container: ContainerId,
        /// Identifier of the new widget.
        element: ElementId,
        /// Horizontal position.
        x: i16,
        /// Vertical position.
        y: i16,
        /// Kind and creation data.
        payload: WidgetPayload,
    },
    /// Destroy a widget.
    RemoveElement {
        /// Owning container.
        container: ContainerId,
        /// Target widget.
        element: ElementId,
    },
    /// Trigger an animation on a widget.
    Animation {
        /// Owning container.
        container: ContainerId,
        /// Target widget.
        element: ElementId,
        /// Effect to play.
        kind: AnimationKind,
        /// Effect length in milliseconds.
        duration_ms: u16,
    },
    /// Recompute container content.
    Refresh {
        /// Target container.
        container: ContainerId,
    },
    /// Close and dispose the container.
    Close {
        /// Target container.
        container: ContainerId,
    },
}

impl Frame {
    /// The sub-command this frame is sent under.
    #[must_use]
    pub const fn sub_command(&self) -> SubCommand {
        match self {
            Self::SetProperty { .. } => SubCommand::SetProperty,
            Self::AddElement { .. } => SubCommand::AddElement,
            Self::RemoveElement { .. } => SubCommand::RemoveElement,
            Self::Animation { .. } => SubCommand::Animation,
            Self::Refresh { .. } => SubCommand::Refresh,
            Self::Close { .. } => SubCommand::Close,
        }
    }

    /// The container this frame targets.
    #[must_use]
    pub const fn container(&self) -> ContainerId {
        match self {
            Self::SetProperty { container, .. }
            | Self::AddElement { container, .. }
            | Self::RemoveElement { container, .. }
            | Self::Animation { container, .. }
            | Self::Refresh { container }
            | Self::Close { container } => *container,
        }
    }

    /// The widget this frame targets, for element-level frames.
    #[must_use]
    pub const fn element(&self) -> Option<ElementId> {
        match self {
            Self::SetProperty { element, .. }
            | Self::AddElement { element, .. }
            | Self::RemoveElement { element, .. }
            | Self::Animation { element, .. } => Some(*element),
            Self::Refresh { .. } | Self::Close { .. } => None,
        }
    }
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

    #[test]
    fn reserved_sub_commands_are_not_decodable() {
        assert_eq!(SubCommand::from_u16(0x0103), None);
        assert_eq!(SubCommand::from_u16(0x0104), None);
        assert_eq!(SubCommand::from_u16(0x0108), None);
        assert_eq!(SubCommand::from_u16(0x0105), Some(SubCommand::Animation));
    }

    #[test]
    fn discriminants_map_back() {
        for raw in 0x01..=0x08u8 {
            assert_eq!(PropertyId::from_u8(raw).unwrap().as_u8(), raw);
        }
        for raw in 0x01..=0x05u8 {
            assert_eq!(WidgetKind::from_u8(raw).unwrap().as_u8(), raw);
        }
        for raw in 0x01..=0x07u8 {
            assert_eq!(AnimationKind::from_u8(raw).unwrap().as_u8(), raw);
        }
        assert_eq!(PropertyId::from_u8(0), None);
        assert_eq!(WidgetKind::from_u8(0x06), None);
        assert_eq!(AnimationKind::from_u8(0x08), None);
    }

    #[test]
    fn frame_accessors() {
        let frame = Frame::Animation {
            container: ContainerId::new(9),
            element: ElementId::new(2),
            kind: AnimationKind::Shake,
            duration_ms: 300,
        };
        assert_eq!(frame.sub_command(), SubCommand::Animation);
        assert_eq!(frame.container(), ContainerId::new(9));
        assert_eq!(frame.element(), Some(ElementId::new(2)));

        let close = Frame::Close {
            container: ContainerId::new(9),
        };
        assert_eq!(close.element(), None);
    }

    #[test]
    fn label_sentinels() {
        let label = LabelSpec::new("hi");
        assert_eq!(label.hue_on_wire(), HUE_ABSENT);
        assert_eq!(label.font_on_wire(), FONT_ABSENT);
        assert_eq!(WidgetPayload::Label(label).kind(), WidgetKind::Label);
    }
}
