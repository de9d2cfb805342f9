//! Widget and capability traits.
//!
//! The apply engine never looks at concrete widget types. A widget exposes the
//! mutations it supports through the `*_mut` accessors on [`Widget`]; each
//! returns `None` by default, so a widget kind opts in to a property by
//! overriding one accessor.
//!
//! ```
//! use livegump::{ElementId, TextCapability, Widget};
//!
//! struct Caption {
//!     text: String,
//! }
//!
//! impl TextCapability for Caption {
//!     fn set_text(&mut self, text: &str) {
//!         self.text = text.to_owned();
//!     }
//! }
//!
//! impl Widget for Caption {
//!     fn local_id(&self) -> Option<ElementId> {
//!         None
//!     }
//!
//!     fn text_mut(&mut self) -> Option<&mut dyn TextCapability> {
//!         Some(self)
//!     }
//! }
//! ```

use crate::client::animation::Animatable;
use crate::network::messages::WidgetPayload;
use crate::ElementId;

/// Accepts text updates.
pub trait TextCapability {
    /// Replaces the displayed text.
    fn set_text(&mut self, text: &str);
}

/// Accepts color updates.
pub trait HueCapability {
    /// Replaces the color.
    fn set_hue(&mut self, hue: u16);
}

/// Accepts visibility updates.
pub trait VisibilityCapability {
    /// Shows or hides the widget.
    fn set_visible(&mut self, visible: bool);
}

/// Accepts position updates.
pub trait PositionCapability {
    /// Moves the widget horizontally.
    fn set_x(&mut self, x: i16);
    /// Moves the widget vertically.
    fn set_y(&mut self, y: i16);
}

/// Accepts size updates.
pub trait SizeCapability {
    /// Resizes the widget horizontally.
    fn set_width(&mut self, width: u16);
    /// Resizes the widget vertically.
    fn set_height(&mut self, height: u16);
}

/// Accepts graphic updates.
pub trait GraphicCapability {
    /// Replaces the displayed graphic.
    fn set_graphic(&mut self, graphic: u16);
}

/// One node of a container's widget tree.
pub trait Widget {
    /// Identifier given to the widget when it was created from an AddElement
    /// frame. Widgets from the ordinary build sequence have none.
    fn local_id(&self) -> Option<ElementId>;

    /// Nested widgets, in layout order.
    fn children(&self) -> &[Box<dyn Widget>] {
        &[]
    }

    /// Mutable access to nested widgets, for widgets that group others.
    fn children_mut(&mut self) -> Option<&mut Vec<Box<dyn Widget>>> {
        None
    }

    /// Text capability, if supported.
    fn text_mut(&mut self) -> Option<&mut dyn TextCapability> {
        None
    }

    /// Color capability, if supported.
    fn hue_mut(&mut self) -> Option<&mut dyn HueCapability> {
        None
    }

    /// Visibility capability, if supported.
    fn visibility_mut(&mut self) -> Option<&mut dyn VisibilityCapability> {
        None
    }

    /// Position capability, if supported.
    fn position_mut(&mut self) -> Option<&mut dyn PositionCapability> {
        None
    }

    /// Size capability, if supported.
    fn size_mut(&mut self) -> Option<&mut dyn SizeCapability> {
        None
    }

    /// Graphic capability, if supported.
    fn graphic_mut(&mut self) -> Option<&mut dyn GraphicCapability> {
        None
    }

    /// Animation capability, if supported.
    fn animation_mut(&mut self) -> Option<&mut dyn Animatable> {
        None
    }

    /// Releases the widget's resources. Called once, when the widget leaves
    /// its slot.
    fn dispose(&mut self) {}

    /// Returns true for a slot left behind by a removed widget. Hosts should
    /// neither draw nor hit-test it.
    fn is_vacant(&self) -> bool {
        false
    }
}

/// Placeholder left in a child list where a widget was removed.
///
/// Removal never shifts siblings: positional element identifiers keep
/// pointing at the widgets they were assigned to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacantSlot;

impl Widget for VacantSlot {
    fn local_id(&self) -> Option<ElementId> {
        None
    }

    fn is_vacant(&self) -> bool {
        true
    }
}

/// Everything an AddElement frame says about the widget to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSpec {
    /// Identifier the new widget must report from [`Widget::local_id`].
    pub id: ElementId,
    /// Horizontal position.
    pub x: i16,
    /// Vertical position.
    pub y: i16,
    /// Kind and creation data.
    pub payload: WidgetPayload,
}
