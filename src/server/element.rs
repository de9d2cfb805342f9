//! Server-side mirror of one mutable widget.

use serde::{Deserialize, Serialize};

use crate::network::messages::PropertyValue;
use crate::ElementId;

/// Current logical property values of a live widget.
///
/// Fields start unset and are filled in as the application mutates them, so
/// reads always reflect the most recent update even before it is flushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementState {
    /// Displayed text.
    pub text: Option<String>,
    /// Color.
    pub hue: Option<u16>,
    /// Visibility. Widgets start visible.
    pub visible: bool,
    /// Horizontal position.
    pub x: i16,
    /// Vertical position.
    pub y: i16,
    /// Width.
    pub width: Option<u16>,
    /// Height.
    pub height: Option<u16>,
    /// Graphic reference.
    pub graphic: Option<u16>,
    /// Progress value, for progress-style widgets.
    pub value: u32,
    /// Progress maximum, for progress-style widgets.
    pub max: u32,
    /// Width that corresponds to a full progress bar.
    pub full_width: Option<u16>,
}

impl Default for ElementState {
    fn default() -> Self {
        Self {
            text: None,
            hue: None,
            visible: true,
            x: 0,
            y: 0,
            width: None,
            height: None,
            graphic: None,
            value: 0,
            max: 0,
            full_width: None,
        }
    }
}

impl ElementState {
    /// Records a property value.
    ///
    /// The first width ever applied also becomes the full progress width
    /// unless one was set explicitly.
    pub fn apply(&mut self, value: &PropertyValue) {
        match value {
            PropertyValue::Text(text) => self.text = Some(text.clone()),
            PropertyValue::Hue(hue) => self.hue = Some(*hue),
            PropertyValue::Visible(visible) => self.visible = *visible,
            PropertyValue::X(x) => self.x = *x,
            PropertyValue::Y(y) => self.y = *y,
            PropertyValue::Width(width) => {
                self.width = Some(*width);
                self.full_width.get_or_insert(*width);
            },
            PropertyValue::Height(height) => self.height = Some(*height),
            PropertyValue::Graphic(graphic) => self.graphic = Some(*graphic),
        }
    }

    /// Width of a bar showing `value` out of `max`, or `None` without a full width.
    ///
    /// `value` is capped at `max`; a zero `max` yields an empty bar.
    #[must_use]
    pub fn progress_width(&self, value: u32, max: u32) -> Option<u16> {
        let full = u64::from(self.full_width?);
        if max == 0 {
            return Some(0);
        }
        let scaled = full * u64::from(value.min(max)) / u64::from(max);
        Some(u16::try_from(scaled).unwrap_or(u16::MAX))
    }
}

/// A widget the server keeps mutable.
///
/// The identifier is assigned once at registration and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveElement {
    id: ElementId,
    name: Option<String>,
    state: ElementState,
}

impl LiveElement {
    /// Creates an element with default state.
    #[must_use]
    pub fn new(id: ElementId, name: Option<String>) -> Self {
        Self {
            id,
            name,
            state: ElementState::default(),
        }
    }

    /// The element's identifier.
    #[must_use]
    pub const fn id(&self) -> ElementId {
        self.id
    }

    /// The element's lookup name, if it was registered with one.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The element's current logical state.
    #[must_use]
    pub const fn state(&self) -> &ElementState {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut ElementState {
        &mut self.state
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
    fn apply_updates_state() {
        let mut element = LiveElement::new(ElementId::new(2), Some("hp".to_owned()));
        element
            .state_mut()
            .apply(&PropertyValue::Text("42".to_owned()));
        element.state_mut().apply(&PropertyValue::Visible(false));
        element.state_mut().apply(&PropertyValue::X(-3));

        assert_eq!(element.name(), Some("hp"));
        assert_eq!(element.state().text.as_deref(), Some("42"));
        assert!(!element.state().visible);
        assert_eq!(element.state().x, -3);
    }

    #[test]
    fn first_width_becomes_full_width() {
        let mut state = ElementState::default();
        assert_eq!(state.progress_width(1, 2), None);
        state.apply(&PropertyValue::Width(200));
        state.apply(&PropertyValue::Width(50));
        assert_eq!(state.full_width, Some(200));
        assert_eq!(state.width, Some(50));
    }

    #[test]
    fn progress_scaling() {
        let state = ElementState {
            full_width: Some(200),
            ..ElementState::default()
        };
        assert_eq!(state.progress_width(0, 10), Some(0));
        assert_eq!(state.progress_width(5, 10), Some(100));
        assert_eq!(state.progress_width(10, 10), Some(200));
        assert_eq!(state.progress_width(30, 10), Some(200));
        assert_eq!(state.progress_width(3, 0), Some(0));
        assert_eq!(state.progress_width(u32::MAX - 1, u32::MAX), Some(199));
    }
}
