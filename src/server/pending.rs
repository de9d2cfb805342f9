//! Queued, not-yet-sent mutations.
//!
//! Updates are plain tagged records rather than deferred callbacks, so a queue
//! can be inspected, compared in tests and serialized with
//! [`snapshot`](crate::network::snapshot).

use serde::{Deserialize, Serialize};

use crate::network::messages::{AnimationKind, Frame, PropertyValue, WidgetPayload};
use crate::{ContainerId, ElementId};

/// What a pending update will do once flushed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PendingOp {
    /// Change one property of a widget.
    SetProperty {
        /// Target widget.
        element: ElementId,
        /// New value.
        value: PropertyValue,
    },
    /// Create a widget.
    AddElement {
        /// Identifier of the new widget.
        element: ElementId,
        /// Horizontal position.
        x: i16,
        /// Vertical position.
        y: i16,
        /// Creation payload.
        payload: WidgetPayload,
    },
    /// Destroy a widget.
    RemoveElement {
        /// Target widget.
        element: ElementId,
    },
    /// Trigger a visual effect.
    Animation {
        /// Target widget.
        element: ElementId,
        /// Effect.
        kind: AnimationKind,
        /// Effect duration in milliseconds.
        duration_ms: u16,
    },
    /// Ask the client to re-render the container.
    Refresh,
}

/// One entry of a container's pending queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingUpdate {
    /// Position in the container's enqueue order, starting at zero.
    pub sequence: u64,
    /// The mutation.
    pub op: PendingOp,
}

impl PendingUpdate {
    /// The widget this update targets, if any.
    #[must_use]
    pub const fn element(&self) -> Option<ElementId> {
        match &self.op {
            PendingOp::SetProperty { element, .. }
            | PendingOp::AddElement { element, .. }
            | PendingOp::RemoveElement { element }
            | PendingOp::Animation { element, .. } => Some(*element),
            PendingOp::Refresh => None,
        }
    }

    /// Builds the wire frame for this update, addressed to `container`.
    #[must_use]
    pub fn to_frame(&self, container: ContainerId) -> Frame {
        match &self.op {
            PendingOp::SetProperty { element, value } => Frame::SetProperty {
                container,
                element: *element,
                value: value.clone(),
            },
            PendingOp::AddElement {
                element,
                x,
                y,
                payload,
            } => Frame::AddElement {
                container,
                element: *element,
                x: *x,
                y: *y,
                payload: payload.clone(),
            },
            PendingOp::RemoveElement { element } => Frame::RemoveElement {
                container,
                element: *element,
            },
            PendingOp::Animation {
                element,
                kind,
                duration_ms,
            } => Frame::Animation {
                container,
                element: *element,
                kind: *kind,
                duration_ms: *duration_ms,
            },
            PendingOp::Refresh => Frame::Refresh { container },
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
    fn frames_carry_the_container() {
        let gump = ContainerId::new(0x4000_0002);
        let update = PendingUpdate {
            sequence: 0,
            op: PendingOp::SetProperty {
                element: ElementId::new(1),
                value: PropertyValue::Hue(0x21),
            },
        };
        assert_eq!(update.element(), Some(ElementId::new(1)));
        assert_eq!(
            update.to_frame(gump),
            Frame::SetProperty {
                container: gump,
                element: ElementId::new(1),
                value: PropertyValue::Hue(0x21),
            }
        );

        let refresh = PendingUpdate {
            sequence: 1,
            op: PendingOp::Refresh,
        };
        assert_eq!(refresh.element(), None);
        assert_eq!(refresh.to_frame(gump), Frame::Refresh { container: gump });
    }
}
