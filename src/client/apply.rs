//! Frame application against a resolved container.
//!
//! These functions see one container at a time. Container resolution, widget
//! construction and closing live in
//! [`ClientSession`](crate::sessions::client_session::ClientSession), which
//! needs the whole host.

use tracing::{debug, trace};
use web_time::Duration;

use crate::client::host::GumpContainer;
use crate::client::resolver::{find_widget_path, resolve_element, vacate_at_path, widget_at_mut};
use crate::client::widget::Widget;
use crate::network::messages::{AnimationKind, PropertyValue};
use crate::sessions::client_session::ApplyOutcome;
use crate::{ContainerId, ElementId};

/// Applies `value` through the matching capability. Returns `false` if the
/// widget does not have it.
pub(crate) fn apply_to_widget(widget: &mut dyn Widget, value: &PropertyValue) -> bool {
    let applied = match value {
        PropertyValue::Text(text) => widget.text_mut().map(|w| w.set_text(text)),
        PropertyValue::Hue(hue) => widget.hue_mut().map(|w| w.set_hue(*hue)),
        PropertyValue::Visible(visible) => {
            widget.visibility_mut().map(|w| w.set_visible(*visible))
        },
        PropertyValue::X(x) => widget.position_mut().map(|w| w.set_x(*x)),
        PropertyValue::Y(y) => widget.position_mut().map(|w| w.set_y(*y)),
        PropertyValue::Width(width) => widget.size_mut().map(|w| w.set_width(*width)),
        PropertyValue::Height(height) => widget.size_mut().map(|w| w.set_height(*height)),
        PropertyValue::Graphic(graphic) => widget.graphic_mut().map(|w| w.set_graphic(*graphic)),
    };
    applied.is_some()
}

const fn unresolved(container: ContainerId, element: ElementId) -> ApplyOutcome {
    ApplyOutcome::Unresolved {
        container,
        element: Some(element),
    }
}

pub(crate) fn set_property(
    container: &mut dyn GumpContainer,
    element: ElementId,
    value: &PropertyValue,
) -> ApplyOutcome {
    let container_id = container.server_id();
    let Some(path) = resolve_element(container, element) else {
        trace!(container = %container_id, %element, "set property: element not found");
        return unresolved(container_id, element);
    };
    let Some(widget) = widget_at_mut(container.children_mut(), &path) else {
        return unresolved(container_id, element);
    };
    if !apply_to_widget(&mut **widget, value) {
        debug!(container = %container_id, %element, property = ?value.id(), "widget lacks capability");
        return ApplyOutcome::Unsupported {
            container: container_id,
            element,
        };
    }
    container.mark_dirty();
    container.request_refresh();
    ApplyOutcome::Applied
}

/// Inserts a freshly built widget. A widget already carrying the same
/// explicit identifier is disposed and the new one takes its slot.
pub(crate) fn add_element(
    container: &mut dyn GumpContainer,
    element: ElementId,
    widget: Box<dyn Widget>,
) -> ApplyOutcome {
    let container_id = container.server_id();
    let existing = match find_widget_path(container.children(), element) {
        Some(path) => widget_at_mut(container.children_mut(), &path),
        None => None,
    };
    match existing {
        Some(slot) => {
            debug!(container = %container_id, %element, "replacing widget with the same identifier");
            let mut old = std::mem::replace(slot, widget);
            old.dispose();
        },
        None => container.add_child(widget),
    }
    container.mark_dirty();
    ApplyOutcome::Created
}

/// Disposes the widget and leaves a vacant slot, so positions of later
/// siblings do not move.
pub(crate) fn remove_element(container: &mut dyn GumpContainer, element: ElementId) -> ApplyOutcome {
    let container_id = container.server_id();
    let removed = resolve_element(container, element)
        .and_then(|path| vacate_at_path(container.children_mut(), &path));
    match removed {
        Some(mut widget) => {
            widget.dispose();
            container.mark_dirty();
            ApplyOutcome::Removed
        },
        None => {
            trace!(container = %container_id, %element, "remove: element not found");
            unresolved(container_id, element)
        },
    }
}

pub(crate) fn animate(
    container: &mut dyn GumpContainer,
    element: ElementId,
    kind: AnimationKind,
    duration_ms: u16,
) -> ApplyOutcome {
    let container_id = container.server_id();
    let Some(path) = resolve_element(container, element) else {
        return unresolved(container_id, element);
    };
    let Some(widget) = widget_at_mut(container.children_mut(), &path) else {
        return unresolved(container_id, element);
    };
    match widget.animation_mut() {
        Some(target) => {
            target.animate(kind, Duration::from_millis(u64::from(duration_ms)));
            ApplyOutcome::Animated
        },
        None => ApplyOutcome::Unsupported {
            container: container_id,
            element,
        },
    }
}

pub(crate) fn refresh(container: &mut dyn GumpContainer) -> ApplyOutcome {
    container.request_refresh();
    ApplyOutcome::Refreshed
}
