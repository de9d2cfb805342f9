//! Traits the client-side UI framework implements.
//!
//! The engine owns no widgets or containers. It borrows them from a
//! [`UiHost`] for the duration of one packet and only touches them through
//! these traits.

use std::fmt::Debug;

use crate::client::widget::{Widget, WidgetSpec};
use crate::ContainerId;

/// An open container (gump) on the client.
pub trait GumpContainer {
    /// Identifier the server assigned to this container instance.
    fn server_id(&self) -> ContainerId;

    /// Identifier the client assigned locally, if it differs.
    fn local_id(&self) -> Option<ContainerId> {
        None
    }

    /// Top-level widgets in build order.
    fn children(&self) -> &[Box<dyn Widget>];

    /// Mutable access to the top-level widgets.
    fn children_mut(&mut self) -> &mut Vec<Box<dyn Widget>>;

    /// Inserts a widget at the end of the top-level list.
    fn add_child(&mut self, widget: Box<dyn Widget>) {
        self.children_mut().push(widget);
    }

    /// Flags layout and size for recomputation.
    fn mark_dirty(&mut self);

    /// Asks for the container's content to be redrawn.
    fn request_refresh(&mut self);

    /// Releases the container. Called once, when a Close frame arrives.
    fn dispose(&mut self);

    /// Returns true once the container has been disposed.
    fn is_disposed(&self) -> bool;
}

/// The client's UI framework, as seen by the apply engine.
pub trait UiHost {
    /// How the host refers to an open container.
    type Handle: Copy + Eq + Ord + Debug;

    /// Borrows an open container.
    fn container(&self, handle: Self::Handle) -> Option<&dyn GumpContainer>;

    /// Mutably borrows an open container.
    fn container_mut(&mut self, handle: Self::Handle) -> Option<&mut dyn GumpContainer>;

    /// Handles of every open container, for the fallback scan.
    fn open_containers(&self) -> Vec<Self::Handle>;

    /// Builds a widget for an AddElement frame, or `None` if the host cannot.
    fn create_widget(&mut self, spec: &WidgetSpec) -> Option<Box<dyn Widget>>;

    /// Removes a disposed container from the UI.
    fn close_container(&mut self, handle: Self::Handle);
}
