//! Container tracking and element resolution.
//!
//! Containers resolve through the tracking table first and fall back to a scan
//! of every open container, matching either the server-assigned or the
//! locally-assigned identifier. Elements resolve by explicit identifier
//! anywhere in the widget tree first, and fall back to treating the
//! identifier as an index into the container's top-level children.
//! Removed widgets leave a [`VacantSlot`] behind so those indices stay fixed;
//! vacant slots never resolve.
//!
//! Element lookups return an [`ElementPath`] of child indices from an
//! immutable search; mutation then walks that path.

use std::collections::BTreeMap;
use std::fmt::Debug;

use smallvec::SmallVec;
use tracing::trace;

use crate::client::host::{GumpContainer, UiHost};
use crate::client::widget::{VacantSlot, Widget};
use crate::{ContainerId, ElementId};

/// Child indices from a container's top level down to one widget.
pub type ElementPath = SmallVec<[usize; 4]>;

/// Maps container identifiers to host handles.
///
/// A handle may be registered under several identifiers; untracking a handle
/// removes all of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTracker<H> {
    by_id: BTreeMap<ContainerId, H>,
}

impl<H> Default for ContainerTracker<H> {
    fn default() -> Self {
        Self {
            by_id: BTreeMap::new(),
        }
    }
}

impl<H: Copy + Eq + Ord + Debug> ContainerTracker<H> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps `id` to `handle`, returning the handle it replaced.
    pub fn track(&mut self, id: ContainerId, handle: H) -> Option<H> {
        let previous = self.by_id.insert(id, handle);
        trace!(container = %id, ?handle, ?previous, "tracking container");
        previous
    }

    /// Removes every identifier that maps to `handle`. Returns how many were removed.
    pub fn untrack(&mut self, handle: H) -> usize {
        let before = self.by_id.len();
        self.by_id.retain(|_, h| *h != handle);
        let removed = before - self.by_id.len();
        trace!(?handle, removed, "untracked container");
        removed
    }

    /// The handle tracked under `id`.
    #[must_use]
    pub fn get(&self, id: ContainerId) -> Option<H> {
        self.by_id.get(&id).copied()
    }

    /// Every identifier that maps to `handle`.
    #[must_use]
    pub fn ids_for(&self, handle: H) -> SmallVec<[ContainerId; 2]> {
        self.by_id
            .iter()
            .filter_map(|(id, h)| (*h == handle).then_some(*id))
            .collect()
    }

    /// Number of tracked identifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Drops every mapping.
    pub fn clear(&mut self) {
        self.by_id.clear();
    }

    /// Finds the open container a frame addressed to `id` refers to.
    pub fn resolve<U>(&self, host: &U, id: ContainerId) -> Option<H>
    where
        U: UiHost<Handle = H> + ?Sized,
    {
        let live = |handle: H| host.container(handle).is_some_and(|c| !c.is_disposed());

        if let Some(handle) = self.get(id) {
            if live(handle) {
                return Some(handle);
            }
            trace!(container = %id, ?handle, "tracked handle is gone, scanning");
        }

        host.open_containers().into_iter().find(|&handle| {
            host.container(handle).is_some_and(|c| {
                !c.is_disposed() && (c.server_id() == id || c.local_id() == Some(id))
            })
        })
    }
}

/// Searches the widget tree depth-first for a widget whose local identifier is `id`.
#[must_use]
pub fn find_widget_path(children: &[Box<dyn Widget>], id: ElementId) -> Option<ElementPath> {
    fn search(children: &[Box<dyn Widget>], id: ElementId, path: &mut ElementPath) -> bool {
        for (index, child) in children.iter().enumerate() {
            if child.is_vacant() {
                continue;
            }
            path.push(index);
            if child.local_id() == Some(id) || search(child.children(), id, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = ElementPath::new();
    search(children, id, &mut path).then_some(path)
}

/// Resolves `id` within `container`: explicit identifier first, then position.
#[must_use]
pub fn resolve_element(container: &dyn GumpContainer, id: ElementId) -> Option<ElementPath> {
    let children = container.children();
    if let Some(path) = find_widget_path(children, id) {
        return Some(path);
    }
    let index = id.as_index();
    if children.get(index).is_some_and(|child| !child.is_vacant()) {
        trace!(element = %id, "resolved by position");
        let mut path = ElementPath::new();
        path.push(index);
        return Some(path);
    }
    None
}

/// Follows `path` down from a top-level child list.
pub fn widget_at_mut<'a>(
    children: &'a mut [Box<dyn Widget>],
    path: &[usize],
) -> Option<&'a mut Box<dyn Widget>> {
    let (first, rest) = path.split_first()?;
    let mut current = children.get_mut(*first)?;
    for index in rest {
        current = current.children_mut()?.get_mut(*index)?;
    }
    Some(current)
}

/// Takes the widget at `path` out of the tree, leaving a [`VacantSlot`] in
/// its place. Returns `None` if the path is invalid or already vacant.
pub fn vacate_at_path(
    children: &mut [Box<dyn Widget>],
    path: &[usize],
) -> Option<Box<dyn Widget>> {
    let slot = widget_at_mut(children, path)?;
    if slot.is_vacant() {
        return None;
    }
    Some(std::mem::replace(slot, Box::new(VacantSlot)))
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

    struct Leaf(Option<ElementId>);

    impl Widget for Leaf {
        fn local_id(&self) -> Option<ElementId> {
            self.0
        }
    }

    struct Group(Vec<Box<dyn Widget>>);

    impl Widget for Group {
        fn local_id(&self) -> Option<ElementId> {
            None
        }

        fn children(&self) -> &[Box<dyn Widget>] {
            &self.0
        }

        fn children_mut(&mut self) -> Option<&mut Vec<Box<dyn Widget>>> {
            Some(&mut self.0)
        }
    }

    fn tree() -> Vec<Box<dyn Widget>> {
        vec![
            Box::new(Leaf(None)),
            Box::new(Group(vec![
                Box::new(Leaf(None)),
                Box::new(Leaf(Some(ElementId::new(42)))),
            ])),
            Box::new(Leaf(None)),
            Box::new(Leaf(None)),
        ]
    }

    #[test]
    fn finds_nested_explicit_id() {
        let children = tree();
        let path = find_widget_path(&children, ElementId::new(42)).unwrap();
        assert_eq!(path.as_slice(), &[1, 1]);
        assert!(find_widget_path(&children, ElementId::new(7)).is_none());
    }

    #[test]
    fn walk_and_vacate() {
        let mut children = tree();
        let widget = widget_at_mut(&mut children, &[1, 1]).unwrap();
        assert_eq!(widget.local_id(), Some(ElementId::new(42)));
        assert!(widget_at_mut(&mut children, &[0, 0]).is_none());
        assert!(widget_at_mut(&mut children, &[]).is_none());

        let removed = vacate_at_path(&mut children, &[1, 1]).unwrap();
        assert_eq!(removed.local_id(), Some(ElementId::new(42)));
        assert_eq!(children[1].children().len(), 2);
        assert!(children[1].children()[1].is_vacant());
        assert!(find_widget_path(&children, ElementId::new(42)).is_none());

        assert!(vacate_at_path(&mut children, &[9]).is_none());
        assert!(vacate_at_path(&mut children, &[2]).is_some());
        assert!(vacate_at_path(&mut children, &[2]).is_none());
        assert_eq!(children.len(), 4);
    }

    struct Sheet(Vec<Box<dyn Widget>>);

    impl GumpContainer for Sheet {
        fn server_id(&self) -> ContainerId {
            ContainerId::new(1)
        }

        fn children(&self) -> &[Box<dyn Widget>] {
            &self.0
        }

        fn children_mut(&mut self) -> &mut Vec<Box<dyn Widget>> {
            &mut self.0
        }

        fn mark_dirty(&mut self) {}

        fn request_refresh(&mut self) {}

        fn dispose(&mut self) {}

        fn is_disposed(&self) -> bool {
            false
        }
    }

    #[test]
    fn vacated_slot_keeps_later_positions() {
        let mut sheet = Sheet(tree());
        vacate_at_path(sheet.children_mut(), &[0]).unwrap();

        assert!(resolve_element(&sheet, ElementId::new(0)).is_none());
        let path = resolve_element(&sheet, ElementId::new(3)).unwrap();
        assert_eq!(path.as_slice(), &[3]);
        assert_eq!(sheet.children().len(), 4);
    }

    #[test]
    fn tracker_aliases_and_untrack() {
        let mut tracker = ContainerTracker::new();
        assert_eq!(tracker.track(ContainerId::new(1), 10u32), None);
        tracker.track(ContainerId::new(2), 10);
        tracker.track(ContainerId::new(3), 11);
        assert_eq!(tracker.ids_for(10).len(), 2);

        assert_eq!(tracker.untrack(10), 2);
        assert_eq!(tracker.get(ContainerId::new(1)), None);
        assert_eq!(tracker.get(ContainerId::new(3)), Some(11));
        assert_eq!(tracker.len(), 1);
        tracker.clear();
        assert!(tracker.is_empty());
    }
}
