// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Struct-of-arrays node storage with allocation, topology, and redraw state.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::{fmt, mem};

use kurbo::{Rect, Size};
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use super::draw_info::DrawInfo;
use super::flags::NodeFlags;
use super::id::{BackgroundId, NO_NODE, NodeId};
use super::traverse::Children;
use crate::dirty;
use crate::geometry::{self, RedrawArea};
use crate::widget::{LayoutManager, Widget};
use crate::window::SizeBounds;

/// Where a node's pixels were last put on the window raster.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Drawn {
    /// Absolute rectangle of the node at the time.
    pub(crate) location: Rect,
    /// The viewport its painting was clipped to.
    pub(crate) viewport: Rect,
}

impl Drawn {
    pub(crate) fn from_info(info: &DrawInfo) -> Self {
        Self {
            location: info.absolute_location,
            viewport: info.viewport,
        }
    }

    /// Returns `true` if every pixel of `location` was painted by the node,
    /// so it can be copied as the node's contents.
    pub(crate) fn is_complete(&self) -> bool {
        geometry::contains(self.viewport, self.location)
    }
}

/// The layout manager slot of a node.
pub(crate) enum LayoutSlot {
    /// Not a container.
    Vacant,
    Installed(Box<dyn LayoutManager>),
    /// Taken out while its `recalculate` runs.
    Running,
}

impl LayoutSlot {
    fn into_installed(self) -> Option<Box<dyn LayoutManager>> {
        match self {
            Self::Installed(layout) => Some(layout),
            Self::Vacant | Self::Running => None,
        }
    }
}

/// Struct-of-arrays storage for every node of every window.
///
/// Nodes are addressed by [`NodeId`] handles. Each node occupies a slot in
/// parallel arrays. Removed nodes are recycled via a free list, and
/// generation counters make every outstanding handle to a removed node stale.
///
/// Window roots have no parent and depth 0; every other node is created
/// under a parent and has depth `parent + 1` for its whole life.
pub struct NodeStore {
    // -- Topology --
    pub(crate) parent: Vec<u32>,
    pub(crate) first_child: Vec<u32>,
    pub(crate) next_sibling: Vec<u32>,
    pub(crate) prev_sibling: Vec<u32>,
    pub(crate) depth: Vec<u32>,
    pub(crate) root: Vec<u32>,

    // -- Geometry and state --
    pub(crate) rect: Vec<Rect>,
    pub(crate) drawn: Vec<Option<Drawn>>,
    pub(crate) flags: Vec<NodeFlags>,
    pub(crate) background: Vec<Option<BackgroundId>>,
    pub(crate) bounds: Vec<SizeBounds>,
    pub(crate) draw_info: Vec<Option<DrawInfo>>,
    pub(crate) redraw_area: Vec<Option<RedrawArea>>,

    // -- Collaborators --
    pub(crate) widgets: Vec<Option<Box<dyn Widget>>>,
    pub(crate) layouts: Vec<LayoutSlot>,

    // -- Allocation --
    pub(crate) generation: Vec<u32>,
    pub(crate) alive: Vec<bool>,
    pub(crate) free_list: Vec<u32>,
    pub(crate) len: u32,

    // -- Dirty tracking --
    pub(crate) dirty: DirtyTracker<u32>,
    pub(crate) redraw_pending: bool,
}

impl Default for NodeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NodeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeStore")
            .field("len", &self.len)
            .field("free", &self.free_list.len())
            .field("parent", &self.parent)
            .field("depth", &self.depth)
            .field("rect", &self.rect)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl NodeStore {
    /// Creates an empty node store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            parent: Vec::new(),
            first_child: Vec::new(),
            next_sibling: Vec::new(),
            prev_sibling: Vec::new(),
            depth: Vec::new(),
            root: Vec::new(),
            rect: Vec::new(),
            drawn: Vec::new(),
            flags: Vec::new(),
            background: Vec::new(),
            bounds: Vec::new(),
            draw_info: Vec::new(),
            redraw_area: Vec::new(),
            widgets: Vec::new(),
            layouts: Vec::new(),
            generation: Vec::new(),
            alive: Vec::new(),
            free_list: Vec::new(),
            len: 0,
            dirty: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            redraw_pending: false,
        }
    }

    // -- Allocation API --

    fn allocate(&mut self, widget: Box<dyn Widget>) -> u32 {
        if let Some(idx) = self.free_list.pop() {
            // Reuse a freed slot. The generation was bumped when it was freed.
            let i = idx as usize;
            self.parent[i] = NO_NODE;
            self.first_child[i] = NO_NODE;
            self.next_sibling[i] = NO_NODE;
            self.prev_sibling[i] = NO_NODE;
            self.depth[i] = 0;
            self.root[i] = idx;
            self.rect[i] = Rect::ZERO;
            self.drawn[i] = None;
            self.flags[i] = NodeFlags::default();
            self.background[i] = None;
            self.bounds[i] = SizeBounds::UNBOUNDED;
            self.draw_info[i] = None;
            self.redraw_area[i] = None;
            self.widgets[i] = Some(widget);
            self.layouts[i] = LayoutSlot::Vacant;
            self.alive[i] = true;
            idx
        } else {
            // Allocate a new slot.
            let idx = self.len;
            self.len += 1;
            self.parent.push(NO_NODE);
            self.first_child.push(NO_NODE);
            self.next_sibling.push(NO_NODE);
            self.prev_sibling.push(NO_NODE);
            self.depth.push(0);
            self.root.push(idx);
            self.rect.push(Rect::ZERO);
            self.drawn.push(None);
            self.flags.push(NodeFlags::default());
            self.background.push(None);
            self.bounds.push(SizeBounds::UNBOUNDED);
            self.draw_info.push(None);
            self.redraw_area.push(None);
            self.widgets.push(Some(widget));
            self.layouts.push(LayoutSlot::Vacant);
            self.generation.push(0);
            self.alive.push(true);
            idx
        }
    }

    /// Creates a window root of the given size.
    pub(crate) fn create_root(&mut self, size: Size, widget: Box<dyn Widget>) -> NodeId {
        let idx = self.allocate(widget);
        self.rect[idx as usize] = Rect::from_origin_size((0.0, 0.0), size);
        self.id_at(idx)
    }

    /// Creates a node as the last child of `parent`.
    ///
    /// The node starts with an empty rectangle, hidden, and uninitialized.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale.
    pub(crate) fn create_child(&mut self, parent: NodeId, widget: Box<dyn Widget>) -> NodeId {
        self.validate(parent);
        let p = parent.idx;
        let c = self.allocate(widget);
        self.parent[c as usize] = p;
        self.depth[c as usize] = self.depth[p as usize] + 1;
        self.root[c as usize] = self.root[p as usize];

        if self.first_child[p as usize] == NO_NODE {
            self.first_child[p as usize] = c;
        } else {
            // Walk to last child.
            let mut last = self.first_child[p as usize];
            while self.next_sibling[last as usize] != NO_NODE {
                last = self.next_sibling[last as usize];
            }
            self.next_sibling[last as usize] = c;
            self.prev_sibling[c as usize] = last;
        }

        // Child depends on parent so a tree redraw of the parent reaches it.
        let _ = self.dirty.add_dependency(c, p, dirty::REDRAW_TREE);

        self.id_at(c)
    }

    /// Removes the subtree rooted at `id` and frees every slot in it.
    ///
    /// Returns the removed handles (pre-order) together with their widgets
    /// and layout managers, so the caller decides when they are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub(crate) fn remove_subtree(&mut self, id: NodeId) -> Vec<RemovedNode> {
        self.validate(id);
        if self.parent[id.idx as usize] != NO_NODE {
            self.unlink_from_parent(id.idx);
        }
        let indices = self.subtree_indices(id.idx);
        let mut removed = Vec::with_capacity(indices.len());
        for idx in indices {
            let i = idx as usize;
            removed.push(RemovedNode {
                id: self.id_at(idx),
                widget: self.widgets[i].take(),
                layout: mem::replace(&mut self.layouts[i], LayoutSlot::Vacant).into_installed(),
            });
            self.dirty.remove_key(idx);
            self.parent[i] = NO_NODE;
            self.first_child[i] = NO_NODE;
            self.next_sibling[i] = NO_NODE;
            self.prev_sibling[i] = NO_NODE;
            self.redraw_area[i] = None;
            self.draw_info[i] = None;
            // Bump generation so old handles immediately fail validation.
            self.generation[i] += 1;
            self.alive[i] = false;
            self.free_list.push(idx);
        }
        removed
    }

    /// Returns whether the given handle refers to a live node.
    #[must_use]
    pub fn is_alive(&self, id: NodeId) -> bool {
        id.idx < self.len && self.generation[id.idx as usize] == id.generation
    }

    /// Returns the number of live nodes.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.len as usize - self.free_list.len()
    }

    // -- Topology queries --

    /// Returns the parent, or `None` for a window root.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.validate(id);
        let p = self.parent[id.idx as usize];
        (p != NO_NODE).then(|| self.id_at(p))
    }

    /// Returns an iterator over the direct children, in creation order.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn children(&self, id: NodeId) -> Children<'_> {
        self.validate(id);
        Children::new(self, self.first_child[id.idx as usize])
    }

    /// Returns the nesting level: 0 for a window root.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn depth(&self, id: NodeId) -> u32 {
        self.validate(id);
        self.depth[id.idx as usize]
    }

    /// Returns the window root the node belongs to.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn window_of(&self, id: NodeId) -> NodeId {
        self.validate(id);
        self.id_at(self.root[id.idx as usize])
    }

    // -- Property queries --

    /// Returns the current rectangle, relative to the parent.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn rect(&self, id: NodeId) -> Rect {
        self.validate(id);
        self.rect[id.idx as usize]
    }

    /// Returns the absolute rectangle the node last occupied on screen, if
    /// it has been drawn or moved since it was last shown.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn drawn_rect(&self, id: NodeId) -> Option<Rect> {
        self.validate(id);
        self.drawn[id.idx as usize].map(|d| d.location)
    }

    /// Returns the node's flags.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn flags(&self, id: NodeId) -> NodeFlags {
        self.validate(id);
        self.flags[id.idx as usize]
    }

    /// Returns the background set on this node itself.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn background(&self, id: NodeId) -> Option<BackgroundId> {
        self.validate(id);
        self.background[id.idx as usize]
    }

    /// Returns the declared size bounds.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn size_bounds(&self, id: NodeId) -> SizeBounds {
        self.validate(id);
        self.bounds[id.idx as usize]
    }

    /// Returns `true` if a layout manager is installed on the node.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    #[must_use]
    pub fn is_container(&self, id: NodeId) -> bool {
        self.validate(id);
        !matches!(self.layouts[id.idx as usize], LayoutSlot::Vacant)
    }

    /// Returns the node's draw info, computing and caching it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn draw_info(&mut self, id: NodeId) -> DrawInfo {
        self.validate(id);
        self.draw_info_at(id.idx)
    }

    pub(crate) fn draw_info_at(&mut self, idx: u32) -> DrawInfo {
        if let Some(info) = self.draw_info[idx as usize] {
            return info;
        }
        // Walk up to the nearest cached ancestor, then fill in downwards.
        let mut chain = Vec::new();
        let mut cursor = idx;
        let mut base = None;
        loop {
            chain.push(cursor);
            let p = self.parent[cursor as usize];
            if p == NO_NODE {
                break;
            }
            if let Some(info) = self.draw_info[p as usize] {
                base = Some(info);
                break;
            }
            cursor = p;
        }
        let mut info = base;
        for &i in chain.iter().rev() {
            let computed = match info {
                None => DrawInfo::root(self.rect[i as usize], self.background[i as usize]),
                Some(parent) => parent.child(self.rect[i as usize], self.background[i as usize]),
            };
            self.draw_info[i as usize] = Some(computed);
            info = Some(computed);
        }
        self.draw_info[idx as usize].unwrap_or_else(|| {
            panic!("internal error: draw info for slot {idx} was not computed")
        })
    }

    /// Drops cached draw info for the subtree rooted at `idx`.
    pub(crate) fn invalidate_draw_info(&mut self, idx: u32) {
        for i in self.subtree_indices(idx) {
            self.draw_info[i as usize] = None;
        }
    }

    // -- Mutation (crate-internal; the pipeline schedules the follow-up) --

    pub(crate) fn set_rect(&mut self, idx: u32, rect: Rect) {
        self.rect[idx as usize] = rect;
        self.invalidate_draw_info(idx);
    }

    pub(crate) fn set_background(&mut self, idx: u32, background: Option<BackgroundId>) {
        self.background[idx as usize] = background;
        self.invalidate_draw_info(idx);
    }

    // -- Widget slots --

    /// Takes the widget out of its slot for the duration of a callback.
    pub(crate) fn take_widget(&mut self, id: NodeId) -> Option<Box<dyn Widget>> {
        if !self.is_alive(id) {
            return None;
        }
        self.widgets[id.idx as usize].take()
    }

    /// Puts a widget back, unless the node was removed in the meantime.
    pub(crate) fn restore_widget(&mut self, id: NodeId, widget: Box<dyn Widget>) {
        if self.is_alive(id) {
            self.widgets[id.idx as usize] = Some(widget);
        }
    }

    /// Takes the layout manager out for a `recalculate` run, leaving the
    /// slot marked as running.
    pub(crate) fn take_layout(&mut self, id: NodeId) -> Option<Box<dyn LayoutManager>> {
        if !self.is_alive(id) {
            return None;
        }
        let slot = &mut self.layouts[id.idx as usize];
        if !matches!(slot, LayoutSlot::Installed(_)) {
            return None;
        }
        mem::replace(slot, LayoutSlot::Running).into_installed()
    }

    /// Puts a layout manager back, unless the node was removed while it was
    /// out.
    pub(crate) fn restore_layout(&mut self, id: NodeId, layout: Box<dyn LayoutManager>) {
        if self.is_alive(id) {
            self.layouts[id.idx as usize] = LayoutSlot::Installed(layout);
        }
    }

    // -- Redraw tracking --

    /// Requests a redraw of `area` (node-local) on node `idx` only.
    pub(crate) fn mark_redraw(&mut self, idx: u32, area: RedrawArea) {
        match &mut self.redraw_area[idx as usize] {
            Some(existing) => existing.merge(area),
            slot @ None => *slot = Some(area),
        }
        self.dirty.mark(idx, dirty::REDRAW);
        self.redraw_pending = true;
    }

    /// Requests a full redraw of `idx` and every descendant.
    pub(crate) fn mark_redraw_tree(&mut self, idx: u32) {
        self.dirty.mark_with(idx, dirty::REDRAW_TREE, &EagerPolicy);
        self.redraw_pending = true;
    }

    /// Drains both redraw channels, returning each affected slot once with
    /// the area it must repaint.
    pub(crate) fn take_redraw_set(&mut self) -> BTreeMap<u32, RedrawArea> {
        self.redraw_pending = false;
        let tree: Vec<u32> = self
            .dirty
            .drain(dirty::REDRAW_TREE)
            .affected()
            .deterministic()
            .run()
            .collect();
        let local: Vec<u32> = self
            .dirty
            .drain(dirty::REDRAW)
            .deterministic()
            .run()
            .collect();

        let mut out = BTreeMap::new();
        for idx in local {
            if !self.alive[idx as usize] {
                continue;
            }
            let area = self.redraw_area[idx as usize].take().unwrap_or_default();
            out.insert(idx, area);
        }
        for idx in tree {
            if !self.alive[idx as usize] {
                continue;
            }
            self.redraw_area[idx as usize] = None;
            out.insert(idx, RedrawArea::Entire);
        }
        out
    }

    /// Returns `true` if any redraw is pending.
    #[must_use]
    pub fn has_pending_redraw(&self) -> bool {
        self.redraw_pending
    }

    // -- Internal helpers --

    pub(crate) fn id_at(&self, idx: u32) -> NodeId {
        NodeId {
            idx,
            generation: self.generation[idx as usize],
        }
    }

    /// Panics if the handle is stale.
    pub(crate) fn validate(&self, id: NodeId) {
        assert!(
            self.is_alive(id),
            "stale NodeId: {id:?} (current gen: {})",
            if id.idx < self.len {
                self.generation[id.idx as usize]
            } else {
                u32::MAX
            }
        );
    }

    /// Removes `idx` from its parent's child list.
    fn unlink_from_parent(&mut self, idx: u32) {
        let p = self.parent[idx as usize];
        let prev = self.prev_sibling[idx as usize];
        let next = self.next_sibling[idx as usize];

        if prev != NO_NODE {
            self.next_sibling[prev as usize] = next;
        } else {
            // Was first child.
            self.first_child[p as usize] = next;
        }

        if next != NO_NODE {
            self.prev_sibling[next as usize] = prev;
        }

        self.dirty.remove_dependency(idx, p, dirty::REDRAW_TREE);
        self.parent[idx as usize] = NO_NODE;
        self.prev_sibling[idx as usize] = NO_NODE;
        self.next_sibling[idx as usize] = NO_NODE;
    }
}

/// A node taken out of the store by [`NodeStore::remove_subtree`].
pub(crate) struct RemovedNode {
    pub(crate) id: NodeId,
    pub(crate) widget: Option<Box<dyn Widget>>,
    pub(crate) layout: Option<Box<dyn LayoutManager>>,
}
