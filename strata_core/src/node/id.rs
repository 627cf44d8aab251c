// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Node handles and background references.

use core::fmt;

/// Link value meaning "no node": the parent of a window root, the end of a
/// sibling chain, a leaf's first child.
pub(crate) const NO_NODE: u32 = u32::MAX;

/// A generation-checked handle to a widget node.
///
/// Widgets, layout managers and timers routinely hold handles across a
/// [`remove_node`](crate::pipeline::PipelineContext::remove_node). The freed
/// slot is recycled with a new generation, so such a handle goes stale
/// instead of reaching the slot's next occupant. Pipeline operations ignore
/// stale handles; [`NodeStore`](super::NodeStore) accessors panic on them.
///
/// Work-set buckets order handles by slot, which is stable across a pass but
/// says nothing about sibling order.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    pub(crate) idx: u32,
    pub(crate) generation: u32,
}

impl NodeId {
    /// Slot index, for diagnostics.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self.idx
    }

    /// How many times the slot had been freed when this handle was issued.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}v{}", self.idx, self.generation)
    }
}

/// A background the window surface knows how to paint: a solid colour, a
/// pixmap, a theme brush.
///
/// The engine never interprets it. Nodes without their own background
/// inherit the nearest ancestor's, and [`WindowSurface::clear`] receives it
/// when a background-priority widget is repainted.
///
/// [`WindowSurface::clear`]: crate::widget::WindowSurface::clear
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BackgroundId(pub u32);
