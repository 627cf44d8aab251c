// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Collaborator traits.
//!
//! The engine never paints, lays out, or talks to a display server itself.
//! It drives three kinds of collaborators:
//!
//! - [`Widget`]: one per node. Receives lifecycle and position callbacks and
//!   paints itself when asked.
//! - [`LayoutManager`]: installed on container nodes. Positions children when
//!   the container is recalculated.
//! - [`WindowSurface`]: one per window. The backing raster plus the primitive
//!   operations the engine needs on it.
//!
//! Every callback that may fail returns `Result<(), CallbackError>`. A failure
//! is logged and reported on the owning window; the pass continues.

use kurbo::{Point, Rect};

use crate::error::CallbackError;
use crate::node::{BackgroundId, DrawInfo, NodeId};
use crate::pipeline::PipelineContext;

/// Relative paint order in the redraw stage.
///
/// All background-clearing redraws run before any content-painting redraw;
/// within each class deeper nodes run first.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RedrawPriority {
    /// The node clears its area to its background before painting.
    Background,
    /// The node paints content over whatever is already there.
    #[default]
    Content,
}

/// Why the engine is asking a widget how to redraw after a position update.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PositionChange {
    /// The node is on screen for the first time since it was shown.
    Placed,
    /// The size changed. `origin_moved` is `true` if the absolute origin
    /// changed as well.
    Resized {
        /// The absolute origin changed along with the size.
        origin_moved: bool,
    },
    /// Only the location changed, but the contents could not be copied.
    Moved,
}

/// A widget attached to a node.
///
/// All methods except [`draw`](Self::draw) have defaults that do nothing, or
/// the standard thing in the case of
/// [`redraw_after_position`](Self::redraw_after_position).
///
/// While a callback runs, the widget is temporarily taken out of its node, so
/// it may freely call back into the [`PipelineContext`], including removing
/// its own node.
pub trait Widget {
    /// Called once, the first time any pipeline stage reaches the node.
    fn initialize(&mut self, cx: &mut PipelineContext, id: NodeId) -> Result<(), CallbackError> {
        let _ = (cx, id);
        Ok(())
    }

    /// The node's on-screen visibility changed.
    fn visibility_changed(
        &mut self,
        cx: &mut PipelineContext,
        id: NodeId,
        visible: bool,
    ) -> Result<(), CallbackError> {
        let _ = (cx, id, visible);
        Ok(())
    }

    /// The node's rectangle (parent-relative) differs from where it was last
    /// drawn.
    fn process_updated_position(
        &mut self,
        cx: &mut PipelineContext,
        id: NodeId,
        rect: Rect,
    ) -> Result<(), CallbackError> {
        let _ = (cx, id, rect);
        Ok(())
    }

    /// The node was scheduled for a position update but ended up where it
    /// already was.
    fn process_same_position(
        &mut self,
        cx: &mut PipelineContext,
        id: NodeId,
        rect: Rect,
    ) -> Result<(), CallbackError> {
        let _ = (cx, id, rect);
        Ok(())
    }

    /// Schedules the redraw that follows a position update the engine could
    /// not satisfy by copying pixels.
    ///
    /// The default repaints the node alone when it was resized in place, and
    /// the node with all descendants otherwise.
    fn redraw_after_position(
        &mut self,
        cx: &mut PipelineContext,
        id: NodeId,
        change: PositionChange,
    ) -> Result<(), CallbackError> {
        match change {
            PositionChange::Resized {
                origin_moved: false,
            } => cx.schedule_full_redraw(id),
            _ => cx.schedule_redraw_recursively(id),
        }
        Ok(())
    }

    /// Returns `false` to opt out of move-with-contents; the node is then
    /// repainted at its new location instead.
    fn can_be_moved(&self) -> bool {
        true
    }

    /// The node's pixels are about to be copied from `from` to `to` (both
    /// absolute).
    fn contents_moved(
        &mut self,
        cx: &mut PipelineContext,
        id: NodeId,
        from: Rect,
        to: Rect,
    ) -> Result<(), CallbackError> {
        let _ = (cx, id, from, to);
        Ok(())
    }

    /// The node's redraw class.
    fn redraw_priority(&self) -> RedrawPriority {
        RedrawPriority::Content
    }

    /// Paints `rects` (absolute, already clipped to the node's viewport).
    fn draw(&mut self, cx: &mut DrawCx<'_>, rects: &[Rect]) -> Result<(), CallbackError>;
}

/// Positions the children of a container node.
pub trait LayoutManager {
    /// Recomputes child rectangles, typically through
    /// [`PipelineContext::set_position`].
    ///
    /// Recalculating may schedule an ancestor for recalculation; the engine
    /// picks that up in the same pass.
    fn recalculate(
        &mut self,
        cx: &mut PipelineContext,
        container: NodeId,
    ) -> Result<(), CallbackError>;
}

/// A window's backing raster and the operations the engine performs on it.
pub trait WindowSurface {
    /// Copies the pixels of `src` so that its origin lands on `dst`.
    fn copy_configured(&mut self, src: Rect, dst: Point);

    /// Fills `rect` with `background`, or the window default if `None`.
    fn clear(&mut self, rect: Rect, background: Option<BackgroundId>);

    /// Transfers `rects` from the backing raster to the visible window.
    fn flush_redrawn_areas(&mut self, rects: &[Rect]);
}

/// What a widget gets while painting.
pub struct DrawCx<'a> {
    id: NodeId,
    info: DrawInfo,
    surface: &'a mut dyn WindowSurface,
}

impl core::fmt::Debug for DrawCx<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("DrawCx")
            .field("id", &self.id)
            .field("info", &self.info)
            .finish_non_exhaustive()
    }
}

impl<'a> DrawCx<'a> {
    pub(crate) fn new(id: NodeId, info: DrawInfo, surface: &'a mut dyn WindowSurface) -> Self {
        Self { id, info, surface }
    }

    /// The node being painted.
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The node's cached geometry.
    #[must_use]
    pub fn info(&self) -> &DrawInfo {
        &self.info
    }

    /// The window's backing raster.
    pub fn surface(&mut self) -> &mut dyn WindowSurface {
        &mut *self.surface
    }
}
