// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cached absolute geometry.

use kurbo::Rect;

use super::id::BackgroundId;

/// Geometry a node needs to paint itself, derived from its ancestry.
///
/// Cached per node and invalidated for a whole subtree whenever a position,
/// background or visibility change could affect it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawInfo {
    /// The node's rectangle in window coordinates.
    pub absolute_location: Rect,
    /// The part of the window the node may paint into: its absolute location
    /// clipped by every ancestor's viewport. May be empty.
    pub viewport: Rect,
    /// The background inherited from the nearest ancestor (or self) that
    /// sets one.
    pub background: Option<BackgroundId>,
}

impl DrawInfo {
    /// Draw info for a window root of the given rectangle.
    pub(crate) fn root(rect: Rect, background: Option<BackgroundId>) -> Self {
        let absolute_location = rect.with_origin((0.0, 0.0));
        Self {
            absolute_location,
            viewport: absolute_location,
            background,
        }
    }

    /// Draw info for a child placed at `rect` (parent-relative) under `self`.
    pub(crate) fn child(&self, rect: Rect, background: Option<BackgroundId>) -> Self {
        let absolute_location = rect + self.absolute_location.origin().to_vec2();
        let viewport = absolute_location.intersect(self.viewport);
        Self {
            absolute_location,
            viewport: if viewport.is_zero_area() {
                Rect::ZERO
            } else {
                viewport
            },
            background: background.or(self.background),
        }
    }

    /// Returns `true` if the node is completely inside its viewport.
    #[must_use]
    pub fn is_unclipped(&self) -> bool {
        crate::geometry::contains(self.viewport, self.absolute_location)
    }
}
