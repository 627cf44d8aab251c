// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle helpers over [`kurbo`] geometry.
//!
//! All engine geometry is in window pixels with integral values, stored as
//! [`kurbo::Rect`]. "Overlap" always means a shared region of positive area:
//! rectangles that merely touch along an edge do not overlap.

use alloc::vec;
use alloc::vec::Vec;

pub use kurbo::{Point, Rect, Size, Vec2};

/// Creates a rectangle from an origin and a size.
#[inline]
#[must_use]
pub fn rect(x: f64, y: f64, width: f64, height: f64) -> Rect {
    Rect::new(x, y, x + width, y + height)
}

/// Returns `true` if `a` and `b` share a region of positive area.
///
/// An empty rectangle overlaps nothing, even when it lies inside the other.
#[inline]
#[must_use]
pub fn overlaps(a: Rect, b: Rect) -> bool {
    !is_empty(a) && !is_empty(b) && a.x0 < b.x1 && b.x0 < a.x1 && a.y0 < b.y1 && b.y0 < a.y1
}

/// Returns `true` if `inner` lies entirely within `outer`.
#[inline]
#[must_use]
pub fn contains(outer: Rect, inner: Rect) -> bool {
    inner.x0 >= outer.x0 && inner.y0 >= outer.y0 && inner.x1 <= outer.x1 && inner.y1 <= outer.y1
}

/// Returns `true` if the rectangle has no area.
#[inline]
#[must_use]
pub fn is_empty(r: Rect) -> bool {
    !(r.x1 > r.x0 && r.y1 > r.y0)
}

/// Returns `true` if the rectangle cannot be used for pixel operations:
/// non-finite coordinates or a negative extent.
#[inline]
#[must_use]
pub fn is_degenerate(r: Rect) -> bool {
    !(r.x0.is_finite() && r.y0.is_finite() && r.x1.is_finite() && r.y1.is_finite())
        || r.x1 < r.x0
        || r.y1 < r.y0
}

/// Clips `r` to `clip`, returning `None` if nothing remains.
#[inline]
#[must_use]
pub fn clip(r: Rect, clip: Rect) -> Option<Rect> {
    let out = r.intersect(clip);
    (!is_empty(out)).then_some(out)
}

/// Returns `a − b` as at most four disjoint rectangles.
#[must_use]
pub fn subtract(a: Rect, b: Rect) -> Vec<Rect> {
    if !overlaps(a, b) {
        return if is_empty(a) { Vec::new() } else { vec![a] };
    }
    let mut out = Vec::with_capacity(4);
    // Full-width bands above and below, then the left and right slivers of
    // the middle band.
    if b.y0 > a.y0 {
        out.push(Rect::new(a.x0, a.y0, a.x1, b.y0));
    }
    if b.y1 < a.y1 {
        out.push(Rect::new(a.x0, b.y1, a.x1, a.y1));
    }
    let y0 = a.y0.max(b.y0);
    let y1 = a.y1.min(b.y1);
    if b.x0 > a.x0 {
        out.push(Rect::new(a.x0, y0, b.x0, y1));
    }
    if b.x1 < a.x1 {
        out.push(Rect::new(b.x1, y0, a.x1, y1));
    }
    out
}

/// Returns the bounding box of `rects`, or `None` if the iterator is empty.
#[must_use]
pub fn bounding_box(rects: impl IntoIterator<Item = Rect>) -> Option<Rect> {
    rects.into_iter().reduce(|acc, r| acc.union(r))
}

/// Merges overlapping and adjacent rectangles in place.
///
/// Two rectangles are merged only when their union covers exactly the
/// pixels of the pair (one contains the other, or they share a full edge
/// span), so the covered area never grows. Empty rectangles are dropped.
pub fn coalesce(rects: &mut Vec<Rect>) {
    rects.retain(|r| !is_empty(*r));
    'restart: loop {
        for i in 0..rects.len() {
            for j in (i + 1)..rects.len() {
                if let Some(merged) = exact_union(rects[i], rects[j]) {
                    rects[i] = merged;
                    rects.swap_remove(j);
                    continue 'restart;
                }
            }
        }
        break;
    }
}

fn exact_union(a: Rect, b: Rect) -> Option<Rect> {
    if contains(a, b) {
        return Some(a);
    }
    if contains(b, a) {
        return Some(b);
    }
    let same_columns = a.x0 == b.x0 && a.x1 == b.x1;
    let rows_touch = a.y0 <= b.y1 && b.y0 <= a.y1;
    let same_rows = a.y0 == b.y0 && a.y1 == b.y1;
    let columns_touch = a.x0 <= b.x1 && b.x0 <= a.x1;
    ((same_columns && rows_touch) || (same_rows && columns_touch)).then(|| a.union(b))
}

/// The rectangles a node must repaint.
///
/// A node's pending redraw is either its entire area or an accumulated list
/// of rectangles in node-local coordinates.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum RedrawArea {
    /// The entire node must be repainted.
    #[default]
    Entire,
    /// Only these rectangles, relative to the node's origin.
    Rects(Vec<Rect>),
}

impl RedrawArea {
    /// Adds a rectangle to the area. Has no effect on [`Entire`](Self::Entire).
    pub fn add(&mut self, r: Rect) {
        if let Self::Rects(rects) = self {
            rects.push(r);
        }
    }

    /// Merges another area into this one.
    pub fn merge(&mut self, other: Self) {
        match other {
            Self::Entire => *self = Self::Entire,
            Self::Rects(b) => {
                if let Self::Rects(a) = self {
                    a.extend(b);
                }
            }
        }
    }

    /// Resolves the area to absolute rectangles for a node located at
    /// `location`, clipped to `viewport`.
    #[must_use]
    pub fn resolve(&self, location: Rect, viewport: Rect) -> Vec<Rect> {
        let origin = location.origin().to_vec2();
        let mut out: Vec<Rect> = match self {
            Self::Entire => clip(location, viewport).into_iter().collect(),
            Self::Rects(rects) => rects
                .iter()
                .filter_map(|r| clip(*r + origin, location))
                .filter_map(|r| clip(r, viewport))
                .collect(),
        };
        coalesce(&mut out);
        out
    }
}
