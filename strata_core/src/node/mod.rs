// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Widget node data model.
//!
//! A *node* is one widget in a window's tree. Each node has:
//!
//! - An identity ([`NodeId`]), a generational handle that becomes stale when
//!   the node is removed, so callbacks holding an old handle cannot reach a
//!   reused slot.
//! - Topology: parent, first-child and sibling links, plus a depth fixed at
//!   creation (`0` for a window root, `parent + 1` otherwise).
//! - State: a parent-relative rectangle, the absolute rectangle it last
//!   occupied on screen, [`NodeFlags`], an optional background and
//!   [`SizeBounds`](crate::window::SizeBounds).
//! - A cached [`DrawInfo`], recomputed on demand after invalidation.
//! - Its [`Widget`](crate::widget::Widget) and, for containers, a
//!   [`LayoutManager`](crate::widget::LayoutManager).
//!
//! Nodes are stored in struct-of-arrays layout in a single [`NodeStore`]
//! shared by every window; the store, not individual nodes, owns lifetime.
//!
//! # Redraw tracking
//!
//! Redraw requests are recorded on the [`dirty`](crate::dirty) channels:
//! a local request for a node alone (optionally with rectangles), or a tree
//! request that reaches every descendant through dependency edges.

mod draw_info;
mod flags;
mod id;
mod store;
mod traverse;

pub use draw_info::DrawInfo;
pub use flags::NodeFlags;
pub(crate) use id::NO_NODE;
pub use id::{BackgroundId, NodeId};
pub(crate) use store::{Drawn, LayoutSlot, RemovedNode};
pub use store::NodeStore;
pub use traverse::Children;
