// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Redraw channels.
//!
//! The redraw work-set is backed by [`understory_dirty`] rather than a plain
//! set, because one kind of request has to reach an entire subtree:
//!
//! - [`REDRAW`] is local-only. Marking a node schedules exactly that node;
//!   the rectangles it must repaint are kept alongside in the node store.
//! - [`REDRAW_TREE`] is marked with
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) and carries dependency
//!   edges from child to parent, so marking a node also marks every
//!   descendant. Nodes reached this way repaint their entire area.
//!
//! Both channels are drained together at the start of the redraw stage by
//! [`NodeStore::take_redraw_set`](crate::node::NodeStore::take_redraw_set).

use understory_dirty::Channel;

/// A node asked for a (possibly partial) redraw of itself.
pub const REDRAW: Channel = Channel::new(0);

/// A node asked for a full redraw of itself and all descendants.
pub const REDRAW_TREE: Channel = Channel::new(1);
