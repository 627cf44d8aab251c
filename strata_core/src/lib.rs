// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Widget tree, work-sets and the per-frame synchronization pipeline.
//!
//! `strata_core` owns everything the toolkit thread mutates: the node arena,
//! the per-cycle work-sets, window backing-raster bookkeeping, and the
//! pipeline that turns "something changed" into "pixels on screen". It is
//! `no_std` compatible (with `alloc`) and never blocks; the event loop that
//! drives it lives in `strata_loop`.
//!
//! # Architecture
//!
//! Every cycle runs the same fixed sequence of stages over
//! [`PipelineContext`](pipeline::PipelineContext):
//!
//! ```text
//!   schedule_*() ──► WorkSets (depth-keyed)
//!                        │
//!                        ▼
//!   Visibility ──► Recalculation ──► Position ──► Redraw ──► Flush
//!   (deepest)       (deepest)         (shallowest)  │           │
//!                                        │          │           ▼
//!                                        ▼          │   WindowSurface::
//!                                  move_order::     │   flush_redrawn_areas
//!                                  plan_moves()     │
//!                                        │          ▼
//!                                        └──► copy_configured / draw
//! ```
//!
//! **[`node`]**: Struct-of-arrays widget arena with generational handles.
//! Depth is fixed at creation; removal cascades synchronously.
//!
//! **[`workset`]**: Depth-keyed work-sets with idempotent scheduling and
//! depth-ordered draining, plus the timer and idle queues.
//!
//! **[`move_order`]**: The move-vs-redraw optimizer: direction consensus
//! and conflict-safe ordering of pixel copies.
//!
//! **[`window`]**: Per-window state: the resize gate, exposure and flush
//! regions, "once stable" callbacks and the exception channel.
//!
//! **[`pipeline`]**: The driver that runs the five stages in order.
//!
//! **[`widget`]**: The collaborator traits implemented by widget kinds,
//! layout managers and window surfaces.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod config;
pub mod dirty;
pub mod error;
pub mod geometry;
pub mod move_order;
pub mod node;
pub mod pipeline;
pub mod time;
pub mod widget;
pub mod window;
pub mod workset;

#[cfg(test)]
mod test_util;
