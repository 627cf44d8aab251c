// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-window state and the resize gate.
//!
//! A window is a root node plus a [`WindowState`]: its backing raster, the
//! rectangles waiting to be flushed to screen, and the resize gate.
//!
//! # Resize gate
//!
//! When a window's size falls outside the [`SizeBounds`] declared on its
//! root while it is shown, the window manager is expected to follow up with
//! a corrected size soon. Rather than laying out and painting for a size
//! that is about to change, the gate enters
//! [`PendingUntil`](ResizeGate::PendingUntil) and every stage skips the
//! window's nodes (they stay queued). The gate resolves when a later check
//! finds the size back in bounds, or when the deadline passes. A gate that
//! expired is not re-armed for the same size and bounds.

use alloc::boxed::Box;
use alloc::collections::VecDeque;
use alloc::vec::Vec;
use core::fmt;

use kurbo::{Rect, Size};
use tracing::trace;

use crate::error::{CallbackFailure, CallbackKind};
use crate::geometry::RedrawArea;
use crate::node::NodeId;
use crate::time::{Duration, HostTime};
use crate::widget::WindowSurface;
use crate::workset::Callback;

/// Minimum and maximum size a node can be laid out at.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SizeBounds {
    /// Smallest acceptable size.
    pub min: Size,
    /// Largest acceptable size.
    pub max: Size,
}

impl SizeBounds {
    /// Accepts every size.
    pub const UNBOUNDED: Self = Self {
        min: Size::ZERO,
        max: Size::new(f64::INFINITY, f64::INFINITY),
    };

    /// Creates bounds from a minimum and maximum.
    #[must_use]
    pub const fn new(min: Size, max: Size) -> Self {
        Self { min, max }
    }

    /// Returns `true` if `size` lies within the bounds (inclusive).
    #[must_use]
    pub fn contains(&self, size: Size) -> bool {
        size.width >= self.min.width
            && size.height >= self.min.height
            && size.width <= self.max.width
            && size.height <= self.max.height
    }
}

impl Default for SizeBounds {
    fn default() -> Self {
        Self::UNBOUNDED
    }
}

const KINDS: usize = CallbackKind::Scheduled as usize + 1;

/// A window's bounded record of callback failures.
///
/// Once full, recording a failure drops the oldest one. Drops are counted
/// per [`CallbackKind`], so an application that drains rarely still learns
/// which boundaries it lost reports from.
pub struct ExceptionChannel {
    records: VecDeque<CallbackFailure>,
    capacity: usize,
    dropped: [u64; KINDS],
}

impl fmt::Debug for ExceptionChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExceptionChannel")
            .field("len", &self.records.len())
            .field("capacity", &self.capacity)
            .field("dropped", &self.dropped())
            .finish()
    }
}

impl ExceptionChannel {
    /// A capacity of zero is treated as one.
    pub(crate) fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            dropped: [0; KINDS],
        }
    }

    pub(crate) fn record(&mut self, failure: CallbackFailure) {
        if self.records.len() == self.capacity
            && let Some(oldest) = self.records.pop_front()
        {
            trace!(node = ?oldest.node, kind = ?oldest.kind, "exception record dropped");
            self.dropped[oldest.kind as usize] += 1;
        }
        self.records.push_back(failure);
    }

    /// Removes and returns every record, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<CallbackFailure> {
        self.records.drain(..).collect()
    }

    /// The records currently held, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &CallbackFailure> + '_ {
        self.records.iter()
    }

    /// Number of records held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total number of records dropped because the channel was full.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.iter().sum()
    }

    /// Number of dropped records caught at the `kind` boundary.
    #[must_use]
    pub fn dropped_of(&self, kind: CallbackKind) -> u64 {
        self.dropped[kind as usize]
    }
}

/// The two-state resize gate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ResizeGate {
    /// Processing proceeds normally.
    #[default]
    NotResizing,
    /// Processing of this window is deferred until the deadline, or until a
    /// check finds the size back in bounds.
    PendingUntil(HostTime),
}

/// Outcome of a gate check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GateTransition {
    /// No state change.
    Unchanged,
    /// The gate went from not resizing to pending.
    Started,
    /// The gate went from pending to not resizing.
    Resolved,
}

/// Engine-side state of one window.
pub struct WindowState {
    pub(crate) surface: Box<dyn WindowSurface>,
    pub(crate) gate: ResizeGate,
    /// Size and bounds the gate last timed out on.
    timed_out_on: Option<(Size, SizeBounds)>,
    pub(crate) exposures: Vec<Rect>,
    pub(crate) flush: Vec<Rect>,
    pub(crate) stable_callbacks: Vec<Callback>,
    pub(crate) deferred_redraws: Vec<(NodeId, RedrawArea)>,
    pub(crate) exceptions: ExceptionChannel,
}

impl fmt::Debug for WindowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WindowState")
            .field("gate", &self.gate)
            .field("exposures", &self.exposures)
            .field("flush", &self.flush)
            .field("stable_callbacks", &self.stable_callbacks.len())
            .field("deferred_redraws", &self.deferred_redraws.len())
            .field("exceptions", &self.exceptions.len())
            .finish_non_exhaustive()
    }
}

impl WindowState {
    pub(crate) fn new(surface: Box<dyn WindowSurface>, exception_capacity: usize) -> Self {
        Self {
            surface,
            gate: ResizeGate::NotResizing,
            timed_out_on: None,
            exposures: Vec::new(),
            flush: Vec::new(),
            stable_callbacks: Vec::new(),
            deferred_redraws: Vec::new(),
            exceptions: ExceptionChannel::new(exception_capacity),
        }
    }

    /// The current gate state.
    #[must_use]
    pub fn gate(&self) -> ResizeGate {
        self.gate
    }

    /// Returns `true` if the window's nodes must be skipped at `now`.
    #[must_use]
    pub fn is_deferred(&self, now: HostTime) -> bool {
        matches!(self.gate, ResizeGate::PendingUntil(deadline) if now < deadline)
    }

    /// The gate's deadline, if pending.
    #[must_use]
    pub fn deadline(&self) -> Option<HostTime> {
        match self.gate {
            ResizeGate::PendingUntil(deadline) => Some(deadline),
            ResizeGate::NotResizing => None,
        }
    }

    /// The window's exception channel.
    #[must_use]
    pub fn exceptions(&self) -> &ExceptionChannel {
        &self.exceptions
    }

    /// Number of failure records dropped because the channel was full.
    #[must_use]
    pub fn dropped_exceptions(&self) -> u64 {
        self.exceptions.dropped()
    }

    /// Re-evaluates the gate.
    ///
    /// `out_of_bounds` is whether the shown window's size lies outside the
    /// root's bounds; `size` and `bounds` identify the situation so an
    /// expired gate is not re-armed for it.
    pub(crate) fn check_gate(
        &mut self,
        now: HostTime,
        timeout: Duration,
        size: Size,
        bounds: SizeBounds,
        out_of_bounds: bool,
    ) -> GateTransition {
        match self.gate {
            ResizeGate::NotResizing => {
                if !out_of_bounds {
                    self.timed_out_on = None;
                    return GateTransition::Unchanged;
                }
                if self.timed_out_on == Some((size, bounds)) {
                    return GateTransition::Unchanged;
                }
                self.gate = ResizeGate::PendingUntil(now + timeout);
                GateTransition::Started
            }
            ResizeGate::PendingUntil(deadline) => {
                if !out_of_bounds {
                    self.timed_out_on = None;
                } else if now >= deadline {
                    self.timed_out_on = Some((size, bounds));
                } else {
                    return GateTransition::Unchanged;
                }
                self.gate = ResizeGate::NotResizing;
                GateTransition::Resolved
            }
        }
    }

    /// Resolves a pending gate whose deadline has passed.
    pub(crate) fn expire_gate(&mut self, now: HostTime, size: Size, bounds: SizeBounds) -> bool {
        match self.gate {
            ResizeGate::PendingUntil(deadline) if now >= deadline => {
                self.gate = ResizeGate::NotResizing;
                self.timed_out_on = Some((size, bounds));
                true
            }
            _ => false,
        }
    }
}
