// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-cycle work-sets.
//!
//! Three stages drain depth-keyed sets ([`DepthSet`]); redraw requests live
//! on the node store's dirty channels; timers and idle callbacks live in
//! [`TimerQueue`] and a plain list.
//!
//! Scheduling is idempotent: inserting a node that is already queued is a
//! no-op. Removed nodes are purged from every set at removal time.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::Cell;
use core::fmt;

use crate::error::CallbackError;
use crate::node::NodeId;
use crate::pipeline::PipelineContext;
use crate::time::HostTime;

/// A deferred engine callback: timers, idle work, "once stable" hooks.
pub type Callback = Box<dyn FnOnce(&mut PipelineContext) -> Result<(), CallbackError>>;

/// Order in which a stage drains its set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DepthOrder {
    /// Greatest depth first (visibility, recalculation).
    DeepestFirst,
    /// Smallest depth first (position updates).
    ShallowestFirst,
}

/// A set of nodes bucketed by depth.
#[derive(Clone, Debug, Default)]
pub struct DepthSet {
    buckets: BTreeMap<u32, BTreeSet<NodeId>>,
    len: usize,
}

impl DepthSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id` at `depth`. Returns `false` if it was already present.
    pub fn insert(&mut self, depth: u32, id: NodeId) -> bool {
        let fresh = self.buckets.entry(depth).or_default().insert(id);
        if fresh {
            self.len += 1;
        }
        fresh
    }

    /// Removes `id` from the `depth` bucket. Returns `true` if it was present.
    pub fn remove(&mut self, depth: u32, id: NodeId) -> bool {
        let Some(bucket) = self.buckets.get_mut(&depth) else {
            return false;
        };
        let present = bucket.remove(&id);
        if bucket.is_empty() {
            self.buckets.remove(&depth);
        }
        if present {
            self.len -= 1;
        }
        present
    }

    /// Returns `true` if `id` is queued at `depth`.
    #[must_use]
    pub fn contains(&self, depth: u32, id: NodeId) -> bool {
        self.buckets.get(&depth).is_some_and(|b| b.contains(&id))
    }

    /// Number of queued nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if nothing is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the first queued `(depth, id)` in `order` for which `skip`
    /// returns `false`.
    ///
    /// The scan starts from the first bucket every time, so nodes inserted at
    /// any depth since the previous call are seen.
    pub fn next_candidate(
        &self,
        order: DepthOrder,
        mut skip: impl FnMut(NodeId) -> bool,
    ) -> Option<(u32, NodeId)> {
        let mut scan = |(depth, bucket): (&u32, &BTreeSet<NodeId>)| {
            bucket
                .iter()
                .find(|id| !skip(**id))
                .map(|id| (*depth, *id))
        };
        match order {
            DepthOrder::DeepestFirst => self.buckets.iter().rev().find_map(&mut scan),
            DepthOrder::ShallowestFirst => self.buckets.iter().find_map(&mut scan),
        }
    }

    /// Removes every id for which `purge` returns `true`.
    pub fn purge(&mut self, mut purge: impl FnMut(NodeId) -> bool) {
        let mut removed = 0;
        self.buckets.retain(|_, bucket| {
            let before = bucket.len();
            bucket.retain(|id| !purge(*id));
            removed += before - bucket.len();
            !bucket.is_empty()
        });
        self.len -= removed;
    }

    /// Iterates over every queued `(depth, id)`, shallowest first.
    pub fn iter(&self) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        self.buckets
            .iter()
            .flat_map(|(depth, bucket)| bucket.iter().map(move |id| (*depth, *id)))
    }
}

/// A handle to a scheduled timer. Dropping it cancels the timer.
#[must_use = "dropping a TimerToken cancels the timer"]
pub struct TimerToken {
    cancelled: Rc<Cell<bool>>,
    armed: bool,
}

impl TimerToken {
    /// Lets the timer fire even though the token is dropped.
    pub fn detach(mut self) {
        self.armed = false;
    }

    /// Cancels the timer now.
    pub fn cancel(self) {}

    /// Returns `true` if the timer has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

impl Drop for TimerToken {
    fn drop(&mut self) {
        if self.armed {
            self.cancelled.set(true);
        }
    }
}

impl fmt::Debug for TimerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerToken")
            .field("cancelled", &self.cancelled.get())
            .field("armed", &self.armed)
            .finish()
    }
}

struct TimerEntry {
    cancelled: Rc<Cell<bool>>,
    callback: Callback,
}

/// A timer taken off the queue because its deadline passed.
pub(crate) struct DueTimer(TimerEntry);

impl DueTimer {
    /// Returns the callback, unless the timer was cancelled after it was
    /// taken off the queue.
    pub(crate) fn into_callback(self) -> Option<Callback> {
        (!self.0.cancelled.get()).then_some(self.0.callback)
    }
}

/// Callbacks keyed by deadline, fired in deadline order (ties in scheduling
/// order).
#[derive(Default)]
pub struct TimerQueue {
    entries: BTreeMap<(HostTime, u64), TimerEntry>,
    next_seq: u64,
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("len", &self.entries.len())
            .field("next_deadline", &self.next_deadline())
            .finish_non_exhaustive()
    }
}

impl TimerQueue {
    /// Schedules `callback` at `deadline`.
    pub fn schedule(&mut self, deadline: HostTime, callback: Callback) -> TimerToken {
        let cancelled = Rc::new(Cell::new(false));
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            (deadline, seq),
            TimerEntry {
                cancelled: Rc::clone(&cancelled),
                callback,
            },
        );
        TimerToken {
            cancelled,
            armed: true,
        }
    }

    /// Earliest deadline of any entry, cancelled or not.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        self.entries.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Removes every entry due at or before `now`, in firing order.
    ///
    /// Cancellation is checked again when each entry runs, so a callback
    /// can still cancel a later entry of the same batch.
    pub(crate) fn take_due(&mut self, now: HostTime) -> Vec<DueTimer> {
        let mut due = Vec::new();
        while let Some(entry) = self.entries.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let entry = entry.remove();
            if !entry.cancelled.get() {
                due.push(DueTimer(entry));
            }
        }
        due
    }

    /// Number of entries, including cancelled ones not yet discarded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Every queue the pipeline drains, except redraw.
#[derive(Default)]
pub struct WorkSets {
    /// Nodes whose visibility must be re-resolved.
    pub visibility: DepthSet,
    /// Containers whose layout must be recalculated.
    pub recalculation: DepthSet,
    /// Nodes whose position must be reconciled with the screen.
    pub position: DepthSet,
    /// Deadline-ordered callbacks.
    pub timers: TimerQueue,
    /// Callbacks run when a pass leaves no work behind.
    pub idle: Vec<Callback>,
}

impl fmt::Debug for WorkSets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkSets")
            .field("visibility", &self.visibility.len())
            .field("recalculation", &self.recalculation.len())
            .field("position", &self.position.len())
            .field("timers", &self.timers)
            .field("idle", &self.idle.len())
            .finish()
    }
}

impl WorkSets {
    /// Removes every id for which `dead` returns `true` from the three
    /// depth-keyed sets.
    pub(crate) fn purge(&mut self, mut dead: impl FnMut(NodeId) -> bool) {
        self.visibility.purge(&mut dead);
        self.recalculation.purge(&mut dead);
        self.position.purge(&mut dead);
    }
}
