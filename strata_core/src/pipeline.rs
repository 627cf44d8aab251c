// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-cycle pipeline driver.
//!
//! [`PipelineContext`] owns the node store, the work-sets and every window.
//! Collaborators schedule work through it; [`pipeline_pass`] then runs the
//! fixed stage sequence:
//!
//! 1. **Visibility** (deepest first): applies requested visibility to the
//!    screen state, reports changes to widgets, and schedules the redraws a
//!    show or hide implies.
//! 2. **Recalculation** (deepest first): runs container layout managers. A
//!    recalculation that schedules an ancestor is picked up in the same pass.
//! 3. **Position** (shallowest first): reconciles each node's rectangle with
//!    where it was last drawn. Pure location changes become move candidates
//!    for the [`move_order`](crate::move_order) optimizer; everything else is
//!    redrawn.
//! 4. **Redraw**: paints every pending node, backgrounds before content and
//!    deeper before shallower within each class.
//! 5. **Flush**: hands each window its coalesced redrawn, copied and exposed
//!    rectangles, once.
//!
//! Nodes of a window whose resize gate is pending are skipped by every stage
//! and stay queued. A node is visited at most once per stage per pass; if a
//! visit re-schedules it, the new request waits for the next pass.
//!
//! [`pipeline_pass`]: PipelineContext::pipeline_pass

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Reverse;
use core::fmt;
use core::mem;

use kurbo::{Point, Rect, Size};
use tracing::{debug, debug_span, trace, warn};

use crate::config::EngineConfig;
use crate::error::{CallbackError, CallbackFailure, CallbackKind};
use crate::geometry::{self, RedrawArea};
use crate::move_order::{self, MoveCandidate};
use crate::node::{BackgroundId, DrawInfo, Drawn, LayoutSlot, NO_NODE, NodeId, NodeStore};
use crate::time::HostTime;
use crate::widget::{
    DrawCx, LayoutManager, PositionChange, RedrawPriority, Widget, WindowSurface,
};
use crate::window::{GateTransition, SizeBounds, WindowState};
use crate::workset::{Callback, DepthOrder, DepthSet, TimerToken, WorkSets};

/// Statistics of one [`PipelineContext::pipeline_pass`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Nodes visited by the visibility stage.
    pub visibility: usize,
    /// Layout managers run, including inline recalculations.
    pub recalculated: usize,
    /// Nodes visited by the position stage.
    pub positioned: usize,
    /// Nodes moved by copying pixels.
    pub moved: usize,
    /// Location-only changes that were redrawn instead.
    pub move_fallbacks: usize,
    /// Nodes painted.
    pub redrawn: usize,
    /// Rectangles handed to `flush_redrawn_areas`.
    pub flushed_rects: usize,
    /// Entries left queued because their window is resize-pending.
    pub deferred: usize,
    /// Idle callbacks run at the end of the pass.
    pub idle: usize,
    /// Callback failures since the previous pass.
    pub failures: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stage {
    Visibility,
    Recalculation,
    Position,
}

/// The engine: every node, window and queue, plus the pipeline over them.
///
/// Owned by a single thread. Collaborators receive `&mut PipelineContext` in
/// their callbacks and use it to schedule further work.
pub struct PipelineContext {
    config: EngineConfig,
    store: NodeStore,
    work: WorkSets,
    windows: BTreeMap<NodeId, WindowState>,
    now: HostTime,
    move_candidates: BTreeMap<NodeId, Vec<MoveCandidate<NodeId>>>,
    report: PassReport,
}

impl fmt::Debug for PipelineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineContext")
            .field("config", &self.config)
            .field("now", &self.now)
            .field("nodes", &self.store.live_count())
            .field("windows", &self.windows)
            .field("work", &self.work)
            .finish_non_exhaustive()
    }
}

impl Default for PipelineContext {
    fn default() -> Self {
        Self::new(EngineConfig::DEFAULT)
    }
}

impl PipelineContext {
    /// Creates an empty engine.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            store: NodeStore::new(),
            work: WorkSets::default(),
            windows: BTreeMap::new(),
            now: HostTime::default(),
            move_candidates: BTreeMap::new(),
            report: PassReport::default(),
        }
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read access to the node store.
    #[must_use]
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Read access to the work-sets.
    #[must_use]
    pub fn work(&self) -> &WorkSets {
        &self.work
    }

    /// The time the current turn is stamped with.
    #[must_use]
    pub fn now(&self) -> HostTime {
        self.now
    }

    /// Stamps the current turn. Time never goes backwards.
    pub fn set_now(&mut self, now: HostTime) {
        self.now = self.now.max(now);
    }

    /// The state of a window, if `window` is a live window root.
    #[must_use]
    pub fn window(&self, window: NodeId) -> Option<&WindowState> {
        self.windows.get(&window)
    }

    // -- Tree --

    /// Creates a window of the given size. The window starts hidden.
    pub fn create_window(
        &mut self,
        surface: Box<dyn WindowSurface>,
        size: Size,
        widget: Box<dyn Widget>,
    ) -> NodeId {
        let root = self.store.create_root(size, widget);
        self.windows.insert(
            root,
            WindowState::new(surface, self.config.exception_capacity),
        );
        debug!(window = ?root, ?size, "window created");
        root
    }

    /// Creates a hidden node as the last child of `parent`.
    ///
    /// If `parent` is a container it is scheduled for recalculation.
    ///
    /// # Panics
    ///
    /// Panics if `parent` is stale.
    pub fn create_node(&mut self, parent: NodeId, widget: Box<dyn Widget>) -> NodeId {
        let id = self.store.create_child(parent, widget);
        if self.store.is_container(parent) {
            self.schedule_recalculation(parent);
        }
        id
    }

    /// Installs the layout manager of a container and schedules it for
    /// recalculation.
    ///
    /// # Panics
    ///
    /// Panics if the node already has a layout manager (including one that is
    /// currently running), or if the handle is stale.
    pub fn install_layout_manager(&mut self, container: NodeId, layout: Box<dyn LayoutManager>) {
        self.store.validate(container);
        let slot = &mut self.store.layouts[container.idx as usize];
        assert!(
            matches!(slot, LayoutSlot::Vacant),
            "internal error: {container:?} already has a layout manager"
        );
        *slot = LayoutSlot::Installed(layout);
        self.schedule_recalculation(container);
    }

    /// Removes and returns the layout manager of a container.
    ///
    /// # Panics
    ///
    /// Panics if the node has no layout manager, if its manager is running,
    /// or if the handle is stale.
    pub fn uninstall_layout_manager(&mut self, container: NodeId) -> Box<dyn LayoutManager> {
        self.store.validate(container);
        let slot = &mut self.store.layouts[container.idx as usize];
        match mem::replace(slot, LayoutSlot::Vacant) {
            LayoutSlot::Installed(layout) => layout,
            LayoutSlot::Vacant => {
                panic!("internal error: {container:?} has no layout manager to uninstall")
            }
            LayoutSlot::Running => {
                panic!("internal error: layout manager of {container:?} is running")
            }
        }
    }

    /// Removes a node and its whole subtree.
    ///
    /// The removal is synchronous: every handle into the subtree becomes
    /// stale, and no removed node is visited by any stage afterwards. The
    /// area the subtree occupied is redrawn in the parent, and a container
    /// parent is scheduled for recalculation. Removing a window root drops
    /// the window. Removing an already removed node does nothing.
    pub fn remove_node(&mut self, id: NodeId) {
        if !self.store.is_alive(id) {
            trace!(node = ?id, "remove of stale node ignored");
            return;
        }
        let idx = id.idx;
        let parent = self.store.parent[idx as usize];
        if parent != NO_NODE {
            if let Some(old) = self.store.drawn[idx as usize] {
                self.vacate(parent, old.location, &[]);
            }
            let parent_id = self.store.id_at(parent);
            if self.store.is_container(parent_id) {
                self.schedule_recalculation(parent_id);
            }
        }
        let removed = self.store.remove_subtree(id);
        let store = &self.store;
        self.work.purge(|n| !store.is_alive(n));
        for window in self.windows.values_mut() {
            window
                .deferred_redraws
                .retain(|(n, _)| store.is_alive(*n));
        }
        self.move_candidates.remove(&id);
        if parent == NO_NODE {
            self.windows.remove(&id);
            debug!(window = ?id, "window removed");
        }
        trace!(node = ?id, count = removed.len(), "subtree removed");
        drop(removed);
    }

    // -- Visibility --

    /// Requests that `id` be shown or hidden, and schedules it.
    pub fn schedule_for_visibility(&mut self, id: NodeId, visible: bool) {
        if !self.store.is_alive(id) {
            return;
        }
        self.store.flags[id.idx as usize].requested_visible = visible;
        self.refresh_inherited(id.idx);
        self.insert_work(Stage::Visibility, id);
    }

    /// Schedules `id` to have its visibility re-resolved without changing
    /// the request.
    pub fn schedule_update_visibility(&mut self, id: NodeId) {
        if !self.store.is_alive(id) {
            return;
        }
        self.refresh_inherited(id.idx);
        self.insert_work(Stage::Visibility, id);
    }

    /// Requests that `id` and every descendant be shown.
    pub fn show_all(&mut self, id: NodeId) {
        if !self.store.is_alive(id) {
            return;
        }
        for i in self.store.subtree_indices(id.idx) {
            self.store.flags[i as usize].requested_visible = true;
        }
        self.refresh_inherited(id.idx);
        self.insert_work(Stage::Visibility, id);
    }

    /// Returns the logical visibility of `id`: requested on it and on every
    /// ancestor. Stale handles are not visible.
    #[must_use]
    pub fn is_visible(&self, id: NodeId) -> bool {
        self.store.is_alive(id) && self.store.flags[id.idx as usize].inherited_visible
    }

    fn refresh_inherited(&mut self, idx: u32) {
        for i in self.store.subtree_indices(idx) {
            let p = self.store.parent[i as usize];
            let parent_visible = p == NO_NODE || self.store.flags[p as usize].inherited_visible;
            let flags = &mut self.store.flags[i as usize];
            flags.inherited_visible = flags.requested_visible && parent_visible;
        }
    }

    // -- Recalculation and position --

    /// Schedules a container's layout manager to run.
    pub fn schedule_recalculation(&mut self, id: NodeId) {
        if self.store.is_alive(id) {
            self.insert_work(Stage::Recalculation, id);
        }
    }

    /// Sets the rectangle of `id` relative to its parent and schedules it
    /// for a position update. Setting the current rectangle again does
    /// nothing.
    pub fn set_position(&mut self, id: NodeId, rect: Rect) {
        if !self.store.is_alive(id) || self.store.rect[id.idx as usize] == rect {
            return;
        }
        self.store.set_rect(id.idx, rect);
        self.insert_work(Stage::Position, id);
    }

    /// Schedules `id` for a position update.
    pub fn schedule_position(&mut self, id: NodeId) {
        if self.store.is_alive(id) {
            self.insert_work(Stage::Position, id);
        }
    }

    /// Declares the sizes `id` can be laid out at.
    ///
    /// On a window root the bounds drive the resize gate; on any other node
    /// the parent is scheduled for recalculation.
    pub fn set_size_bounds(&mut self, id: NodeId, bounds: SizeBounds) {
        if !self.store.is_alive(id) {
            return;
        }
        self.store.bounds[id.idx as usize] = bounds;
        match self.store.parent(id) {
            None => self.check_gate(id),
            Some(parent) => self.schedule_recalculation(parent),
        }
    }

    // -- Redraw --

    /// Schedules the entire area of `id` for redraw.
    pub fn schedule_full_redraw(&mut self, id: NodeId) {
        if self.store.is_alive(id) {
            self.store.mark_redraw(id.idx, RedrawArea::Entire);
        }
    }

    /// Schedules `rect` (relative to the node's origin) for redraw.
    pub fn schedule_redraw(&mut self, id: NodeId, rect: Rect) {
        if self.store.is_alive(id) {
            self.store.mark_redraw(id.idx, RedrawArea::Rects(vec![rect]));
        }
    }

    /// Schedules `id` and every descendant for a full redraw.
    pub fn schedule_redraw_recursively(&mut self, id: NodeId) {
        if self.store.is_alive(id) {
            self.store.mark_redraw_tree(id.idx);
        }
    }

    /// Sets the background of `id`, inherited by descendants that set none,
    /// and schedules the subtree for redraw.
    pub fn set_background(&mut self, id: NodeId, background: Option<BackgroundId>) {
        if !self.store.is_alive(id) {
            return;
        }
        self.store.set_background(id.idx, background);
        self.schedule_redraw_recursively(id);
    }

    /// Returns the cached geometry of `id`, recomputing it if needed.
    ///
    /// # Panics
    ///
    /// Panics if the handle is stale.
    pub fn draw_info(&mut self, id: NodeId) -> DrawInfo {
        self.store.draw_info(id)
    }

    // -- Windows --

    /// Records a size notification from the window manager.
    ///
    /// Schedules the root for a position update and recalculation if the
    /// size changed, and re-checks the resize gate either way.
    ///
    /// # Panics
    ///
    /// Panics if `window` is not a window root.
    pub fn configure_window(&mut self, window: NodeId, size: Size) {
        if !self.store.is_alive(window) {
            return;
        }
        assert!(
            self.windows.contains_key(&window),
            "internal error: {window:?} is not a window"
        );
        let rect = Rect::from_origin_size(Point::ZERO, size);
        if self.store.rect[window.idx as usize] != rect {
            self.store.set_rect(window.idx, rect);
            self.insert_work(Stage::Position, window);
            self.insert_work(Stage::Recalculation, window);
        }
        self.check_gate(window);
    }

    /// Records an area of the window that must be re-flushed from the
    /// backing raster.
    pub fn expose(&mut self, window: NodeId, rect: Rect) {
        if let Some(state) = self.windows.get_mut(&window) {
            state.exposures.push(rect);
        }
    }

    /// Runs `callback` once the window's resize gate is not pending:
    /// immediately if it already is not, otherwise when it resolves.
    pub fn on_stable(
        &mut self,
        window: NodeId,
        callback: impl FnOnce(&mut Self) -> Result<(), CallbackError> + 'static,
    ) {
        let Some(state) = self.windows.get_mut(&window) else {
            return;
        };
        if state.is_deferred(self.now) {
            state.stable_callbacks.push(Box::new(callback));
        } else if state.deadline().is_some() {
            // Timed out but not yet resolved: resolve now, keeping the order
            // of callbacks that were already waiting.
            state.stable_callbacks.push(Box::new(callback));
            self.expire_gates();
        } else {
            self.run_callback(window, Box::new(callback));
        }
    }

    /// Drains the failures recorded on a window's exception channel.
    pub fn take_exceptions(&mut self, window: NodeId) -> Vec<CallbackFailure> {
        self.windows
            .get_mut(&window)
            .map(|state| state.exceptions.drain())
            .unwrap_or_default()
    }

    /// Returns `true` if the nodes of `id`'s window are being skipped.
    #[must_use]
    pub fn is_deferred(&self, id: NodeId) -> bool {
        if !self.store.is_alive(id) {
            return false;
        }
        let window = self.store.id_at(self.store.root[id.idx as usize]);
        self.windows
            .get(&window)
            .is_some_and(|state| state.is_deferred(self.now))
    }

    fn check_gate(&mut self, window: NodeId) {
        let i = window.idx as usize;
        let size = self.store.rect[i].size();
        let bounds = self.store.bounds[i];
        let out_of_bounds = self.store.flags[i].inherited_visible && !bounds.contains(size);
        let Some(state) = self.windows.get_mut(&window) else {
            return;
        };
        match state.check_gate(
            self.now,
            self.config.resize_timeout,
            size,
            bounds,
            out_of_bounds,
        ) {
            GateTransition::Unchanged => {}
            GateTransition::Started => {
                debug!(?window, ?size, deadline = ?state.deadline(), "resize gate pending");
            }
            GateTransition::Resolved => {
                debug!(?window, ?size, "resize gate resolved");
                self.gate_resolved(window);
            }
        }
    }

    fn expire_gates(&mut self) {
        let now = self.now;
        let expired: Vec<NodeId> = self
            .windows
            .iter_mut()
            .filter_map(|(window, state)| {
                let i = window.idx as usize;
                state
                    .expire_gate(now, self.store.rect[i].size(), self.store.bounds[i])
                    .then_some(*window)
            })
            .collect();
        for window in expired {
            debug!(?window, "resize gate timed out");
            self.gate_resolved(window);
        }
    }

    fn gate_resolved(&mut self, window: NodeId) {
        let Some(state) = self.windows.get_mut(&window) else {
            return;
        };
        let redraws = mem::take(&mut state.deferred_redraws);
        let callbacks = mem::take(&mut state.stable_callbacks);
        for (id, area) in redraws {
            if self.store.is_alive(id) {
                self.store.mark_redraw(id.idx, area);
            }
        }
        for callback in callbacks {
            self.run_callback(window, callback);
        }
    }

    // -- Timers and idle --

    /// Schedules `callback` to run at `deadline`. Dropping the returned
    /// token cancels it.
    pub fn schedule_timer(
        &mut self,
        deadline: HostTime,
        callback: impl FnOnce(&mut Self) -> Result<(), CallbackError> + 'static,
    ) -> TimerToken {
        self.work.timers.schedule(deadline, Box::new(callback))
    }

    /// Schedules `callback` after the configured hover delay.
    pub fn schedule_hover_action(
        &mut self,
        callback: impl FnOnce(&mut Self) -> Result<(), CallbackError> + 'static,
    ) -> TimerToken {
        let deadline = self.now + self.config.hover_delay;
        self.schedule_timer(deadline, callback)
    }

    /// Schedules `callback` to run at the end of the next pass that leaves
    /// no work queued.
    pub fn schedule_idle(
        &mut self,
        callback: impl FnOnce(&mut Self) -> Result<(), CallbackError> + 'static,
    ) {
        self.work.idle.push(Box::new(callback));
    }

    /// Runs every timer due at the current time and returns how many ran.
    ///
    /// Timers scheduled by these callbacks wait for the next call, even if
    /// already due.
    pub fn run_timers(&mut self) -> usize {
        let due = self.work.timers.take_due(self.now);
        let mut fired = 0;
        for timer in due {
            let Some(callback) = timer.into_callback() else {
                continue;
            };
            fired += 1;
            if let Err(error) = callback(self) {
                warn!(%error, "timer callback failed");
                self.report.failures += 1;
            }
        }
        fired
    }

    /// The earliest time the engine has something to do without outside
    /// input: the nearest timer or resize-gate deadline.
    #[must_use]
    pub fn next_deadline(&self) -> Option<HostTime> {
        let gates = self.windows.values().filter_map(WindowState::deadline);
        self.work.timers.next_deadline().into_iter().chain(gates).min()
    }

    /// Returns `true` if a pass would have work to do right now.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        let live = |set: &DepthSet| set.iter().any(|(_, id)| !self.is_deferred(id));
        self.store.has_pending_redraw()
            || live(&self.work.visibility)
            || live(&self.work.recalculation)
            || live(&self.work.position)
            || self.windows.iter().any(|(_, state)| {
                !state.is_deferred(self.now)
                    && (!state.flush.is_empty() || !state.exposures.is_empty())
            })
    }

    // -- The pass --

    /// Runs one full pipeline pass.
    pub fn pipeline_pass(&mut self) -> PassReport {
        let _span = debug_span!("pipeline_pass", now = self.now.ticks()).entered();
        self.expire_gates();
        self.visibility_stage();
        self.recalculation_stage();
        self.position_stage();
        self.redraw_stage();
        self.flush_stage();

        let deferred_in = |set: &DepthSet| set.iter().filter(|(_, id)| self.is_deferred(*id)).count();
        let deferred = deferred_in(&self.work.visibility)
            + deferred_in(&self.work.recalculation)
            + deferred_in(&self.work.position);
        self.report.deferred += deferred;

        if !self.has_pending_work() && !self.work.idle.is_empty() {
            for callback in mem::take(&mut self.work.idle) {
                self.report.idle += 1;
                if let Err(error) = callback(self) {
                    warn!(%error, "idle callback failed");
                    self.report.failures += 1;
                }
            }
        }

        let report = mem::take(&mut self.report);
        debug!(?report, "pipeline pass complete");
        report
    }

    fn visibility_stage(&mut self) {
        let _span = debug_span!("visibility").entered();
        self.drain(Stage::Visibility, DepthOrder::DeepestFirst, Self::visit_visibility);
    }

    fn recalculation_stage(&mut self) {
        let _span = debug_span!("recalculation").entered();
        self.drain(Stage::Recalculation, DepthOrder::DeepestFirst, Self::recalculate_now);
    }

    fn position_stage(&mut self) {
        let _span = debug_span!("position").entered();
        self.drain(Stage::Position, DepthOrder::ShallowestFirst, Self::visit_position);
        for (window, candidates) in mem::take(&mut self.move_candidates) {
            self.execute_moves(window, candidates);
        }
    }

    /// Drains one depth-keyed set, visiting each node at most once.
    fn drain(&mut self, stage: Stage, order: DepthOrder, mut visit: impl FnMut(&mut Self, NodeId)) {
        let mut visited = BTreeSet::new();
        loop {
            let next = self
                .set(stage)
                .next_candidate(order, |id| visited.contains(&id) || self.is_deferred(id));
            let Some((depth, id)) = next else {
                break;
            };
            self.set_mut(stage).remove(depth, id);
            visited.insert(id);
            if !self.store.is_alive(id) {
                continue;
            }
            self.ensure_initialized(id);
            if self.store.is_alive(id) {
                visit(self, id);
            }
        }
    }

    fn visit_visibility(&mut self, id: NodeId) {
        self.report.visibility += 1;
        let idx = id.idx;
        let was_visible = self.store.flags[idx as usize].actually_visible;
        let now_visible = self.store.flags[idx as usize].inherited_visible;
        let old_drawn = self.store.drawn[idx as usize].map(|d| d.location);

        let mut changed = Vec::new();
        for i in self.store.subtree_indices(idx) {
            let flags = &mut self.store.flags[i as usize];
            if flags.actually_visible != flags.inherited_visible {
                flags.actually_visible = flags.inherited_visible;
                if !flags.actually_visible {
                    self.store.drawn[i as usize] = None;
                }
                changed.push(i);
            }
        }
        if changed.is_empty() {
            return;
        }
        self.store.invalidate_draw_info(idx);

        for i in changed {
            let flags = &mut self.store.flags[i as usize];
            if flags.reported_visible == flags.actually_visible {
                continue;
            }
            let visible = flags.actually_visible;
            flags.reported_visible = visible;
            let node = self.store.id_at(i);
            self.ensure_initialized(node);
            self.with_widget(node, CallbackKind::Visibility, |w, cx| {
                w.visibility_changed(cx, node, visible)
            });
            if !self.store.is_alive(id) {
                return;
            }
        }

        if was_visible != now_visible {
            trace!(node = ?id, visible = now_visible, "visibility applied");
            if now_visible {
                self.schedule_redraw_recursively(id);
            } else if let Some(old) = old_drawn {
                let parent = self.store.parent[idx as usize];
                if parent != NO_NODE {
                    self.vacate(parent, old, &[]);
                }
            }
            if self.store.parent[idx as usize] == NO_NODE {
                self.check_gate(id);
            }
        }
    }

    fn recalculate_now(&mut self, id: NodeId) {
        let Some(mut layout) = self.store.take_layout(id) else {
            return;
        };
        self.report.recalculated += 1;
        let window = self.store.window_of(id);
        let result = layout.recalculate(self, id);
        self.store.restore_layout(id, layout);
        if let Err(error) = result {
            self.report_failure(id, window, CallbackKind::Recalculate, error);
        }
    }

    fn visit_position(&mut self, id: NodeId) {
        self.report.positioned += 1;
        let idx = id.idx;
        let rect = self.store.rect[idx as usize];
        let info = self.store.draw_info_at(idx);
        let new_abs = info.absolute_location;
        let old = self.store.drawn[idx as usize];

        if !self.store.flags[idx as usize].actually_visible {
            self.with_widget(id, CallbackKind::Position, |w, cx| {
                w.process_updated_position(cx, id, rect)
            });
            return;
        }

        let Some(old) = old else {
            self.store.drawn[idx as usize] = Some(Drawn::from_info(&info));
            self.with_widget(id, CallbackKind::Position, |w, cx| {
                w.process_updated_position(cx, id, rect)?;
                w.redraw_after_position(cx, id, PositionChange::Placed)
            });
            return;
        };

        // Pixels outside the old viewport were never painted by this node.
        let copyable = old.is_complete();
        let old = old.location;
        if old == new_abs {
            self.with_widget(id, CallbackKind::Position, |w, cx| {
                w.process_same_position(cx, id, rect)
            });
            return;
        }

        let origin_moved = old.origin() != new_abs.origin();
        if origin_moved {
            // Pixels of descendants are no longer where they were drawn.
            for i in self.store.subtree_indices(idx).into_iter().skip(1) {
                self.store.drawn[i as usize] = None;
            }
        }

        self.with_widget(id, CallbackKind::Position, |w, cx| {
            w.process_updated_position(cx, id, rect)
        });
        if !self.store.is_alive(id) {
            return;
        }

        if old.size() != new_abs.size() {
            self.store.drawn[idx as usize] = Some(Drawn::from_info(&info));
            self.recalculate_now(id);
            self.with_widget(id, CallbackKind::Position, |w, cx| {
                w.redraw_after_position(cx, id, PositionChange::Resized { origin_moved })
            });
            let parent = self.store.parent[idx as usize];
            if parent != NO_NODE {
                self.vacate(parent, old, &[new_abs]);
            }
            return;
        }

        let movable = self.config.move_with_contents
            && copyable
            && self.store.widgets[idx as usize]
                .as_ref()
                .is_none_or(|w| w.can_be_moved());
        if movable {
            let window = self.store.window_of(id);
            trace!(node = ?id, ?old, ?new_abs, "move candidate");
            self.move_candidates
                .entry(window)
                .or_default()
                .push(MoveCandidate::new(id, old, new_abs.origin()));
        } else {
            self.fall_back_to_redraw(id, old, new_abs);
        }
    }

    fn execute_moves(&mut self, window: NodeId, candidates: Vec<MoveCandidate<NodeId>>) {
        if !self.windows.contains_key(&window) {
            return;
        }
        let window_rect = self.store.rect[window.idx as usize].with_origin(Point::ZERO);

        let mut valid = Vec::with_capacity(candidates.len());
        for c in candidates {
            if !self.store.is_alive(c.key) {
                continue;
            }
            let info = self.store.draw_info_at(c.key.idx);
            let representable = geometry::contains(window_rect, c.source)
                && geometry::contains(window_rect, c.dest_rect())
                && info.is_unclipped();
            if representable {
                valid.push(c);
            } else {
                self.fall_back_to_redraw(c.key, c.source, c.dest_rect());
            }
        }

        let plan = move_order::plan_moves(valid);
        debug!(
            ?window,
            direction = ?plan.direction,
            moves = plan.moves.len(),
            fallback = plan.fallback.len(),
            "move plan"
        );
        let destinations: Vec<Rect> = plan.moves.iter().map(MoveCandidate::dest_rect).collect();

        for m in &plan.moves {
            let id = m.key;
            let to = m.dest_rect();
            self.with_widget(id, CallbackKind::Move, |w, cx| {
                w.contents_moved(cx, id, m.source, to)
            });
            if !self.store.is_alive(id) {
                continue;
            }
            let Some(state) = self.windows.get_mut(&window) else {
                return;
            };
            trace!(node = ?id, from = ?m.source, ?to, "copy");
            state.surface.copy_configured(m.source, m.dest);
            state.flush.push(to);
            let info = self.store.draw_info_at(id.idx);
            self.store.drawn[id.idx as usize] = Some(Drawn::from_info(&info));
            self.report.moved += 1;
            let children: Vec<NodeId> = self.store.children(id).collect();
            for child in children {
                self.schedule_redraw_recursively(child);
            }
        }
        for m in &plan.moves {
            let parent = self.store.parent[m.key.idx as usize];
            if self.store.is_alive(m.key) && parent != NO_NODE {
                self.vacate(parent, m.source, &destinations);
            }
        }
        for f in plan.fallback {
            if self.store.is_alive(f.key) {
                self.fall_back_to_redraw(f.key, f.source, f.dest_rect());
            }
        }
    }

    fn fall_back_to_redraw(&mut self, id: NodeId, old: Rect, new_abs: Rect) {
        self.report.move_fallbacks += 1;
        let info = self.store.draw_info_at(id.idx);
        self.store.drawn[id.idx as usize] = Some(Drawn::from_info(&info));
        self.with_widget(id, CallbackKind::Position, |w, cx| {
            w.redraw_after_position(cx, id, PositionChange::Moved)
        });
        let parent = self.store.parent[id.idx as usize];
        if self.store.is_alive(id) && parent != NO_NODE {
            self.vacate(parent, old, &[new_abs]);
        }
    }

    /// Schedules the parts of `old` (absolute) not covered by `kept` for
    /// redraw in `parent`.
    fn vacate(&mut self, parent: u32, old: Rect, kept: &[Rect]) {
        let mut pieces = vec![old];
        for k in kept {
            pieces = pieces
                .into_iter()
                .flat_map(|p| geometry::subtract(p, *k))
                .collect();
        }
        if pieces.is_empty() {
            return;
        }
        let origin = self.store.draw_info_at(parent).absolute_location.origin();
        let local: Vec<Rect> = pieces
            .into_iter()
            .map(|p| p - origin.to_vec2())
            .collect();
        self.store.mark_redraw(parent, RedrawArea::Rects(local));
    }

    fn redraw_stage(&mut self) {
        let _span = debug_span!("redraw").entered();
        let pending = self.store.take_redraw_set();

        let mut queue = Vec::with_capacity(pending.len());
        for (idx, area) in pending {
            let id = self.store.id_at(idx);
            let window = self.store.id_at(self.store.root[idx as usize]);
            if let Some(state) = self.windows.get_mut(&window)
                && state.is_deferred(self.now)
            {
                state.deferred_redraws.push((id, area));
                self.report.deferred += 1;
                continue;
            }
            if !self.store.flags[idx as usize].actually_visible {
                continue;
            }
            self.ensure_initialized(id);
            let Some(widget) = self.store.widgets[idx as usize].as_ref() else {
                continue;
            };
            let priority = widget.redraw_priority();
            queue.push((priority, Reverse(self.store.depth[idx as usize]), id, window, area));
        }
        queue.sort_by_key(|(priority, depth, id, _, _)| (*priority, *depth, *id));

        for (priority, _, id, window, area) in queue {
            if !self.store.is_alive(id) {
                continue;
            }
            let info = self.store.draw_info_at(id.idx);
            let rects = area.resolve(info.absolute_location, info.viewport);
            if rects.is_empty() {
                continue;
            }
            let Some(state) = self.windows.get_mut(&window) else {
                continue;
            };
            let Some(mut widget) = self.store.widgets[id.idx as usize].take() else {
                continue;
            };
            if priority == RedrawPriority::Background {
                for r in &rects {
                    state.surface.clear(*r, info.background);
                }
            }
            let result = {
                let mut dcx = DrawCx::new(id, info, state.surface.as_mut());
                widget.draw(&mut dcx, &rects)
            };
            state.flush.extend_from_slice(&rects);
            self.store.restore_widget(id, widget);
            if area == RedrawArea::Entire {
                self.store.drawn[id.idx as usize] = Some(Drawn::from_info(&info));
            }
            self.report.redrawn += 1;
            if let Err(error) = result {
                self.report_failure(id, window, CallbackKind::Draw, error);
            }
        }
    }

    fn flush_stage(&mut self) {
        let _span = debug_span!("flush").entered();
        let now = self.now;
        for (window, state) in &mut self.windows {
            if state.is_deferred(now) {
                continue;
            }
            let mut rects = mem::take(&mut state.flush);
            rects.append(&mut state.exposures);
            geometry::coalesce(&mut rects);
            if rects.is_empty() {
                continue;
            }
            trace!(?window, count = rects.len(), "flush");
            state.surface.flush_redrawn_areas(&rects);
            self.report.flushed_rects += rects.len();
        }
    }

    // -- Callback plumbing --

    fn ensure_initialized(&mut self, id: NodeId) {
        let flags = &mut self.store.flags[id.idx as usize];
        if flags.initialized {
            return;
        }
        flags.initialized = true;
        self.with_widget(id, CallbackKind::Initialize, |w, cx| w.initialize(cx, id));
    }

    /// Calls into the widget of `id` with the widget taken out of its slot.
    fn with_widget(
        &mut self,
        id: NodeId,
        kind: CallbackKind,
        f: impl FnOnce(&mut dyn Widget, &mut Self) -> Result<(), CallbackError>,
    ) {
        if !self.store.is_alive(id) {
            return;
        }
        let window = self.store.window_of(id);
        let Some(mut widget) = self.store.take_widget(id) else {
            // Already inside one of this widget's callbacks.
            return;
        };
        let result = f(widget.as_mut(), self);
        self.store.restore_widget(id, widget);
        if let Err(error) = result {
            self.report_failure(id, window, kind, error);
        }
    }

    fn run_callback(&mut self, window: NodeId, callback: Callback) {
        if let Err(error) = callback(self) {
            self.report_failure(window, window, CallbackKind::Scheduled, error);
        }
    }

    fn report_failure(
        &mut self,
        node: NodeId,
        window: NodeId,
        kind: CallbackKind,
        error: CallbackError,
    ) {
        warn!(?node, ?kind, %error, "callback failed");
        self.report.failures += 1;
        if let Some(state) = self.windows.get_mut(&window) {
            state.exceptions.record(CallbackFailure { node, kind, error });
        }
    }

    // -- Work-set helpers --

    fn set(&self, stage: Stage) -> &DepthSet {
        match stage {
            Stage::Visibility => &self.work.visibility,
            Stage::Recalculation => &self.work.recalculation,
            Stage::Position => &self.work.position,
        }
    }

    fn set_mut(&mut self, stage: Stage) -> &mut DepthSet {
        match stage {
            Stage::Visibility => &mut self.work.visibility,
            Stage::Recalculation => &mut self.work.recalculation,
            Stage::Position => &mut self.work.position,
        }
    }

    fn insert_work(&mut self, stage: Stage, id: NodeId) {
        let depth = self.store.depth[id.idx as usize];
        if self.set_mut(stage).insert(depth, id) {
            trace!(node = ?id, ?stage, depth, "scheduled");
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::string::String;
    use core::cell::RefCell;

    use super::*;
    use crate::geometry::rect;
    use crate::test_util::{
        EventLog, Inert, ProbeLayout, ProbeWidget, RecordingSurface, SurfaceLog, take_events,
    };
    use crate::time::Duration;

    fn shown_window(
        cx: &mut PipelineContext,
        width: f64,
        height: f64,
    ) -> (NodeId, Rc<RefCell<SurfaceLog>>) {
        let (surface, log) = RecordingSurface::new();
        let root = cx.create_window(surface, Size::new(width, height), Box::new(Inert));
        cx.schedule_for_visibility(root, true);
        (root, log)
    }

    fn probe(
        cx: &mut PipelineContext,
        parent: NodeId,
        name: &'static str,
        events: &EventLog,
        at: Rect,
    ) -> NodeId {
        let id = cx.create_node(parent, ProbeWidget::new(name, events).boxed());
        cx.set_position(id, at);
        id
    }

    fn draws(events: &[String]) -> Vec<&str> {
        events
            .iter()
            .filter(|e| e.ends_with(":draw"))
            .map(String::as_str)
            .collect()
    }

    #[test]
    fn stages_drain_in_their_depth_order() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 100.0, 100.0);
        let b = cx.create_node(root, ProbeWidget::new("b", &events).boxed());
        let a = cx.create_node(b, ProbeWidget::new("a", &events).boxed());
        cx.schedule_for_visibility(b, true);
        cx.schedule_for_visibility(a, true);
        let _ = cx.pipeline_pass();
        assert_eq!(
            take_events(&events),
            ["a:init", "a:shown", "b:init", "b:shown"],
            "visibility is deepest first"
        );

        cx.install_layout_manager(b, Box::new(ProbeLayout::new("lb", &events)));
        cx.install_layout_manager(a, Box::new(ProbeLayout::new("la", &events)));
        let report = cx.pipeline_pass();
        assert_eq!(
            take_events(&events),
            ["la:recalc", "lb:recalc"],
            "recalculation is deepest first"
        );
        assert_eq!(report.recalculated, 2);

        cx.set_position(a, rect(0.0, 0.0, 10.0, 10.0));
        cx.set_position(b, rect(0.0, 0.0, 50.0, 50.0));
        let _ = cx.pipeline_pass();
        assert_eq!(
            take_events(&events),
            ["b:position", "a:position", "a:draw", "b:draw"],
            "position is shallowest first"
        );
    }

    #[test]
    fn uniform_shift_is_copied_furthest_first() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 20.0);
        let panel = cx.create_node(root, Box::new(Inert));
        let inner = cx.create_node(panel, Box::new(Inert));
        cx.set_position(panel, rect(0.0, 0.0, 100.0, 20.0));
        cx.set_position(inner, rect(0.0, 0.0, 100.0, 20.0));
        let first = probe(&mut cx, inner, "first", &events, rect(0.0, 0.0, 10.0, 10.0));
        let second = probe(&mut cx, inner, "second", &events, rect(20.0, 0.0, 10.0, 10.0));
        let third = probe(&mut cx, inner, "third", &events, rect(40.0, 0.0, 10.0, 10.0));
        assert_eq!(cx.store().depth(third), 3);
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        let _ = take_events(&events);
        *surface.borrow_mut() = SurfaceLog::default();

        cx.set_position(first, rect(10.0, 0.0, 10.0, 10.0));
        cx.set_position(second, rect(30.0, 0.0, 10.0, 10.0));
        cx.set_position(third, rect(50.0, 0.0, 10.0, 10.0));
        let report = cx.pipeline_pass();

        assert_eq!(report.moved, 3);
        assert_eq!(report.move_fallbacks, 0);
        let log = surface.borrow();
        assert_eq!(
            log.copies,
            [
                (rect(40.0, 0.0, 10.0, 10.0), Point::new(50.0, 0.0)),
                (rect(20.0, 0.0, 10.0, 10.0), Point::new(30.0, 0.0)),
                (rect(0.0, 0.0, 10.0, 10.0), Point::new(10.0, 0.0)),
            ]
        );
        let events = take_events(&events);
        let moved: Vec<&str> = events
            .iter()
            .filter(|e| e.ends_with(":moved"))
            .map(String::as_str)
            .collect();
        assert_eq!(moved, ["third:moved", "second:moved", "first:moved"]);
        assert!(draws(&events).is_empty(), "copied widgets are not repainted");
        assert_eq!(
            log.flushes,
            [vec![rect(0.0, 0.0, 60.0, 10.0)]],
            "copies and vacated strips flush as one rectangle"
        );
        assert_eq!(cx.store().drawn_rect(third), Some(rect(50.0, 0.0, 10.0, 10.0)));
    }

    #[test]
    fn moved_container_repaints_its_children_in_the_same_pass() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let frame = probe(&mut cx, root, "frame", &events, rect(0.0, 0.0, 20.0, 20.0));
        let leaf = probe(&mut cx, frame, "leaf", &events, rect(5.0, 5.0, 10.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        let _ = take_events(&events);
        *surface.borrow_mut() = SurfaceLog::default();

        cx.set_position(frame, rect(50.0, 0.0, 20.0, 20.0));
        let report = cx.pipeline_pass();

        assert_eq!(report.moved, 1);
        assert_eq!(
            surface.borrow().copies,
            [(rect(0.0, 0.0, 20.0, 20.0), Point::new(50.0, 0.0))]
        );
        let events = take_events(&events);
        assert!(events.contains(&String::from("frame:moved")));
        assert_eq!(draws(&events), ["leaf:draw"], "the copy itself is not repainted");
        assert_eq!(cx.store().drawn_rect(frame), Some(rect(50.0, 0.0, 20.0, 20.0)));
        assert_eq!(cx.store().drawn_rect(leaf), Some(rect(55.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn widget_drawn_partly_clipped_is_redrawn_not_copied() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let panel = cx.create_node(root, Box::new(Inert));
        cx.set_position(panel, rect(0.0, 0.0, 50.0, 50.0));
        let child = probe(&mut cx, panel, "child", &events, rect(40.0, 0.0, 20.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        assert_eq!(draws(&take_events(&events)), ["child:draw"]);
        *surface.borrow_mut() = SurfaceLog::default();

        cx.set_position(child, rect(10.0, 0.0, 20.0, 10.0));
        let report = cx.pipeline_pass();

        assert_eq!(report.moved, 0);
        assert_eq!(report.move_fallbacks, 1);
        assert!(surface.borrow().copies.is_empty(), "x=50..60 was never painted");
        assert_eq!(draws(&take_events(&events)), ["child:draw"]);
        assert_eq!(cx.store().drawn_rect(child), Some(rect(10.0, 0.0, 20.0, 10.0)));

        cx.set_position(child, rect(20.0, 0.0, 20.0, 10.0));
        let report = cx.pipeline_pass();
        assert_eq!(report.moved, 1, "an unclipped drawing can be copied again");
    }

    #[test]
    fn immovable_widget_is_redrawn_instead() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let pinned = cx.create_node(root, ProbeWidget::new("pinned", &events).immovable().boxed());
        cx.set_position(pinned, rect(0.0, 0.0, 10.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        let _ = take_events(&events);

        cx.set_position(pinned, rect(30.0, 0.0, 10.0, 10.0));
        let report = cx.pipeline_pass();
        assert_eq!(report.moved, 0);
        assert_eq!(report.move_fallbacks, 1);
        assert!(surface.borrow().copies.is_empty());
        assert_eq!(take_events(&events), ["pinned:position", "pinned:draw"]);
    }

    #[test]
    fn disabling_move_with_contents_redraws_every_move() {
        let events = EventLog::default();
        let config = EngineConfig {
            move_with_contents: false,
            ..EngineConfig::headless()
        };
        let mut cx = PipelineContext::new(config);
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let w = probe(&mut cx, root, "w", &events, rect(0.0, 0.0, 10.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        cx.set_position(w, rect(0.0, 30.0, 10.0, 10.0));
        let report = cx.pipeline_pass();
        assert_eq!(report.move_fallbacks, 1);
        assert!(surface.borrow().copies.is_empty());
    }

    #[test]
    fn failing_draw_is_reported_and_others_still_paint() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 100.0, 100.0);
        let bad = cx.create_node(root, ProbeWidget::new("bad", &events).failing_draw().boxed());
        cx.set_position(bad, rect(0.0, 0.0, 10.0, 10.0));
        let _good = probe(&mut cx, root, "good", &events, rect(20.0, 0.0, 10.0, 10.0));
        cx.show_all(root);

        let report = cx.pipeline_pass();
        assert_eq!(report.failures, 1);
        let events = take_events(&events);
        assert!(draws(&events).contains(&"good:draw"));
        assert_eq!(
            cx.take_exceptions(root),
            [CallbackFailure {
                node: bad,
                kind: CallbackKind::Draw,
                error: CallbackError::new("bad refused to draw"),
            }]
        );
        assert!(cx.take_exceptions(root).is_empty(), "channel drained");
    }

    #[test]
    fn backgrounds_paint_before_content_and_deeper_first() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let panel = cx.create_node(
            root,
            ProbeWidget::new("panel", &events)
                .with_priority(RedrawPriority::Background)
                .boxed(),
        );
        cx.set_position(panel, rect(0.0, 0.0, 50.0, 50.0));
        let _label = probe(&mut cx, panel, "label", &events, rect(5.0, 5.0, 10.0, 10.0));
        let backdrop = cx.create_node(
            panel,
            ProbeWidget::new("backdrop", &events)
                .with_priority(RedrawPriority::Background)
                .boxed(),
        );
        cx.set_position(backdrop, rect(0.0, 0.0, 50.0, 50.0));
        cx.show_all(root);

        let _ = cx.pipeline_pass();
        let events = take_events(&events);
        assert_eq!(draws(&events), ["backdrop:draw", "panel:draw", "label:draw"]);
        assert_eq!(surface.borrow().clears.len(), 2, "only background widgets clear");
    }

    #[test]
    fn resize_pending_window_is_deferred_until_the_gate_expires() {
        let events = EventLog::default();
        let config = EngineConfig {
            resize_timeout: Duration(100),
            ..EngineConfig::headless()
        };
        let mut cx = PipelineContext::new(config);
        let (root, _) = shown_window(&mut cx, 100.0, 100.0);
        let child = probe(&mut cx, root, "child", &events, rect(0.0, 0.0, 20.0, 20.0));
        cx.show_all(root);
        cx.set_size_bounds(
            root,
            SizeBounds::new(Size::new(50.0, 50.0), Size::new(f64::INFINITY, f64::INFINITY)),
        );
        let _ = cx.pipeline_pass();
        let _ = take_events(&events);

        cx.configure_window(root, Size::new(10.0, 10.0));
        assert!(cx.is_deferred(child));
        assert_eq!(cx.next_deadline(), Some(HostTime(100)));
        let stable = Rc::clone(&events);
        cx.on_stable(root, move |_| {
            stable.borrow_mut().push("stable".into());
            Ok(())
        });
        cx.schedule_full_redraw(child);

        let report = cx.pipeline_pass();
        assert_eq!(report.deferred, 3, "redraw, position and recalculation held back");
        assert_eq!(report.redrawn, 0);
        assert!(take_events(&events).is_empty());
        assert!(!cx.has_pending_work(), "deferred work does not keep the loop busy");

        cx.set_now(HostTime(100));
        let report = cx.pipeline_pass();
        assert_eq!(take_events(&events), ["stable", "child:draw"]);
        assert_eq!(report.deferred, 0);
        assert_eq!(
            cx.window(root).map(WindowState::gate),
            Some(crate::window::ResizeGate::NotResizing)
        );
    }

    #[test]
    fn on_stable_runs_immediately_when_not_resizing() {
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 10.0, 10.0);
        cx.on_stable(root, |_| Err(CallbackError::new("boom")));
        let failures = cx.take_exceptions(root);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].kind, CallbackKind::Scheduled);
    }

    #[test]
    fn on_stable_resolves_a_gate_that_already_timed_out() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 100.0, 100.0);
        cx.set_size_bounds(
            root,
            SizeBounds::new(Size::new(50.0, 50.0), Size::new(f64::INFINITY, f64::INFINITY)),
        );
        let _ = cx.pipeline_pass();

        cx.configure_window(root, Size::new(10.0, 10.0));
        assert!(!cx.is_deferred(root), "a zero timeout never defers");
        let stable = Rc::clone(&events);
        cx.on_stable(root, move |_| {
            stable.borrow_mut().push("stable".into());
            Ok(())
        });
        assert_eq!(take_events(&events), ["stable"]);
        assert_eq!(
            cx.window(root).map(WindowState::gate),
            Some(crate::window::ResizeGate::NotResizing)
        );
    }

    #[test]
    fn hiding_reports_and_repaints_the_vacated_area() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let p = probe(&mut cx, root, "p", &events, rect(0.0, 0.0, 50.0, 50.0));
        let a = probe(&mut cx, p, "a", &events, rect(0.0, 0.0, 10.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        let _ = take_events(&events);

        cx.schedule_for_visibility(a, false);
        assert!(!cx.is_visible(a), "logical state changes immediately");
        let _ = cx.pipeline_pass();
        assert_eq!(take_events(&events), ["a:hidden", "p:draw"]);
        assert_eq!(
            surface.borrow().flushes.last(),
            Some(&vec![rect(0.0, 0.0, 10.0, 10.0)])
        );
        assert_eq!(cx.store().drawn_rect(a), None);
    }

    #[test]
    fn removed_nodes_are_skipped_silently() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let p = probe(&mut cx, root, "p", &events, rect(0.0, 0.0, 50.0, 50.0));
        let a = probe(&mut cx, p, "a", &events, rect(0.0, 0.0, 10.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        let _ = take_events(&events);

        cx.set_position(a, rect(5.0, 5.0, 10.0, 10.0));
        cx.schedule_full_redraw(a);
        cx.remove_node(a);
        cx.remove_node(a);
        assert!(!cx.store().is_alive(a));
        assert!(cx.work().position.is_empty(), "purged from work-sets");

        let _ = cx.pipeline_pass();
        assert_eq!(take_events(&events), ["p:draw"]);
        assert_eq!(
            surface.borrow().flushes.last(),
            Some(&vec![rect(0.0, 0.0, 10.0, 10.0)])
        );
    }

    #[test]
    fn flush_coalesces_redraws_and_exposures_once_per_pass() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, surface) = shown_window(&mut cx, 100.0, 100.0);
        let a = probe(&mut cx, root, "a", &events, rect(0.0, 0.0, 10.0, 10.0));
        let b = probe(&mut cx, root, "b", &events, rect(10.0, 0.0, 10.0, 10.0));
        cx.show_all(root);
        let _ = cx.pipeline_pass();
        *surface.borrow_mut() = SurfaceLog::default();

        cx.schedule_full_redraw(a);
        cx.schedule_redraw(b, rect(0.0, 0.0, 10.0, 10.0));
        cx.expose(root, rect(50.0, 50.0, 5.0, 5.0));
        let report = cx.pipeline_pass();
        assert_eq!(report.redrawn, 2);
        let log = surface.borrow();
        assert_eq!(log.flushes.len(), 1);
        assert_eq!(
            log.flushed(),
            [rect(0.0, 0.0, 20.0, 10.0), rect(50.0, 50.0, 5.0, 5.0)]
        );
    }

    struct Restless(EventLog);

    impl LayoutManager for Restless {
        fn recalculate(
            &mut self,
            cx: &mut PipelineContext,
            container: NodeId,
        ) -> Result<(), CallbackError> {
            self.0.borrow_mut().push("recalc".into());
            cx.schedule_recalculation(container);
            Ok(())
        }
    }

    #[test]
    fn rescheduling_during_a_visit_waits_for_the_next_pass() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 10.0, 10.0);
        cx.install_layout_manager(root, Box::new(Restless(Rc::clone(&events))));
        cx.schedule_recalculation(root);
        let idle = Rc::clone(&events);
        cx.schedule_idle(move |_| {
            idle.borrow_mut().push("idle".into());
            Ok(())
        });

        let report = cx.pipeline_pass();
        assert_eq!(report.recalculated, 1, "scheduled twice, visited once");
        assert_eq!(report.idle, 0, "work is still pending");
        assert!(cx.has_pending_work());
        assert_eq!(take_events(&events), ["recalc"]);

        let _ = cx.uninstall_layout_manager(root);
        let report = cx.pipeline_pass();
        assert_eq!(report.idle, 1);
        assert_eq!(take_events(&events), ["idle"]);
    }

    #[test]
    fn idle_callbacks_scheduled_while_idle_wait_for_the_next_pass() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let outer = Rc::clone(&events);
        cx.schedule_idle(move |cx| {
            outer.borrow_mut().push("idle".into());
            let inner = Rc::clone(&outer);
            cx.schedule_idle(move |_| {
                inner.borrow_mut().push("again".into());
                Ok(())
            });
            Ok(())
        });
        assert_eq!(cx.pipeline_pass().idle, 1);
        assert_eq!(cx.pipeline_pass().idle, 1);
        assert_eq!(take_events(&events), ["idle", "again"]);
    }

    #[test]
    fn timers_fire_in_deadline_order_and_honor_cancellation() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let record = |name: &'static str| {
            let events = Rc::clone(&events);
            move |_: &mut PipelineContext| {
                events.borrow_mut().push(String::from(name));
                Ok::<(), CallbackError>(())
            }
        };
        let late = cx.schedule_timer(HostTime(10), record("late"));
        let early = cx.schedule_timer(HostTime(5), record("early"));
        drop(cx.schedule_timer(HostTime(7), record("cancelled")));
        let hover = cx.schedule_hover_action(record("hover"));
        assert_eq!(cx.next_deadline(), Some(HostTime(0)), "headless hover fires at once");

        cx.set_now(HostTime(10));
        assert_eq!(cx.run_timers(), 3);
        assert_eq!(take_events(&events), ["hover", "early", "late"]);
        assert_eq!(cx.next_deadline(), None);
        drop((late, early, hover));
    }

    #[test]
    #[should_panic(expected = "already has a layout manager")]
    fn installing_a_second_layout_manager_panics() {
        let events = EventLog::default();
        let mut cx = PipelineContext::default();
        let (root, _) = shown_window(&mut cx, 10.0, 10.0);
        cx.install_layout_manager(root, Box::new(ProbeLayout::new("one", &events)));
        cx.install_layout_manager(root, Box::new(ProbeLayout::new("two", &events)));
    }

    #[test]
    #[should_panic(expected = "no layout manager to uninstall")]
    fn uninstalling_a_missing_layout_manager_panics() {
        let mut cx = PipelineContext::default();
        let (root, _) = shown_window(&mut cx, 10.0, 10.0);
        let _ = cx.uninstall_layout_manager(root);
    }

    struct Replacing(EventLog);

    impl LayoutManager for Replacing {
        fn recalculate(
            &mut self,
            cx: &mut PipelineContext,
            container: NodeId,
        ) -> Result<(), CallbackError> {
            cx.install_layout_manager(container, Box::new(ProbeLayout::new("late", &self.0)));
            Ok(())
        }
    }

    #[test]
    #[should_panic(expected = "already has a layout manager")]
    fn installing_over_a_running_layout_manager_panics() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 10.0, 10.0);
        cx.install_layout_manager(root, Box::new(Replacing(Rc::clone(&events))));
        let _ = cx.pipeline_pass();
    }

    #[test]
    fn layout_manager_positions_children_in_the_same_pass() {
        let events = EventLog::default();
        let mut cx = PipelineContext::new(EngineConfig::headless());
        let (root, _) = shown_window(&mut cx, 100.0, 100.0);
        let child = cx.create_node(root, ProbeWidget::new("child", &events).boxed());
        cx.show_all(root);
        cx.install_layout_manager(
            root,
            Box::new(ProbeLayout::new("root", &events).placing(child, rect(1.0, 2.0, 3.0, 4.0))),
        );
        let _ = cx.pipeline_pass();
        let events = take_events(&events);
        assert!(events.iter().any(|e| e == "child:position"));
        assert_eq!(draws(&events), ["child:draw"]);
        assert_eq!(
            cx.draw_info(child).absolute_location,
            rect(1.0, 2.0, 3.0, 4.0)
        );
    }
}
