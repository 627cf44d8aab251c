// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recording collaborators for unit tests.

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

use kurbo::{Point, Rect};

use crate::error::CallbackError;
use crate::node::{BackgroundId, NodeId};
use crate::pipeline::PipelineContext;
use crate::widget::{DrawCx, LayoutManager, RedrawPriority, Widget, WindowSurface};

/// A widget that does nothing.
pub(crate) struct Inert;

impl Widget for Inert {
    fn draw(&mut self, _cx: &mut DrawCx<'_>, _rects: &[Rect]) -> Result<(), CallbackError> {
        Ok(())
    }
}

/// Everything a [`RecordingSurface`] was asked to do.
#[derive(Debug, Default)]
pub(crate) struct SurfaceLog {
    pub(crate) copies: Vec<(Rect, Point)>,
    pub(crate) clears: Vec<Rect>,
    pub(crate) flushes: Vec<Vec<Rect>>,
}

impl SurfaceLog {
    pub(crate) fn flushed(&self) -> Vec<Rect> {
        self.flushes.iter().flatten().copied().collect()
    }
}

/// A window surface that records every call.
#[derive(Debug, Default)]
pub(crate) struct RecordingSurface {
    pub(crate) log: Rc<RefCell<SurfaceLog>>,
}

impl RecordingSurface {
    pub(crate) fn new() -> (Box<Self>, Rc<RefCell<SurfaceLog>>) {
        let surface = Self::default();
        let log = Rc::clone(&surface.log);
        (Box::new(surface), log)
    }
}

impl WindowSurface for RecordingSurface {
    fn copy_configured(&mut self, src: Rect, dst: Point) {
        self.log.borrow_mut().copies.push((src, dst));
    }

    fn clear(&mut self, rect: Rect, _background: Option<BackgroundId>) {
        self.log.borrow_mut().clears.push(rect);
    }

    fn flush_redrawn_areas(&mut self, rects: &[Rect]) {
        self.log.borrow_mut().flushes.push(rects.to_vec());
    }
}

/// Shared, ordered record of callback invocations.
pub(crate) type EventLog = Rc<RefCell<Vec<String>>>;

/// A widget that records each callback as `"<name>:<event>"`.
pub(crate) struct ProbeWidget {
    name: &'static str,
    log: EventLog,
    fail_draw: bool,
    movable: bool,
    priority: RedrawPriority,
}

impl ProbeWidget {
    pub(crate) fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            fail_draw: false,
            movable: true,
            priority: RedrawPriority::Content,
        }
    }

    pub(crate) fn failing_draw(mut self) -> Self {
        self.fail_draw = true;
        self
    }

    pub(crate) fn immovable(mut self) -> Self {
        self.movable = false;
        self
    }

    pub(crate) fn with_priority(mut self, priority: RedrawPriority) -> Self {
        self.priority = priority;
        self
    }

    pub(crate) fn boxed(self) -> Box<dyn Widget> {
        Box::new(self)
    }

    fn record(&self, event: &str) {
        self.log.borrow_mut().push(format!("{}:{event}", self.name));
    }
}

impl Widget for ProbeWidget {
    fn initialize(&mut self, _cx: &mut PipelineContext, _id: NodeId) -> Result<(), CallbackError> {
        self.record("init");
        Ok(())
    }

    fn visibility_changed(
        &mut self,
        _cx: &mut PipelineContext,
        _id: NodeId,
        visible: bool,
    ) -> Result<(), CallbackError> {
        self.record(if visible { "shown" } else { "hidden" });
        Ok(())
    }

    fn process_updated_position(
        &mut self,
        _cx: &mut PipelineContext,
        _id: NodeId,
        _rect: Rect,
    ) -> Result<(), CallbackError> {
        self.record("position");
        Ok(())
    }

    fn process_same_position(
        &mut self,
        _cx: &mut PipelineContext,
        _id: NodeId,
        _rect: Rect,
    ) -> Result<(), CallbackError> {
        self.record("same");
        Ok(())
    }

    fn can_be_moved(&self) -> bool {
        self.movable
    }

    fn contents_moved(
        &mut self,
        _cx: &mut PipelineContext,
        _id: NodeId,
        _from: Rect,
        _to: Rect,
    ) -> Result<(), CallbackError> {
        self.record("moved");
        Ok(())
    }

    fn redraw_priority(&self) -> RedrawPriority {
        self.priority
    }

    fn draw(&mut self, _cx: &mut DrawCx<'_>, _rects: &[Rect]) -> Result<(), CallbackError> {
        self.record("draw");
        if self.fail_draw {
            return Err(CallbackError::new(format!("{} refused to draw", self.name)));
        }
        Ok(())
    }
}

/// A layout manager that records its runs and applies a fixed script of
/// child rectangles.
pub(crate) struct ProbeLayout {
    name: &'static str,
    log: EventLog,
    place: Vec<(NodeId, Rect)>,
}

impl ProbeLayout {
    pub(crate) fn new(name: &'static str, log: &EventLog) -> Self {
        Self {
            name,
            log: Rc::clone(log),
            place: Vec::new(),
        }
    }

    pub(crate) fn placing(mut self, child: NodeId, rect: Rect) -> Self {
        self.place.push((child, rect));
        self
    }
}

impl LayoutManager for ProbeLayout {
    fn recalculate(
        &mut self,
        cx: &mut PipelineContext,
        _container: NodeId,
    ) -> Result<(), CallbackError> {
        self.log.borrow_mut().push(format!("{}:recalc", self.name));
        for (child, rect) in &self.place {
            cx.set_position(*child, *rect);
        }
        Ok(())
    }
}

/// Drains the event log.
pub(crate) fn take_events(log: &EventLog) -> Vec<String> {
    core::mem::take(&mut *log.borrow_mut())
}
