// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine configuration.

use crate::time::Duration;

/// Tunables for the [`PipelineContext`](crate::pipeline::PipelineContext).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a window may stay resize-pending before the gate gives up
    /// waiting for the window manager and processing resumes.
    pub resize_timeout: Duration,
    /// Delay used by
    /// [`schedule_hover_action`](crate::pipeline::PipelineContext::schedule_hover_action).
    pub hover_delay: Duration,
    /// Whether repositioned widgets may be moved by copying their pixels.
    ///
    /// When `false`, every repositioned widget is redrawn from scratch.
    pub move_with_contents: bool,
    /// Capacity of each window's exception channel. Overflow drops the
    /// oldest record.
    pub exception_capacity: usize,
}

impl EngineConfig {
    /// Configuration for on-screen windows.
    pub const DEFAULT: Self = Self {
        resize_timeout: Duration::from_millis(1000),
        hover_delay: Duration::from_millis(500),
        move_with_contents: true,
        exception_capacity: 32,
    };

    /// Configuration for offscreen rendering and tests: the resize gate
    /// expires on the next pass and hover actions fire immediately.
    #[must_use]
    pub const fn headless() -> Self {
        Self {
            resize_timeout: Duration::ZERO,
            hover_delay: Duration::ZERO,
            ..Self::DEFAULT
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
