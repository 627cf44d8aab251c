// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Event loop configuration.

use strata_core::config::EngineConfig;

/// Configuration of an [`EventLoop`](crate::EventLoop).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LoopConfig {
    /// Messages handled per turn before the pipeline runs. Messages beyond
    /// this are handled next turn, without waiting.
    pub max_messages_per_turn: usize,
    /// Configuration of the engine the loop drives.
    pub engine: EngineConfig,
}

impl LoopConfig {
    /// Interactive defaults.
    pub const DEFAULT: Self = Self {
        max_messages_per_turn: 256,
        engine: EngineConfig::DEFAULT,
    };

    /// Defaults for tests and offscreen rendering.
    #[must_use]
    pub const fn headless() -> Self {
        Self {
            max_messages_per_turn: 256,
            engine: EngineConfig::headless(),
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
