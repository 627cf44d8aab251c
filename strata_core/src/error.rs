// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Callback failures.
//!
//! Every widget, layout-manager and timer callback returns
//! `Result<(), CallbackError>`. The pipeline logs a failure, forwards it to
//! the owning window's exception channel, and carries on with the rest of
//! the cycle: one misbehaving widget never stalls the others.
//!
//! Programmer errors (stale handles, double layout-manager installs, a
//! move-order index out of sync) are not represented here. They panic.

use alloc::string::String;

use crate::node::NodeId;

/// An error returned by an application callback.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct CallbackError {
    message: String,
}

impl CallbackError {
    /// Creates an error with the given message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Which callback boundary a failure was caught at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallbackKind {
    /// [`Widget::initialize`](crate::widget::Widget::initialize).
    Initialize,
    /// [`Widget::visibility_changed`](crate::widget::Widget::visibility_changed).
    Visibility,
    /// [`LayoutManager::recalculate`](crate::widget::LayoutManager::recalculate).
    Recalculate,
    /// Position processing callbacks.
    Position,
    /// [`Widget::contents_moved`](crate::widget::Widget::contents_moved).
    Move,
    /// [`Widget::draw`](crate::widget::Widget::draw).
    Draw,
    /// A timer, idle or "once stable" callback.
    Scheduled,
}

/// A failure recorded on a window's exception channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallbackFailure {
    /// The node whose callback failed.
    pub node: NodeId,
    /// The callback boundary.
    pub kind: CallbackKind,
    /// The error the callback returned.
    pub error: CallbackError,
}
