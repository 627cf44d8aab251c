// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-node visibility and lifecycle flags.

/// Per-node boolean state.
///
/// Visibility is tracked at three levels:
///
/// - [`requested_visible`](Self::requested_visible) is what the application
///   asked for on this node alone.
/// - [`inherited_visible`](Self::inherited_visible) is the logical result:
///   requested here and on every ancestor. It is updated as soon as a request
///   is made, so queries see it immediately.
/// - [`actually_visible`](Self::actually_visible) is the state realized on
///   screen. The visibility stage brings it in line with the logical state;
///   the position and redraw stages only act on it.
///
/// [`reported_visible`](Self::reported_visible) is the last value passed to
/// [`Widget::visibility_changed`](crate::widget::Widget::visibility_changed).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct NodeFlags {
    /// The application wants this node shown.
    pub requested_visible: bool,
    /// Requested here and on every ancestor.
    pub inherited_visible: bool,
    /// Applied by the visibility stage.
    pub actually_visible: bool,
    /// Last value reported to the widget.
    pub reported_visible: bool,
    /// [`Widget::initialize`](crate::widget::Widget::initialize) has run.
    pub initialized: bool,
}
