// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The display-server connection seen by the event loop.

use std::io;

use strata_core::pipeline::PipelineContext;

/// Failure reported by a [`Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The read was interrupted by a signal.
    #[error("interrupted")]
    Interrupted,
    /// Nothing could be read without blocking.
    #[error("operation would block")]
    WouldBlock,
    /// The server sent something the transport cannot make sense of.
    #[error("protocol error: {0}")]
    Protocol(String),
    /// Socket failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Returns `true` if the operation can simply be retried.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Interrupted | Self::WouldBlock => true,
            Self::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock
            ),
            Self::Protocol(_) => false,
        }
    }
}

/// A connection to the display server.
///
/// The loop calls [`dispatch`](Self::dispatch) once per turn, before the
/// pipeline pass, and [`flush`](Self::flush) after it. Neither may block.
pub trait Transport {
    /// Reads pending events and applies them to the engine, typically as
    /// `configure_window`, `expose` and `schedule_*` calls. Returns the
    /// number of events handled.
    fn dispatch(&mut self, cx: &mut PipelineContext) -> Result<usize, TransportError>;

    /// Sends buffered requests to the server.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Longest the loop may wait without calling
    /// [`dispatch`](Self::dispatch). `None` waits for messages and timers
    /// only.
    fn poll_interval(&self) -> Option<std::time::Duration> {
        None
    }
}

/// A transport with no server behind it.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn dispatch(&mut self, _cx: &mut PipelineContext) -> Result<usize, TransportError> {
        Ok(0)
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}
