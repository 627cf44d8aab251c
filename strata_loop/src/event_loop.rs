// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The loop that owns a [`PipelineContext`].

use core::fmt;
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{Receiver, bounded, unbounded};
use strata_core::pipeline::{PassReport, PipelineContext};
use tracing::{debug, debug_span, error, trace, trace_span, warn};

use crate::clock::Clock;
use crate::config::LoopConfig;
use crate::handle::EngineHandle;
use crate::message::Message;
use crate::transport::{NullTransport, Transport, TransportError};

/// Attempts per turn for a transport call failing with a transient error.
const TRANSIENT_ATTEMPTS: usize = 3;

/// What the loop does after a [`turn`](EventLoop::turn).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Turn {
    /// Wait for more work, then turn again.
    Continue,
    /// A stop was requested and everything queued has been handled.
    Exit,
}

/// A single-threaded event loop.
///
/// The loop and its [`PipelineContext`] live on one thread; use
/// [`handle`](Self::handle) to reach it from others. The loop keeps a
/// sender of its own, so it runs until [`EngineHandle::stop`] is called,
/// even when every other handle is gone.
pub struct EventLoop<T = NullTransport> {
    config: LoopConfig,
    cx: PipelineContext,
    receiver: Receiver<Message>,
    handle: EngineHandle,
    transport: T,
    connected: bool,
    clock: Clock,
    stopping: bool,
    last_report: PassReport,
}

impl<T> fmt::Debug for EventLoop<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("config", &self.config)
            .field("cx", &self.cx)
            .field("queued", &self.receiver.len())
            .field("connected", &self.connected)
            .field("stopping", &self.stopping)
            .field("last_report", &self.last_report)
            .finish_non_exhaustive()
    }
}

impl EventLoop {
    /// Creates a loop with no display-server connection.
    #[must_use]
    pub fn new(config: LoopConfig) -> Self {
        Self::with_transport(config, NullTransport)
    }

    /// Starts a loop with no display-server connection on a new thread.
    ///
    /// Returns once the loop is ready to receive messages.
    pub fn spawn(config: LoopConfig) -> io::Result<(EngineHandle, JoinHandle<()>)> {
        let (handle_tx, handle_rx) = bounded(1);
        let thread = thread::Builder::new()
            .name("strata-loop".into())
            .spawn(move || {
                let mut event_loop = Self::new(config);
                let _ = handle_tx.send(event_loop.handle());
                event_loop.run();
            })?;
        let handle = handle_rx
            .recv()
            .map_err(|_| io::Error::other("event loop thread exited during startup"))?;
        Ok((handle, thread))
    }
}

impl<T: Transport> EventLoop<T> {
    /// Creates a loop driving `transport`.
    pub fn with_transport(config: LoopConfig, transport: T) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            config,
            cx: PipelineContext::new(config.engine),
            receiver,
            handle: EngineHandle::new(sender),
            transport,
            connected: true,
            clock: Clock::new(),
            stopping: false,
            last_report: PassReport::default(),
        }
    }

    /// A handle for posting work from any thread.
    #[must_use]
    pub fn handle(&self) -> EngineHandle {
        self.handle.clone()
    }

    /// The engine.
    #[must_use]
    pub fn context(&self) -> &PipelineContext {
        &self.cx
    }

    /// The engine, for setup on the loop thread.
    pub fn context_mut(&mut self) -> &mut PipelineContext {
        &mut self.cx
    }

    /// The transport.
    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns `false` once the transport has failed fatally. The loop then
    /// only handles messages, timers and pipeline passes.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// The clock the engine's time is read from.
    #[must_use]
    pub fn clock(&self) -> Clock {
        self.clock
    }

    /// The report of the most recent pipeline pass.
    #[must_use]
    pub fn last_report(&self) -> PassReport {
        self.last_report
    }

    /// Turns until stopped, waiting between turns.
    pub fn run(&mut self) {
        let _span = debug_span!("event_loop").entered();
        debug!("event loop running");
        while self.turn() == Turn::Continue {
            self.wait();
        }
        debug!("event loop exited");
    }

    /// Runs one turn without waiting: queued messages, transport events,
    /// due timers, one pipeline pass, transport flush.
    pub fn turn(&mut self) -> Turn {
        let _span = trace_span!("turn").entered();
        self.cx.set_now(self.clock.now());
        let handled = self.drain_messages();
        self.dispatch_transport();

        self.cx.set_now(self.clock.now());
        let fired = self.cx.run_timers();
        self.last_report = self.cx.pipeline_pass();
        self.flush_transport();
        trace!(handled, fired, "turn complete");

        if self.stopping && self.receiver.is_empty() && !self.cx.has_pending_work() {
            return Turn::Exit;
        }
        Turn::Continue
    }

    /// Blocks until a message arrives or the engine's next deadline passes.
    ///
    /// Returns at once if messages are queued or the engine has work
    /// pending. A message received while waiting is handled before
    /// returning.
    pub fn wait(&mut self) {
        if !self.receiver.is_empty() || self.cx.has_pending_work() {
            return;
        }
        let mut deadline = self.cx.next_deadline().and_then(|t| self.clock.instant(t));
        if self.connected
            && let Some(interval) = self.transport.poll_interval()
            && let Some(poll) = Instant::now().checked_add(interval)
        {
            deadline = Some(deadline.map_or(poll, |d| d.min(poll)));
        }
        trace!(?deadline, "waiting");
        let message = match deadline {
            Some(deadline) => self.receiver.recv_deadline(deadline).ok(),
            None => self.receiver.recv().ok(),
        };
        if let Some(message) = message {
            self.handle_message(message);
        }
    }

    fn drain_messages(&mut self) -> usize {
        let limit = self.config.max_messages_per_turn.max(1);
        let mut handled = 0;
        while handled < limit {
            let Ok(message) = self.receiver.try_recv() else {
                break;
            };
            self.handle_message(message);
            handled += 1;
        }
        handled
    }

    fn handle_message(&mut self, message: Message) {
        match message {
            Message::Run(job) => job(&mut self.cx),
            Message::Batch(jobs) => {
                trace!(jobs = jobs.len(), "running batch");
                for job in jobs {
                    job(&mut self.cx);
                }
            }
            Message::Stop => {
                debug!("stop requested");
                self.stopping = true;
            }
        }
    }

    fn dispatch_transport(&mut self) {
        for attempt in 1..=TRANSIENT_ATTEMPTS {
            if !self.connected {
                return;
            }
            match self.transport.dispatch(&mut self.cx) {
                Ok(events) => {
                    if events > 0 {
                        trace!(events, "transport events dispatched");
                    }
                    return;
                }
                Err(err) => {
                    if !self.transport_failed("dispatch", attempt, &err) {
                        return;
                    }
                }
            }
        }
    }

    fn flush_transport(&mut self) {
        for attempt in 1..=TRANSIENT_ATTEMPTS {
            if !self.connected {
                return;
            }
            match self.transport.flush() {
                Ok(()) => return,
                Err(err) => {
                    if !self.transport_failed("flush", attempt, &err) {
                        return;
                    }
                }
            }
        }
    }

    /// Logs a transport failure and returns whether to retry.
    fn transport_failed(
        &mut self,
        operation: &'static str,
        attempt: usize,
        err: &TransportError,
    ) -> bool {
        if err.is_transient() {
            warn!(operation, attempt, error = %err, "transient transport error");
            return true;
        }
        error!(operation, error = %err, "transport disconnected");
        self.connected = false;
        false
    }
}
