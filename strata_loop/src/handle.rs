// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The cross-thread surface of the event loop.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crossbeam_channel::Sender;
use strata_core::pipeline::PipelineContext;
use tracing::{debug, trace};

use crate::message::{Job, Message};

/// A cloneable, thread-safe handle to a running [`EventLoop`](crate::EventLoop).
#[derive(Clone, Debug)]
pub struct EngineHandle {
    sender: Sender<Message>,
    batch: Arc<Mutex<Weak<BatchInner>>>,
}

impl EngineHandle {
    pub(crate) fn new(sender: Sender<Message>) -> Self {
        Self {
            sender,
            batch: Arc::new(Mutex::new(Weak::new())),
        }
    }

    /// Runs `job` on the loop thread. The loop runs a pipeline pass after it.
    ///
    /// Posting to a loop that has exited does nothing.
    pub fn post(&self, job: impl FnOnce(&mut PipelineContext) + Send + 'static) {
        send(&self.sender, Message::Run(Box::new(job)));
    }

    /// Asks the loop to exit once the queued work is done.
    pub fn stop(&self) {
        send(&self.sender, Message::Stop);
    }

    /// Returns the live batch token, creating one if none is outstanding.
    ///
    /// Every clone of every token returned while a batch is outstanding
    /// refers to the same batch. When the last one is dropped, the batch is
    /// posted as a single message.
    #[must_use]
    pub fn acquire_batch(&self) -> BatchToken {
        let mut slot = self.batch.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(inner) = slot.upgrade() {
            return BatchToken { inner };
        }
        let inner = Arc::new(BatchInner {
            jobs: Mutex::new(Vec::new()),
            sender: self.sender.clone(),
        });
        *slot = Arc::downgrade(&inner);
        trace!("batch opened");
        BatchToken { inner }
    }
}

fn send(sender: &Sender<Message>, message: Message) {
    if let Err(err) = sender.send(message) {
        debug!(message = ?err.into_inner(), "event loop has exited; message dropped");
    }
}

/// A shared handle on an open batch.
///
/// Closures queued with [`run_as`](Self::run_as) run, in order, on the loop
/// thread after the last clone of the token is dropped, followed by exactly
/// one pipeline pass.
#[derive(Clone, Debug)]
pub struct BatchToken {
    inner: Arc<BatchInner>,
}

impl BatchToken {
    /// Queues `job` into the batch.
    pub fn run_as(&self, job: impl FnOnce(&mut PipelineContext) + Send + 'static) {
        self.inner
            .jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(job));
    }

    /// Returns `true` if both tokens refer to the same batch.
    #[must_use]
    pub fn same_batch(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

struct BatchInner {
    jobs: Mutex<Vec<Job>>,
    sender: Sender<Message>,
}

impl core::fmt::Debug for BatchInner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let jobs = self.jobs.lock().map_or(0, |jobs| jobs.len());
        f.debug_struct("BatchInner")
            .field("jobs", &jobs)
            .finish_non_exhaustive()
    }
}

impl Drop for BatchInner {
    fn drop(&mut self) {
        let jobs = core::mem::take(
            self.jobs
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );
        trace!(jobs = jobs.len(), "batch closed");
        send(&self.sender, Message::Batch(jobs));
    }
}
