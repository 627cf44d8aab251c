// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Messages carried from other threads to the loop thread.

use core::fmt;

use strata_core::pipeline::PipelineContext;

/// A closure run on the loop thread.
pub type Job = Box<dyn FnOnce(&mut PipelineContext) + Send>;

/// One entry in the loop's message queue.
pub enum Message {
    /// Run one closure.
    Run(Job),
    /// Run every closure of a finished batch, in order. Sent once per batch,
    /// even if the batch is empty, so that exactly one pass follows.
    Batch(Vec<Job>),
    /// Finish the queued work, then exit.
    Stop,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(_) => f.write_str("Run(..)"),
            Self::Batch(jobs) => write!(f, "Batch({} jobs)", jobs.len()),
            Self::Stop => f.write_str("Stop"),
        }
    }
}
