// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Single-threaded event loop for `strata_core`.
//!
//! Exactly one thread owns the [`PipelineContext`](strata_core::pipeline::PipelineContext).
//! Every other thread talks to it through an [`EngineHandle`], which posts
//! closures onto a message queue. Posting is the only synchronized operation;
//! no node or work-set is ever locked.
//!
//! Each turn of the [`EventLoop`]:
//!
//! 1. runs queued closures (a bounded number per turn),
//! 2. dispatches pending display-server events through the [`Transport`],
//! 3. fires due timers and runs one pipeline pass,
//! 4. flushes the transport,
//! 5. waits for the next message, bounded by the nearest timer or
//!    resize-gate deadline.
//!
//! A [`BatchToken`] coalesces closures from several call sites into a single
//! message, and therefore a single pipeline pass.
//!
//! ```no_run
//! use strata_loop::{EventLoop, LoopConfig};
//!
//! strata_loop::logging::init();
//! let (handle, thread) = EventLoop::spawn(LoopConfig::DEFAULT).unwrap();
//! handle.post(|cx| {
//!     let _ = cx.now();
//! });
//! handle.stop();
//! thread.join().unwrap();
//! ```

pub mod clock;
pub mod config;
pub mod event_loop;
pub mod handle;
pub mod logging;
pub mod message;
pub mod transport;

pub use clock::Clock;
pub use config::LoopConfig;
pub use event_loop::{EventLoop, Turn};
pub use handle::{BatchToken, EngineHandle};
pub use message::{Job, Message};
pub use transport::{NullTransport, Transport, TransportError};
