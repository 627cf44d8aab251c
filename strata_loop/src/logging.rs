// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Subscriber setup for binaries and tests.

use tracing_subscriber::EnvFilter;

/// Environment variable read for the log filter before `RUST_LOG`.
pub const ENV_VAR: &str = "STRATA_LOG";

/// Installs a formatting subscriber writing to stderr.
///
/// The filter comes from `STRATA_LOG`, then `RUST_LOG`, and defaults to
/// `warn`. Calling this more than once, or after another subscriber was
/// installed, does nothing.
pub fn init() {
    let filter = EnvFilter::try_from_env(ENV_VAR)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
