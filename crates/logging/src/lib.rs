#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

//! # Overview
//!
//! Initializes a [`tracing_subscriber`] writer gated by the CLI's `-v` flag,
//! grounded on the pattern `tracing_subscriber::fmt().with_env_filter(...).init()`
//! seen in comparable CLI front-ends across the example pack.
//!
//! # Design
//!
//! `-v` sets a floor: without it, only `warn`-and-above is shown; with it,
//! `info`. `RUST_LOG`, when set, always takes precedence over the floor, so
//! a user can still dial in fine-grained module-level filtering without the
//! CLI needing to know about it.

use tracing_subscriber::EnvFilter;

/// Initializes the global `tracing` subscriber for the process.
///
/// `verbose` is the CLI's `-v` flag; when set, the default filter floor is
/// raised from `warn` to `info`. A global subscriber can only be installed
/// once per process; subsequent calls (for instance from multiple tests in
/// the same binary) are silently ignored rather than panicking.
pub fn init(verbose: bool) {
    let floor = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(floor));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
