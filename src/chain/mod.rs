//! # Chain Module
//!
//! Runs one invocation through its filtered middleware stages, the service
//! method, and the error-handling chain.
//!
//! ## Forward chain
//!
//! Step `i` invokes stage `i` with a [`Next`]. [`Next::run`] starts step `i + 1`;
//! after the last stage, the service method runs and its normalized result is
//! stored as the response unless a stage already sent one.
//!
//! ## Error handling
//!
//! A failure enters error handling exactly once, at the position where it was
//! raised, and one warning is logged per entry. Handler `k` receives the failure
//! and an [`ErrorNext`]: [`ErrorNext::resume`] continues the forward chain after
//! the failed position, [`ErrorNext::forward`] hands the failure to handler
//! `k + 1`. A failure that passes the last handler is the invocation's failure.
//!
//! ## Settlement
//!
//! Continuations return a [`Settlement`]. Work is started eagerly and polled by a
//! per-call driver, so a stage that drops its settlement (fire-and-forget) does
//! not cut the call short: the invocation completes only when every piece of work
//! has settled.
//!
//! ```text
//! stage 0 ──run──▶ stage 1 ──run──▶ service method
//!    │                │                  │
//!    └─ Err ─▶ handler 0 ─forward─▶ handler 1 ─forward─▶ failure
//!                 │
//!                 └─resume──▶ step (failed position + 1)
//! ```

mod core;
mod next;

pub use self::next::{ErrorNext, Next, Settlement};

pub(crate) use self::core::execute;
