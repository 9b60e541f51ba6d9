//! # Middleware Module
//!
//! Stage and error-handler contracts, and the built-in stages.
//!
//! ## Stages
//!
//! A [`Middleware`] runs around the rest of the chain. Any closure taking
//! `(Context, Next)` and returning a `Future<Output = Result<(), Failure>>` is a
//! stage:
//!
//! ```rust,ignore
//! builder.use_middleware(|ctx: Context, next: Next| async move {
//!     if ctx.call().get_metadata("authorization").is_none() {
//!         return Err(Failure::with_code(16, "unauthenticated"));
//!     }
//!     next.run().await
//! });
//! ```
//!
//! ## Error handlers
//!
//! An [`ErrorHandler`] sees every failure that enters error handling for calls
//! in its scope. Closures taking `(Failure, Context, ErrorNext)` qualify:
//!
//! ```rust,ignore
//! builder.add_error_handler(|failure: Failure, ctx: Context, next: ErrorNext| async move {
//!     if failure.code() == Some(5) {
//!         ctx.send(json!({}));
//!         return Ok(());
//!     }
//!     next.forward(failure).await
//! });
//! ```
//!
//! ## Built-in stages
//!
//! - [`TracingMiddleware`] - `rpc_call` span with latency and outcome
//! - [`MetricsMiddleware`] - call, failure and latency counters

mod core;
mod metrics;
mod tracing;

pub use self::core::{ErrorHandler, Middleware};
pub use self::metrics::MetricsMiddleware;
pub use self::tracing::TracingMiddleware;
