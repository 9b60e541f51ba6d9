//! # Context Module
//!
//! Per-call state shared by every middleware stage, error handler and the
//! service method of a single invocation.
//!
//! ## Overview
//!
//! A [`Context`] is created once per call by the dispatcher and dropped when the
//! call has been delivered. It holds:
//!
//! - the raw [`Call`] handed over by the transport (decoded request, metadata, and
//!   the [`CallStream`] for streaming calls)
//! - the fixed [`MethodProperties`] of the method being called
//! - the reply slot, written through [`Context::send`]
//!
//! `send` is the only mutator. It may be called any number of times; the last
//! value written before final delivery wins, so a stage can overwrite a response
//! produced further down the chain once its continuation has settled:
//!
//! ```rust,ignore
//! registry.use_middleware(|ctx: Context, next: Next| async move {
//!     next.run().await?;
//!     ctx.send(json!({"wrapped": true}));
//!     Ok(())
//! });
//! ```
//!
//! Contexts are never shared across calls; cloning a `Context` clones a handle to
//! the same call.

mod call;
mod core;

pub use self::call::{Call, CallEvent, CallStream, Metadata, CALL_ID_METADATA, MAX_INLINE_METADATA};
pub use self::core::{Context, MethodProperties};
