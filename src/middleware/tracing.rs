use std::time::Instant;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::{debug, field, info, info_span, Instrument, Span};

use super::Middleware;
use crate::chain::Next;
use crate::context::Context;
use crate::failure::Failure;

/// Wraps the rest of the chain in an `rpc_call` span.
///
/// The span carries the call id and qualified method name, and records the
/// downstream latency and whether the call settled with a failure. Failures are
/// re-raised unchanged, so this stage never adds an entry into error handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'_, Result<(), Failure>> {
        let span = info_span!(
            "rpc_call",
            call_id = %ctx.id(),
            method = %ctx.properties().method_full_name,
            latency_ms = field::Empty,
            failed = field::Empty,
        );

        async move {
            let started = Instant::now();
            let result = next.run().await;
            let latency_ms = started.elapsed().as_millis() as u64;

            let span = Span::current();
            span.record("latency_ms", latency_ms);
            span.record("failed", result.is_err());

            match &result {
                Ok(()) => debug!(latency_ms, responded = ctx.responded(), "downstream settled"),
                Err(failure) => info!(latency_ms, error = %failure, "downstream failed"),
            }
            result
        }
        .instrument(span)
        .boxed()
    }
}
