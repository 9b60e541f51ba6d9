use std::future::Future;

use futures::future::BoxFuture;

use crate::chain::{ErrorNext, Next};
use crate::context::Context;
use crate::failure::Failure;

/// One stage of the forward chain.
///
/// A stage receives the call's [`Context`] and a [`Next`] continuation. It may
/// await the continuation's settlement, return it, drop it, or never start it at
/// all (short-circuiting the chain by calling [`Context::send`] itself).
///
/// Returning `Err` with a failure observed by awaiting the continuation re-raises
/// it unchanged; any other `Err` is the stage's own failure and enters error
/// handling at this stage's position.
pub trait Middleware: Send + Sync + 'static {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'_, Result<(), Failure>>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Failure>> + Send + 'static,
{
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'_, Result<(), Failure>> {
        Box::pin(self(ctx, next))
    }
}

/// One handler of the error-handling chain.
///
/// A handler recovers with [`ErrorNext::resume`] (the forward chain continues
/// after the stage that failed) or by sending a response directly, and passes the
/// failure on with [`ErrorNext::forward`]. Failing without calling either is the
/// same as forwarding the new failure.
pub trait ErrorHandler: Send + Sync + 'static {
    fn handle(
        &self,
        failure: Failure,
        ctx: Context,
        next: ErrorNext,
    ) -> BoxFuture<'_, Result<(), Failure>>;
}

impl<F, Fut> ErrorHandler for F
where
    F: Fn(Failure, Context, ErrorNext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), Failure>> + Send + 'static,
{
    fn handle(
        &self,
        failure: Failure,
        ctx: Context,
        next: ErrorNext,
    ) -> BoxFuture<'_, Result<(), Failure>> {
        Box::pin(self(failure, ctx, next))
    }
}
