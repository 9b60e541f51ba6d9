use std::future::poll_fn;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::Poll;

use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use futures::{FutureExt, StreamExt};
use parking_lot::Mutex;
use tracing::{debug, warn};

use super::next::{ErrorNext, Next, Settlement, SettlementRecord, StageScope};
use crate::context::Context;
use crate::failure::{Failure, FailureOrigin};
use crate::middleware::{ErrorHandler, Middleware};
use crate::response::Reply;
use crate::service::{normalize, ServiceMethod};

type Work = BoxFuture<'static, Result<(), Failure>>;

/// State of one invocation's chain.
///
/// Every piece of work started by a continuation is pushed to `spawner` and
/// polled by [`Chain::drive`] until it settles, so work nobody awaits still runs.
/// The ledger keeps a record of each settlement for the final outcome.
pub(crate) struct Chain {
    ctx: Context,
    middleware: Arc<[Arc<dyn Middleware>]>,
    handlers: Arc<[Arc<dyn ErrorHandler>]>,
    method: Arc<dyn ServiceMethod>,
    spawner: UnboundedSender<BoxFuture<'static, ()>>,
    ledger: Mutex<Vec<Arc<SettlementRecord>>>,
}

/// Run one invocation through its interceptor and error-handler chains.
///
/// Resolves once every started stage, handler and the service method have
/// settled. The result is the sent response, else the unrecovered failure, else
/// the synthetic "no response" failure.
pub(crate) async fn execute(
    ctx: Context,
    middleware: Arc<[Arc<dyn Middleware>]>,
    handlers: Arc<[Arc<dyn ErrorHandler>]>,
    method: Arc<dyn ServiceMethod>,
) -> Result<Reply, Failure> {
    let (spawner, inbox) = mpsc::unbounded();
    let chain = Arc::new(Chain {
        ctx,
        middleware,
        handlers,
        method,
        spawner,
        ledger: Mutex::new(Vec::new()),
    });

    let root_work = Arc::clone(&chain).step(0);
    let root = chain.start(root_work, Arc::new(StageScope::default()));
    Chain::drive(inbox).await;
    chain.conclude(root.record())
}

/// Call a stage or handler body, converting panics (at call time or while
/// polled) into failures.
async fn guarded<'a, F>(invoke: F) -> Result<(), Failure>
where
    F: FnOnce() -> BoxFuture<'a, Result<(), Failure>>,
{
    match std::panic::catch_unwind(AssertUnwindSafe(invoke)) {
        Ok(body) => AssertUnwindSafe(body)
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(Failure::from_panic(panic))),
        Err(panic) => Err(Failure::from_panic(panic)),
    }
}

impl Chain {
    /// Track `work` and hand it to the driver.
    pub(super) fn start(&self, work: Work, scope: Arc<StageScope>) -> Settlement {
        let shared = work.shared();
        let record = Arc::new(SettlementRecord::default());
        self.ledger.lock().push(Arc::clone(&record));

        let driven = {
            let shared = shared.clone();
            let record = Arc::clone(&record);
            async move { record.settle(shared.await) }.boxed()
        };
        if self.spawner.unbounded_send(driven).is_err() {
            debug!(call_id = %self.ctx.id(), "chain driver gone; work runs only if awaited");
        }
        Settlement::new(shared, record, scope)
    }

    /// Poll every started piece of work until all of them have settled.
    async fn drive(mut inbox: UnboundedReceiver<BoxFuture<'static, ()>>) {
        let mut running = FuturesUnordered::new();
        poll_fn(|cx| loop {
            while let Poll::Ready(Some(work)) = inbox.poll_next_unpin(cx) {
                running.push(work);
            }
            match running.poll_next_unpin(cx) {
                Poll::Ready(Some(())) => continue,
                Poll::Ready(None) => return Poll::Ready(()),
                Poll::Pending => return Poll::Pending,
            }
        })
        .await;
    }

    /// Forward step `index`: stage `index`, or the service method at the end.
    pub(super) fn step(self: Arc<Self>, index: usize) -> Work {
        async move {
            let stages = self.middleware.len();
            if index > stages {
                debug!(call_id = %self.ctx.id(), "resumed past the service method");
                return Ok(());
            }
            if index == stages {
                return self.terminal().await;
            }

            let stage = Arc::clone(&self.middleware[index]);
            let scope = Arc::new(StageScope::default());
            let next = Next::new(Arc::clone(&self), index, Arc::clone(&scope));
            let ctx = self.ctx.clone();

            match guarded(|| stage.handle(ctx, next)).await {
                Ok(()) => Ok(()),
                Err(failure) if scope.has_observed(&failure) => Err(failure),
                Err(failure) => {
                    Arc::clone(&self)
                        .escalate(failure, FailureOrigin::Middleware { index }, index)
                        .await
                }
            }
        }
        .boxed()
    }

    async fn terminal(self: Arc<Self>) -> Result<(), Failure> {
        let stages = self.middleware.len();
        match normalize(self.method.as_ref(), self.ctx.clone()).await {
            Ok(reply) => {
                if !self.ctx.send_if_unset(reply) {
                    debug!(call_id = %self.ctx.id(), "earlier response kept over service method result");
                }
                Ok(())
            }
            Err(failure) => {
                Arc::clone(&self)
                    .escalate(failure, FailureOrigin::BusinessLogic, stages)
                    .await
            }
        }
    }

    /// Enter error handling. This is the one place the diagnostic warning is emitted.
    pub(super) fn escalate(self: Arc<Self>, failure: Failure, origin: FailureOrigin, from: usize) -> Work {
        failure.mark_origin(origin);
        warn!(
            call_id = %self.ctx.id(),
            method = %self.ctx.properties().method_full_name,
            origin = %origin,
            error = %failure,
            "failure entered error handling"
        );
        self.recover(0, failure, from)
    }

    /// Error-handling step: handler `index` gets `failure`; `from` is where it entered.
    pub(super) fn recover(self: Arc<Self>, index: usize, failure: Failure, from: usize) -> Work {
        async move {
            let Some(handler) = self.handlers.get(index).map(Arc::clone) else {
                return Err(failure);
            };
            let scope = Arc::new(StageScope::default());
            let next = ErrorNext::new(Arc::clone(&self), index, from, Arc::clone(&scope));
            let ctx = self.ctx.clone();

            match guarded(|| handler.handle(failure, ctx, next)).await {
                Ok(()) => Ok(()),
                Err(failure) if scope.has_observed(&failure) || scope.continued() => Err(failure),
                Err(failure) => {
                    failure.mark_origin(FailureOrigin::Handler { index });
                    debug!(
                        call_id = %self.ctx.id(),
                        handler = index,
                        error = %failure,
                        "error handler failed; passing to next handler"
                    );
                    Arc::clone(&self).recover(index + 1, failure, from).await
                }
            }
        }
        .boxed()
    }

    fn conclude(&self, root: &SettlementRecord) -> Result<Reply, Failure> {
        if let Some(reply) = self.ctx.take_reply() {
            return Ok(reply);
        }
        match root.outcome() {
            Some(Err(failure)) => return Err(failure),
            Some(Ok(())) => {}
            None => debug!(call_id = %self.ctx.id(), "chain root never settled"),
        }

        let dropped = self
            .ledger
            .lock()
            .iter()
            .filter(|record| !std::ptr::eq(record.as_ref(), root))
            .find_map(|record| record.unobserved_failure());
        if let Some(failure) = dropped {
            debug!(call_id = %self.ctx.id(), error = %failure, "delivering failure nobody awaited");
            return Err(failure);
        }

        debug!(call_id = %self.ctx.id(), "chain settled without a response");
        Err(Failure::no_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Call, MethodProperties};
    use futures::executor::block_on;
    use serde_json::json;

    fn run(
        middleware: Vec<Arc<dyn Middleware>>,
        handlers: Vec<Arc<dyn ErrorHandler>>,
        method: impl ServiceMethod,
    ) -> Result<Reply, Failure> {
        let ctx = Context::new(
            Call::new(json!({})),
            Arc::new(MethodProperties::new("testapp.PersonService", "list")),
        );
        block_on(execute(ctx, middleware.into(), handlers.into(), Arc::new(method)))
    }

    #[test]
    fn bare_method() {
        let result = run(vec![], vec![], |_ctx: Context| json!("ok"));
        assert_eq!(result, Ok(Reply::from(json!("ok"))));
    }

    #[test]
    fn stage_failure_without_handlers_is_marked() {
        let failing: Arc<dyn Middleware> =
            Arc::new(|_ctx: Context, _next: Next| async { Err::<(), _>(Failure::new("no")) });
        let result = run(vec![failing], vec![], |_ctx: Context| json!("ok"));
        let failure = result.unwrap_err();
        assert_eq!(failure.message(), "no");
        assert_eq!(failure.origin(), Some(FailureOrigin::Middleware { index: 0 }));
    }

    #[test]
    fn stage_that_never_continues_and_never_sends() {
        let idle: Arc<dyn Middleware> =
            Arc::new(|_ctx: Context, _next: Next| async { Ok::<(), Failure>(()) });
        let result = run(vec![idle], vec![], |_ctx: Context| json!("ok"));
        assert!(result.unwrap_err().is_unresolved_response());
    }
}
