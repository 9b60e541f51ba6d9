use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{ready, Context as TaskContext, Poll};

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use tracing::debug;

use super::core::Chain;
use crate::failure::{Failure, FailureOrigin};

/// What one stage or handler body observed through its own continuation.
#[derive(Debug, Default)]
pub(crate) struct StageScope {
    observed: Mutex<Vec<Failure>>,
    continued: AtomicBool,
}

impl StageScope {
    fn observe(&self, failure: &Failure) {
        self.observed.lock().push(failure.clone());
    }

    fn mark_continued(&self) {
        self.continued.store(true, Ordering::Release);
    }

    /// Whether `failure` is one this body received by awaiting a settlement.
    pub(crate) fn has_observed(&self, failure: &Failure) -> bool {
        self.observed.lock().iter().any(|seen| seen.same_as(failure))
    }

    /// Whether this body invoked its continuation.
    pub(crate) fn continued(&self) -> bool {
        self.continued.load(Ordering::Acquire)
    }
}

/// Ledger entry for one started piece of work.
#[derive(Debug, Default)]
pub(crate) struct SettlementRecord {
    outcome: Mutex<Option<Result<(), Failure>>>,
    consumed: AtomicBool,
}

impl SettlementRecord {
    pub(crate) fn settle(&self, outcome: Result<(), Failure>) {
        *self.outcome.lock() = Some(outcome);
    }

    pub(crate) fn outcome(&self) -> Option<Result<(), Failure>> {
        self.outcome.lock().clone()
    }

    /// The failure this work settled with, if no one ever awaited it.
    pub(crate) fn unobserved_failure(&self) -> Option<Failure> {
        if self.consumed.load(Ordering::Acquire) {
            return None;
        }
        match &*self.outcome.lock() {
            Some(Err(failure)) => Some(failure.clone()),
            _ => None,
        }
    }
}

/// Handle to work started by a continuation.
///
/// The work runs to completion whether or not this handle is awaited; awaiting
/// it yields the settlement of the downstream chain. Dropping it is a valid
/// fire-and-forget.
pub struct Settlement {
    shared: Shared<BoxFuture<'static, Result<(), Failure>>>,
    record: Arc<SettlementRecord>,
    scope: Arc<StageScope>,
}

impl Settlement {
    pub(crate) fn new(
        shared: Shared<BoxFuture<'static, Result<(), Failure>>>,
        record: Arc<SettlementRecord>,
        scope: Arc<StageScope>,
    ) -> Self {
        Self {
            shared,
            record,
            scope,
        }
    }

    pub(crate) fn record(&self) -> &Arc<SettlementRecord> {
        &self.record
    }
}

impl Future for Settlement {
    type Output = Result<(), Failure>;

    fn poll(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let outcome = ready!(this.shared.poll_unpin(cx));
        this.record.consumed.store(true, Ordering::Release);
        if let Err(failure) = &outcome {
            this.scope.observe(failure);
        }
        Poll::Ready(outcome)
    }
}

impl std::fmt::Debug for Settlement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settlement")
            .field("outcome", &self.record.outcome())
            .finish_non_exhaustive()
    }
}

/// Continuation handed to a middleware stage.
pub struct Next {
    chain: Arc<Chain>,
    index: usize,
    scope: Arc<StageScope>,
}

impl Next {
    pub(crate) fn new(chain: Arc<Chain>, index: usize, scope: Arc<StageScope>) -> Self {
        Self {
            chain,
            index,
            scope,
        }
    }

    /// Position of the stage holding this continuation
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Continue with the next stage (or the service method after the last one).
    pub fn run(self) -> Settlement {
        self.scope.mark_continued();
        let work = Arc::clone(&self.chain).step(self.index + 1);
        self.chain.start(work, self.scope)
    }

    /// Enter error handling with `failure`, as if this stage had failed.
    pub fn fail(self, failure: impl Into<Failure>) -> Settlement {
        self.scope.mark_continued();
        let work = Arc::clone(&self.chain).escalate(
            failure.into(),
            FailureOrigin::Middleware { index: self.index },
            self.index,
        );
        self.chain.start(work, self.scope)
    }
}

impl std::fmt::Debug for Next {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Next").field("index", &self.index).finish()
    }
}

/// Continuation handed to an error handler.
pub struct ErrorNext {
    chain: Arc<Chain>,
    index: usize,
    from: usize,
    scope: Arc<StageScope>,
}

impl ErrorNext {
    pub(crate) fn new(chain: Arc<Chain>, index: usize, from: usize, scope: Arc<StageScope>) -> Self {
        Self {
            chain,
            index,
            from,
            scope,
        }
    }

    /// Position of the handler holding this continuation
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position in the forward chain where the failure entered error handling;
    /// equal to the stage count when the service method failed.
    #[must_use]
    pub fn failed_at(&self) -> usize {
        self.from
    }

    /// Recover: continue the forward chain after the position that failed.
    pub fn resume(self) -> Settlement {
        self.scope.mark_continued();
        debug!(handler = self.index, resume_at = self.from + 1, "error handler recovered");
        let work = Arc::clone(&self.chain).step(self.from + 1);
        self.chain.start(work, self.scope)
    }

    /// Pass `failure` to the next handler, or out of the chain after the last one.
    pub fn forward(self, failure: impl Into<Failure>) -> Settlement {
        self.scope.mark_continued();
        debug!(handler = self.index, "error handler forwarded failure");
        let work = Arc::clone(&self.chain).recover(self.index + 1, failure.into(), self.from);
        self.chain.start(work, self.scope)
    }
}

impl std::fmt::Debug for ErrorNext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorNext")
            .field("index", &self.index)
            .field("failed_at", &self.from)
            .finish()
    }
}
