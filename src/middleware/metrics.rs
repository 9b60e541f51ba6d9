use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use futures::FutureExt;

use super::Middleware;
use crate::chain::Next;
use crate::context::Context;
use crate::failure::Failure;

#[derive(Debug, Default)]
struct Counters {
    call_count: AtomicUsize,
    failure_count: AtomicUsize,
    total_latency_ns: AtomicU64,
}

/// Middleware collecting call statistics.
///
/// Counts calls and failed calls and accumulates the latency of the downstream
/// chain. All counters use relaxed atomics; readings are eventually consistent.
///
/// Clones share the same counters, so keep one clone for reading and register
/// another:
///
/// ```rust,ignore
/// let metrics = MetricsMiddleware::new();
/// let builder = RegistryBuilder::new().use_middleware(metrics.clone());
/// // ...
/// println!("{} calls", metrics.call_count());
/// ```
#[derive(Debug, Default, Clone)]
pub struct MetricsMiddleware {
    counters: Arc<Counters>,
}

impl MetricsMiddleware {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls that entered this stage
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.counters.call_count.load(Ordering::Relaxed)
    }

    /// Calls whose downstream chain settled with a failure
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.counters.failure_count.load(Ordering::Relaxed)
    }

    /// Mean downstream latency; zero before the first call completes
    #[must_use]
    pub fn average_latency(&self) -> Duration {
        let count = self.call_count() as u64;
        if count == 0 {
            Duration::from_nanos(0)
        } else {
            Duration::from_nanos(self.counters.total_latency_ns.load(Ordering::Relaxed) / count)
        }
    }
}

impl Middleware for MetricsMiddleware {
    fn handle(&self, _ctx: Context, next: Next) -> BoxFuture<'_, Result<(), Failure>> {
        self.counters.call_count.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        async move {
            let result = next.run().await;
            self.counters
                .total_latency_ns
                .fetch_add(started.elapsed().as_nanos() as u64, Ordering::Relaxed);
            if result.is_err() {
                self.counters.failure_count.fetch_add(1, Ordering::Relaxed);
            }
            result
        }
        .boxed()
    }
}
