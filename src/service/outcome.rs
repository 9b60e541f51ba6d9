use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::debug;

use crate::context::Context;
use crate::failure::Failure;
use crate::response::{Reply, Response};

/// What a service method produced, before normalization.
///
/// Every shape business logic can return is converted into one of these; the
/// chain only ever sees the normalized `Result<Reply, Failure>`.
pub enum Outcome {
    /// Nothing was returned; delivered as `{}`
    Empty,
    /// A value or wrapped response
    Reply(Reply),
    /// The method failed
    Failed(Failure),
    /// The result is not ready yet
    Deferred(BoxFuture<'static, Outcome>),
}

impl Outcome {
    /// Defer to a future resolving to anything convertible into an outcome.
    pub fn deferred<F, T>(future: F) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Into<Outcome> + 'static,
    {
        Outcome::Deferred(future.map(Into::into).boxed())
    }
}

impl std::fmt::Debug for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Empty => write!(f, "Empty"),
            Outcome::Reply(reply) => f.debug_tuple("Reply").field(reply).finish(),
            Outcome::Failed(failure) => f.debug_tuple("Failed").field(failure).finish(),
            Outcome::Deferred(_) => write!(f, "Deferred(..)"),
        }
    }
}

impl From<()> for Outcome {
    fn from(_: ()) -> Self {
        Outcome::Empty
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Reply(Reply::Plain(value))
    }
}

impl From<Response> for Outcome {
    fn from(response: Response) -> Self {
        Outcome::Reply(Reply::Response(response))
    }
}

impl From<Reply> for Outcome {
    fn from(reply: Reply) -> Self {
        Outcome::Reply(reply)
    }
}

impl From<&str> for Outcome {
    fn from(value: &str) -> Self {
        Outcome::Reply(Reply::from(value))
    }
}

impl From<String> for Outcome {
    fn from(value: String) -> Self {
        Outcome::Reply(Reply::from(value))
    }
}

impl From<Failure> for Outcome {
    fn from(failure: Failure) -> Self {
        Outcome::Failed(failure)
    }
}

impl<T: Into<Outcome>> From<Option<T>> for Outcome {
    fn from(value: Option<T>) -> Self {
        value.map_or(Outcome::Empty, Into::into)
    }
}

impl<T, E> From<Result<T, E>> for Outcome
where
    T: Into<Outcome>,
    E: Into<Failure>,
{
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => value.into(),
            Err(err) => Outcome::Failed(err.into()),
        }
    }
}

/// Business logic for one declared method.
///
/// Any `Fn(Context) -> R` closure whose result converts into an [`Outcome`]
/// implements this, so plain, fallible and deferred methods all register the same way:
///
/// ```rust,ignore
/// table.insert("list", |_ctx: Context| json!({"message": "Listing"}));
/// table.insert("get", |ctx: Context| -> Result<Value, Failure> { lookup(ctx.call().request()) });
/// table.insert("slow", |_ctx: Context| Outcome::deferred(async { fetch().await }));
/// ```
pub trait ServiceMethod: Send + Sync + 'static {
    fn call(&self, ctx: Context) -> Outcome;
}

impl<F, R> ServiceMethod for F
where
    F: Fn(Context) -> R + Send + Sync + 'static,
    R: Into<Outcome>,
{
    fn call(&self, ctx: Context) -> Outcome {
        self(ctx).into()
    }
}

/// Placeholder for declared methods the implementation does not provide.
pub(crate) struct Unimplemented {
    pub(crate) method_full_name: String,
}

impl ServiceMethod for Unimplemented {
    fn call(&self, _ctx: Context) -> Outcome {
        Outcome::Failed(Failure::unimplemented(&self.method_full_name))
    }
}

/// Invoke business logic and normalize whatever it produced.
///
/// Panics, both while calling the method and while awaiting a deferred result,
/// are converted into failures.
pub(crate) async fn normalize(method: &dyn ServiceMethod, ctx: Context) -> Result<Reply, Failure> {
    let called = std::panic::catch_unwind(AssertUnwindSafe(|| method.call(ctx)));
    let mut outcome = called.unwrap_or_else(|panic| Outcome::Failed(Failure::from_panic(panic)));

    loop {
        match outcome {
            Outcome::Empty => return Ok(Reply::empty()),
            Outcome::Reply(reply) => return Ok(reply),
            Outcome::Failed(failure) => return Err(failure),
            Outcome::Deferred(pending) => {
                debug!("service method deferred its result");
                let settled = AssertUnwindSafe(pending).catch_unwind().await;
                outcome =
                    settled.unwrap_or_else(|panic| Outcome::Failed(Failure::from_panic(panic)));
            }
        }
    }
}
