//! # Failure Module
//!
//! Every invocation resolves to exactly one response or exactly one [`Failure`].
//! A failure is a cheap-clone value: clones share one allocation, which is how the
//! chain executor tells a stage that re-raises the failure it received from its
//! continuation apart from a stage that fails on its own.
//!
//! ## Taxonomy
//!
//! The first time a failure enters error handling the executor stamps it with a
//! [`FailureOrigin`]:
//!
//! - [`FailureOrigin::BusinessLogic`] - the service method failed (returned, deferred or panicked)
//! - [`FailureOrigin::Middleware`] - a stage's own body failed
//! - [`FailureOrigin::Handler`] - an error handler's own body failed
//! - [`FailureOrigin::UnresolvedResponse`] - the synthetic "no response" failure
//!
//! The origin is diagnostic only; it does not take part in equality.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, OnceLock};

/// Code carried by the synthetic failure raised when a chain settles with
/// neither a response nor a propagated failure (gRPC `UNKNOWN`).
pub const UNRESOLVED_RESPONSE_CODE: u32 = 2;

/// Code carried by calls to declared methods the implementation does not provide
/// (gRPC `UNIMPLEMENTED`).
pub const UNIMPLEMENTED_CODE: u32 = 12;

const NO_RESPONSE_MESSAGE: &str = "No response sent after handling error";

/// Where a failure first entered error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOrigin {
    /// The service method returned, deferred or panicked with a failure
    BusinessLogic,
    /// A middleware stage's own body failed, or the stage passed a failure to its continuation
    Middleware {
        /// Position of the stage in the call's filtered middleware list
        index: usize,
    },
    /// An error handler's own body failed without invoking its continuation
    Handler {
        /// Position of the handler in the call's filtered error-handler list
        index: usize,
    },
    /// Synthetic failure: the chain settled without a response
    UnresolvedResponse,
}

impl fmt::Display for FailureOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureOrigin::BusinessLogic => write!(f, "business_logic"),
            FailureOrigin::Middleware { index } => write!(f, "middleware[{index}]"),
            FailureOrigin::Handler { index } => write!(f, "error_handler[{index}]"),
            FailureOrigin::UnresolvedResponse => write!(f, "unresolved_response"),
        }
    }
}

struct FailureInner {
    message: String,
    code: Option<u32>,
    origin: OnceLock<FailureOrigin>,
}

/// A call failure delivered to the transport in place of a response.
#[derive(Clone)]
pub struct Failure {
    inner: Arc<FailureInner>,
}

impl Failure {
    /// Create a failure with a message and no code
    pub fn new(message: impl Into<String>) -> Self {
        Self::build(message.into(), None)
    }

    /// Create a failure carrying a numeric status code
    pub fn with_code(code: u32, message: impl Into<String>) -> Self {
        Self::build(message.into(), Some(code))
    }

    /// The synthetic failure for a chain that settled without a response.
    #[must_use]
    pub fn no_response() -> Self {
        let failure = Self::with_code(UNRESOLVED_RESPONSE_CODE, NO_RESPONSE_MESSAGE);
        failure.mark_origin(FailureOrigin::UnresolvedResponse);
        failure
    }

    /// Failure for a declared method with no implementation behind it.
    #[must_use]
    pub fn unimplemented(method_full_name: &str) -> Self {
        Self::with_code(
            UNIMPLEMENTED_CODE,
            format!("Method not implemented: {method_full_name}"),
        )
    }

    /// Convert a caught panic payload into a failure.
    #[must_use]
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self::new(format!("panicked: {message}"))
    }

    fn build(message: String, code: Option<u32>) -> Self {
        Self {
            inner: Arc::new(FailureInner {
                message,
                code,
                origin: OnceLock::new(),
            }),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.inner.message
    }

    #[must_use]
    pub fn code(&self) -> Option<u32> {
        self.inner.code
    }

    /// Where this failure first entered error handling, if it has.
    #[must_use]
    pub fn origin(&self) -> Option<FailureOrigin> {
        self.inner.origin.get().copied()
    }

    /// True when this is the synthetic "no response" failure.
    #[must_use]
    pub fn is_unresolved_response(&self) -> bool {
        self.origin() == Some(FailureOrigin::UnresolvedResponse)
    }

    /// Whether `other` is a clone of this very failure (not merely equal to it).
    #[must_use]
    pub fn same_as(&self, other: &Failure) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Record the origin; the first recorded origin wins.
    pub(crate) fn mark_origin(&self, origin: FailureOrigin) {
        self.inner.origin.get_or_init(|| origin);
    }
}

impl PartialEq for Failure {
    fn eq(&self, other: &Self) -> bool {
        self.inner.message == other.inner.message && self.inner.code == other.inner.code
    }
}

impl Eq for Failure {}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("message", &self.inner.message)
            .field("code", &self.inner.code)
            .field("origin", &self.origin())
            .finish()
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.code {
            Some(code) => write!(f, "{} (code {code})", self.inner.message),
            None => write!(f, "{}", self.inner.message),
        }
    }
}

impl std::error::Error for Failure {}

impl From<&str> for Failure {
    fn from(message: &str) -> Self {
        Failure::new(message)
    }
}

impl From<String> for Failure {
    fn from(message: String) -> Self {
        Failure::new(message)
    }
}

impl From<anyhow::Error> for Failure {
    fn from(err: anyhow::Error) -> Self {
        Failure::new(format!("{err:#}"))
    }
}

impl From<serde_json::Error> for Failure {
    fn from(err: serde_json::Error) -> Self {
        Failure::new(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equality_ignores_identity_and_origin() {
        let a = Failure::new("Error");
        let b = Failure::new("Error");
        a.mark_origin(FailureOrigin::BusinessLogic);
        assert_eq!(a, b);
        assert!(!a.same_as(&b));
        assert!(a.same_as(&a.clone()));
    }

    #[test]
    fn first_origin_wins() {
        let failure = Failure::new("boom");
        failure.mark_origin(FailureOrigin::Middleware { index: 1 });
        failure.mark_origin(FailureOrigin::Handler { index: 0 });
        assert_eq!(failure.origin(), Some(FailureOrigin::Middleware { index: 1 }));
    }

    #[test]
    fn synthetic_failure_shape() {
        let failure = Failure::no_response();
        assert_eq!(failure.message(), "No response sent after handling error");
        assert_eq!(failure.code(), Some(UNRESOLVED_RESPONSE_CODE));
        assert!(failure.is_unresolved_response());
        assert_eq!(
            failure,
            Failure::with_code(2, "No response sent after handling error")
        );
    }

    #[test]
    fn panic_payloads_become_messages() {
        let caught = std::panic::catch_unwind(|| panic!("kaboom")).unwrap_err();
        assert_eq!(Failure::from_panic(caught).message(), "panicked: kaboom");
    }
}
