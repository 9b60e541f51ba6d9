use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::Serialize;

use super::call::Call;
use crate::ids::CallId;
use crate::response::Reply;

/// Names derived from a service definition for one declared method.
///
/// Fixed at dispatcher construction and shared read-only by every call to the method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodProperties {
    /// Bare method name (`list`)
    pub method_name: String,
    /// Qualified method name (`testapp.PersonService.list`)
    pub method_full_name: String,
    /// Bare service name (`PersonService`)
    pub service_name: String,
    /// Qualified service name (`testapp.PersonService`)
    pub service_full_name: String,
    /// Package name (`testapp`); empty for an unpackaged service
    pub package_name: String,
}

impl MethodProperties {
    /// Derive all names from a qualified service name and a method name
    #[must_use]
    pub fn new(service_full_name: &str, method_name: &str) -> Self {
        let (package_name, service_name) = match service_full_name.rsplit_once('.') {
            Some((package, service)) => (package, service),
            None => ("", service_full_name),
        };
        Self {
            method_name: method_name.to_string(),
            method_full_name: format!("{service_full_name}.{method_name}"),
            service_name: service_name.to_string(),
            service_full_name: service_full_name.to_string(),
            package_name: package_name.to_string(),
        }
    }
}

struct ContextInner {
    call: Call,
    properties: Arc<MethodProperties>,
    reply: Mutex<Option<Reply>>,
    started: Instant,
}

/// Per-call state handed to every stage, handler and the service method.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    pub(crate) fn new(call: Call, properties: Arc<MethodProperties>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                call,
                properties,
                reply: Mutex::new(None),
                started: Instant::now(),
            }),
        }
    }

    /// The call as the transport handed it over
    #[must_use]
    pub fn call(&self) -> &Call {
        &self.inner.call
    }

    /// Names of the method being called
    #[must_use]
    pub fn properties(&self) -> &MethodProperties {
        &self.inner.properties
    }

    /// The call's id, as logged on every line about it
    #[must_use]
    pub fn id(&self) -> CallId {
        self.inner.call.id()
    }

    /// Time since the dispatcher accepted the call
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.inner.started.elapsed()
    }

    /// Set the response. Later sends replace earlier ones.
    pub fn send(&self, value: impl Into<Reply>) {
        *self.inner.reply.lock() = Some(value.into());
    }

    /// Whether a response has been sent
    #[must_use]
    pub fn responded(&self) -> bool {
        self.inner.reply.lock().is_some()
    }

    /// The response sent so far, if any
    #[must_use]
    pub fn value(&self) -> Option<Reply> {
        self.inner.reply.lock().clone()
    }

    /// Send only when nothing has been sent yet. Returns whether the value was stored.
    pub(crate) fn send_if_unset(&self, value: Reply) -> bool {
        let mut slot = self.inner.reply.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    pub(crate) fn take_reply(&self) -> Option<Reply> {
        self.inner.reply.lock().take()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("call", &self.inner.call)
            .field("properties", &self.inner.properties)
            .field("responded", &self.responded())
            .finish()
    }
}
