use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::chain;
use crate::context::{Call, CallEvent, CallStream, Context, MethodProperties};
use crate::failure::Failure;
use crate::middleware::{ErrorHandler, Middleware};
use crate::service::{MethodKind, ServiceMethod};

/// Single-shot completion callback supplied by the transport for calls that
/// end in one response message.
pub type Callback = Box<dyn FnOnce(Result<Value, Failure>) + Send>;

/// Everything fixed at build time for one declared method.
struct MethodRoute {
    properties: Arc<MethodProperties>,
    kind: MethodKind,
    middleware: Arc<[Arc<dyn Middleware>]>,
    error_handlers: Arc<[Arc<dyn ErrorHandler>]>,
    method: Arc<dyn ServiceMethod>,
}

/// Entry point the transport calls for one declared method.
///
/// Cheap to clone; clones share the pre-filtered middleware and error-handler
/// lists assembled when the registry was built.
#[derive(Clone)]
pub struct MethodDispatcher {
    route: Arc<MethodRoute>,
}

impl MethodDispatcher {
    pub(crate) fn new(
        properties: MethodProperties,
        kind: MethodKind,
        middleware: Vec<Arc<dyn Middleware>>,
        error_handlers: Vec<Arc<dyn ErrorHandler>>,
        method: Arc<dyn ServiceMethod>,
    ) -> Self {
        Self {
            route: Arc::new(MethodRoute {
                properties: Arc::new(properties),
                kind,
                middleware: middleware.into(),
                error_handlers: error_handlers.into(),
                method,
            }),
        }
    }

    /// Names of the method this dispatcher serves
    #[must_use]
    pub fn properties(&self) -> &MethodProperties {
        &self.route.properties
    }

    /// Streaming shape, which decides whether the transport passes a callback
    #[must_use]
    pub fn kind(&self) -> MethodKind {
        self.route.kind
    }

    /// Number of middleware stages selected for this method
    #[must_use]
    pub fn middleware_count(&self) -> usize {
        self.route.middleware.len()
    }

    /// Number of error handlers selected for this method
    #[must_use]
    pub fn error_handler_count(&self) -> usize {
        self.route.error_handlers.len()
    }

    /// Run a call and resolve to its single outcome, converted to wire form.
    pub fn call(&self, call: Call) -> impl Future<Output = Result<Value, Failure>> + Send + 'static {
        let route = Arc::clone(&self.route);
        async move {
            let ctx = Context::new(call, Arc::clone(&route.properties));
            let call_id = ctx.id();
            debug!(
                call_id = %call_id,
                method = %route.properties.method_full_name,
                middleware_count = route.middleware.len(),
                error_handler_count = route.error_handlers.len(),
                "Call dispatched"
            );

            let result = chain::execute(
                ctx.clone(),
                Arc::clone(&route.middleware),
                Arc::clone(&route.error_handlers),
                Arc::clone(&route.method),
            )
            .await;

            let latency_ms = ctx.elapsed().as_millis() as u64;
            match &result {
                Ok(_) => info!(
                    call_id = %call_id,
                    method = %route.properties.method_full_name,
                    latency_ms,
                    "Call completed"
                ),
                Err(failure) => info!(
                    call_id = %call_id,
                    method = %route.properties.method_full_name,
                    latency_ms,
                    code = ?failure.code(),
                    error = %failure,
                    "Call failed"
                ),
            }
            result.map(|reply| reply.into_wire())
        }
    }

    /// Run a call and deliver its outcome.
    ///
    /// With a callback, the outcome goes to the callback exactly once. Without one
    /// (streaming calls), a failure is emitted once as [`CallEvent::Error`] on the
    /// call's stream; a successful outcome is not emitted, since streaming methods
    /// write their own messages. The returned future completes after delivery.
    pub fn invoke(&self, call: Call, callback: Option<Callback>) -> BoxFuture<'static, ()> {
        let stream = call.stream().map(Arc::clone);
        let method = self.route.properties.method_full_name.clone();
        let outcome = self.call(call);
        async move {
            let result = outcome.await;
            match callback {
                Some(callback) => callback(result),
                None => {
                    if let Err(failure) = result {
                        report(stream.as_deref(), &method, failure);
                    }
                }
            }
        }
        .boxed()
    }
}

/// Signal a failure on the call's stream; there is no other channel for it.
fn report(stream: Option<&dyn CallStream>, method: &str, failure: Failure) {
    match stream {
        Some(stream) => stream.emit(CallEvent::Error(failure)),
        None => warn!(
            method = %method,
            error = %failure,
            "Call failed with neither a callback nor a stream to report on"
        ),
    }
}

impl std::fmt::Debug for MethodDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDispatcher")
            .field("method", &self.route.properties.method_full_name)
            .field("kind", &self.route.kind)
            .field("middleware_count", &self.middleware_count())
            .field("error_handler_count", &self.error_handler_count())
            .finish()
    }
}

/// The dispatchers of one service, keyed by bare method name.
#[derive(Debug, Clone)]
pub struct ServiceDispatcher {
    service_full_name: String,
    methods: HashMap<String, MethodDispatcher>,
}

impl ServiceDispatcher {
    pub(crate) fn new(service_full_name: impl Into<String>) -> Self {
        Self {
            service_full_name: service_full_name.into(),
            methods: HashMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, dispatcher: MethodDispatcher) {
        self.methods
            .insert(dispatcher.properties().method_name.clone(), dispatcher);
    }

    #[must_use]
    pub fn service_full_name(&self) -> &str {
        &self.service_full_name
    }

    /// Dispatcher for a bare method name (`list`)
    #[must_use]
    pub fn get(&self, method_name: &str) -> Option<&MethodDispatcher> {
        self.methods.get(method_name)
    }

    /// Method names and their dispatchers, in no particular order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MethodDispatcher)> {
        self.methods.iter().map(|(name, d)| (name.as_str(), d))
    }

    /// Number of declared methods
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }

    /// Run a call against `method_name`; an undeclared name fails as unimplemented.
    pub fn call(&self, method_name: &str, call: Call) -> BoxFuture<'static, Result<Value, Failure>> {
        match self.methods.get(method_name) {
            Some(dispatcher) => dispatcher.call(call).boxed(),
            None => {
                let failure = self.undeclared(method_name);
                futures::future::ready(Err(failure)).boxed()
            }
        }
    }

    /// [`MethodDispatcher::invoke`] by method name; an undeclared name is
    /// delivered as an unimplemented failure the same way.
    pub fn invoke(
        &self,
        method_name: &str,
        call: Call,
        callback: Option<Callback>,
    ) -> BoxFuture<'static, ()> {
        if let Some(dispatcher) = self.methods.get(method_name) {
            return dispatcher.invoke(call, callback);
        }
        let failure = self.undeclared(method_name);
        let method = format!("{}.{method_name}", self.service_full_name);
        let stream = call.stream().map(Arc::clone);
        async move {
            match callback {
                Some(callback) => callback(Err(failure)),
                None => report(stream.as_deref(), &method, failure),
            }
        }
        .boxed()
    }

    fn undeclared(&self, method_name: &str) -> Failure {
        let full_name = format!("{}.{method_name}", self.service_full_name);
        warn!(method = %full_name, "Call to undeclared method");
        Failure::unimplemented(&full_name)
    }
}
