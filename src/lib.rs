//! # brrtrpc
//!
//! **brrtrpc** is the dispatch core of an RPC server: it runs every call through
//! scoped middleware, the service method, and a chain of error handlers, and
//! delivers exactly one response or exactly one failure per call.
//!
//! ## Overview
//!
//! The crate sits between a transport (which decodes calls off the wire) and
//! your business logic. Services, middleware and error handlers are registered
//! once; the registry freezes them into per-method dispatchers with the
//! applicable middleware and handlers already selected. Nothing here touches
//! sockets or wire bytes.
//!
//! ## Architecture
//!
//! - **[`registry`]** - registration and the immutable snapshot of dispatchers
//! - **[`scope`]** - which middleware and handlers apply to which method
//! - **[`dispatcher`]** - per-method entry points used by the transport
//! - **[`chain`]** - the interceptor and error-handling state machine
//! - **[`context`]** - per-call state and the response slot
//! - **[`service`]** - service definitions and business-logic result normalization
//! - **[`middleware`]** - stage and handler contracts, built-in tracing and metrics
//! - **[`failure`]** / **[`response`]** - the two possible outcomes of a call
//! - **[`server`]** - options, TLS credential loading and the transport seam
//! - **[`logging`]** - `tracing-subscriber` initialization
//!
//! ### Call Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Transport
//!     participant Dispatcher as MethodDispatcher
//!     participant Chain as Chain executor
//!     participant MW as Middleware[0..n)
//!     participant Method as Service method
//!     participant EH as ErrorHandler[0..m)
//!
//!     Transport->>Dispatcher: invoke(call, callback?)
//!     Dispatcher->>Chain: execute(context)
//!     Chain->>MW: handle(ctx, next)
//!     MW->>Chain: next.run()
//!     Chain->>Method: call(ctx)
//!     Method-->>Chain: value / () / Err / deferred
//!
//!     alt failure (method, stage, or next.fail)
//!         Chain->>EH: handle(failure, ctx, next)
//!         alt recovered
//!             EH->>Chain: next.resume()
//!         else forwarded
//!             EH->>Chain: next.forward(failure)
//!         end
//!     end
//!
//!     Chain-->>Dispatcher: response, failure, or "no response" (code 2)
//!     Dispatcher-->>Transport: callback(result) / stream error event
//! ```
//!
//! ### Key Guarantees
//!
//! 1. **Exactly once**: every call ends in one response or one failure
//! 2. **Registration order**: matching stages run in the order they were registered
//! 3. **Fire-and-forget safe**: a stage that drops its continuation's handle does
//!    not end the call early; the call settles when all started work has settled
//! 4. **One warning per failure**: each entry into error handling logs one warning
//! 5. **No panics escape**: panicking stages, handlers and methods become failures
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use brrtrpc::prelude::*;
//! use serde_json::json;
//!
//! let people = MethodTable::new()
//!     .with("list", |_ctx: Context| json!({"message": "Listing"}));
//!
//! let registry = RegistryBuilder::new()
//!     .add_service(ServiceDefinition::new("testapp.PersonService", people).unary("list"))
//!     .use_middleware(TracingMiddleware)
//!     .add_error_handler(|failure: Failure, _ctx: Context, next: ErrorNext| next.forward(failure))
//!     .build()?;
//!
//! let list = registry.method("testapp.PersonService.list").expect("declared");
//! assert_eq!(list.call(Call::new(json!({"a": 1}))).await?, json!({"message": "Listing"}));
//! ```
//!
//! ## Runtime Considerations
//!
//! The core is runtime-agnostic: it is built on `futures` and never spawns onto
//! an executor. Each call drives its own work on the task that awaits it, so
//! there is no parallelism within a call and no shared mutable state between
//! calls. Timeouts and cancellation belong to the transport.

pub mod chain;
pub mod context;
pub mod dispatcher;
pub mod failure;
pub mod ids;
pub mod logging;
pub mod middleware;
pub mod registry;
pub mod response;
pub mod scope;
pub mod server;
pub mod service;

pub use chain::{ErrorNext, Next, Settlement};
pub use context::{Call, CallEvent, CallStream, Context, MethodProperties};
pub use dispatcher::{Callback, MethodDispatcher, ServiceDispatcher};
pub use failure::{Failure, FailureOrigin};
pub use registry::{Registry, RegistryBuilder, RegistryError};
pub use response::{Reply, Response};
pub use service::{MethodKind, MethodTable, Outcome, ServiceDefinition};

/// The types most services need
pub mod prelude {
    pub use crate::chain::{ErrorNext, Next};
    pub use crate::context::{Call, Context};
    pub use crate::failure::Failure;
    pub use crate::middleware::{ErrorHandler, MetricsMiddleware, Middleware, TracingMiddleware};
    pub use crate::registry::RegistryBuilder;
    pub use crate::response::Response;
    pub use crate::service::{MethodDescriptor, MethodKind, MethodTable, Outcome, ServiceDefinition};
}
