//! # Dispatcher Module
//!
//! The per-method entry points handed to the transport.
//!
//! ## Overview
//!
//! The registry builds one [`MethodDispatcher`] per declared method and collects
//! the dispatchers of each service into a [`ServiceDispatcher`] keyed by method
//! name. The transport attaches those maps to whatever it binds and calls
//! [`MethodDispatcher::invoke`] for every incoming call.
//!
//! ## Call Flow
//!
//! 1. The transport decodes a call and picks the method's dispatcher
//! 2. The dispatcher creates the call's [`Context`](crate::context::Context)
//! 3. The chain runs the method's pre-filtered middleware, the service method
//!    and, on failure, its error handlers
//! 4. The single outcome is delivered:
//!    - unary and client-streaming calls: through the [`Callback`]
//!    - server-streaming and bidirectional calls: a failure is emitted as a
//!      [`CallEvent::Error`](crate::context::CallEvent) on the call's stream
//!
//! ```rust,ignore
//! let list = service.get("list").expect("declared");
//! list.invoke(
//!     Call::new(json!({"a": 1})),
//!     Some(Box::new(|result| match result {
//!         Ok(value) => println!("{value}"),
//!         Err(failure) => eprintln!("{failure}"),
//!     })),
//! )
//! .await;
//! ```
//!
//! ## Error Handling
//!
//! Nothing a stage, handler or service method does can fail the dispatcher:
//! failures and panics become the call's failure outcome, and a call that
//! settles with neither a response nor a failure ends with the synthetic
//! "no response" failure (code 2).

mod core;

pub use self::core::{Callback, MethodDispatcher, ServiceDispatcher};
