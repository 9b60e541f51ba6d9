//! # Service Module
//!
//! Service definitions as handed over by the registry, and the normalization of
//! business-logic results.
//!
//! ## Service definitions
//!
//! A [`ServiceDefinition`] names a qualified service (`testapp.PersonService`),
//! lists its declared [`MethodDescriptor`]s and carries an implementation. The
//! implementation is looked up structurally, one method name at a time, through
//! [`ServiceImplementation`]; [`MethodTable`] is the ready-made record of closures.
//!
//! ```rust,ignore
//! let people = MethodTable::new()
//!     .with("list", |_ctx: Context| json!({"message": "Listing"}))
//!     .with("get", |ctx: Context| Outcome::deferred(load_person(ctx)));
//!
//! let definition = ServiceDefinition::new("testapp.PersonService", people)
//!     .unary("list")
//!     .unary("get");
//! ```
//!
//! ## Result normalization
//!
//! Business logic may return a value, nothing, a failure, or a deferred result.
//! All of them are folded into an [`Outcome`] and then into a single
//! `Result<Reply, Failure>` before the chain decides anything about the response:
//!
//! | Business logic returns | Normalized |
//! |---|---|
//! | `Value`, `Response`, `&str` | `Ok(reply)` |
//! | `()` / `None` | `Ok({})` |
//! | `Err(e)` / panic | `Err(failure)` |
//! | `Outcome::deferred(fut)` | awaited, then one of the above |

mod definition;
mod outcome;

pub use self::definition::{
    MethodDescriptor, MethodKind, MethodTable, ServiceDefinition, ServiceImplementation,
};
pub use self::outcome::{Outcome, ServiceMethod};

pub(crate) use self::outcome::{normalize, Unimplemented};
