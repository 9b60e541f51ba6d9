//! # Scope Matching
//!
//! Decides which registered middleware and error handlers apply to a call.
//!
//! A registration's scope is one of:
//!
//! - absent: global, applies to every call
//! - a package name (`testapp`)
//! - a qualified service name (`testapp.PersonService`)
//! - a qualified method name (`testapp.PersonService.list`)
//!
//! Matching is exact against those four forms; there is no prefix matching, so a
//! scope of `testapp` does not select calls in package `testapp.greeter`.
//! Selection keeps registration order: entries are never reordered by how
//! specific their scope is.

use crate::context::MethodProperties;

/// `true` when a registration with `pattern` applies to a call of the method described by `properties`.
///
/// An empty pattern never matches, not even an unpackaged service whose package name is empty.
#[must_use]
pub fn matches(pattern: Option<&str>, properties: &MethodProperties) -> bool {
    match pattern {
        None => true,
        Some("") => false,
        Some(p) => {
            p == properties.package_name
                || p == properties.service_full_name
                || p == properties.method_full_name
        }
    }
}

/// A registered entry and the scope it was registered under.
#[derive(Debug, Clone)]
pub struct Scoped<T> {
    scope: Option<String>,
    entry: T,
}

impl<T> Scoped<T> {
    /// An entry applying to every call
    pub fn global(entry: T) -> Self {
        Self { scope: None, entry }
    }

    /// An entry applying to calls within a package, service or method
    pub fn scoped(scope: impl Into<String>, entry: T) -> Self {
        Self {
            scope: Some(scope.into()),
            entry,
        }
    }

    /// The registered scope; `None` for a global entry
    #[must_use]
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// The registered middleware or handler
    pub fn entry(&self) -> &T {
        &self.entry
    }

    /// Whether this entry is selected for the method described by `properties`
    #[must_use]
    pub fn applies_to(&self, properties: &MethodProperties) -> bool {
        matches(self.scope(), properties)
    }
}

/// Entries applying to `properties`, in registration order.
#[must_use]
pub fn select<T: Clone>(entries: &[Scoped<T>], properties: &MethodProperties) -> Vec<T> {
    entries
        .iter()
        .filter(|scoped| scoped.applies_to(properties))
        .map(|scoped| scoped.entry.clone())
        .collect()
}
