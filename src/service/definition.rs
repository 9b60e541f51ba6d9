use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::outcome::ServiceMethod;
use crate::context::MethodProperties;

/// Streaming shape of a declared method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MethodKind {
    Unary,
    ClientStreaming,
    ServerStreaming,
    Bidirectional,
}

impl MethodKind {
    /// Whether the transport hands this kind of call a completion callback.
    ///
    /// Calls that end in a single response message (unary and client-streaming)
    /// are answered through the callback; the others are answered on the call's stream.
    #[must_use]
    pub fn responds_with_callback(self) -> bool {
        matches!(self, MethodKind::Unary | MethodKind::ClientStreaming)
    }

    #[must_use]
    pub fn is_streaming(self) -> bool {
        !matches!(self, MethodKind::Unary)
    }
}

/// One method declared by a service's interface description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    pub kind: MethodKind,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>, kind: MethodKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn unary(name: impl Into<String>) -> Self {
        Self::new(name, MethodKind::Unary)
    }
}

/// Structural lookup of business logic by method name.
///
/// Nothing about how the implementation was assembled matters: a plain table of
/// closures, a table inheriting from a base implementation, or a hand-written type
/// answering by name all work the same.
pub trait ServiceImplementation: Send + Sync {
    fn method(&self, name: &str) -> Option<Arc<dyn ServiceMethod>>;
}

impl<T: ServiceImplementation + ?Sized> ServiceImplementation for Arc<T> {
    fn method(&self, name: &str) -> Option<Arc<dyn ServiceMethod>> {
        (**self).method(name)
    }
}

impl ServiceImplementation for HashMap<String, Arc<dyn ServiceMethod>> {
    fn method(&self, name: &str) -> Option<Arc<dyn ServiceMethod>> {
        self.get(name).map(Arc::clone)
    }
}

/// A record of named service methods, optionally layered over a base implementation.
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Arc<dyn ServiceMethod>>,
    base: Option<Arc<dyn ServiceImplementation>>,
}

impl MethodTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A table that falls back to `base` for names it does not define itself
    #[must_use]
    pub fn inherit(base: Arc<dyn ServiceImplementation>) -> Self {
        Self {
            methods: HashMap::new(),
            base: Some(base),
        }
    }

    /// Define (or override) a method
    pub fn insert(&mut self, name: impl Into<String>, method: impl ServiceMethod) {
        self.methods.insert(name.into(), Arc::new(method));
    }

    #[must_use]
    pub fn with(mut self, name: impl Into<String>, method: impl ServiceMethod) -> Self {
        self.insert(name, method);
        self
    }

    /// Names defined directly on this table (not inherited ones)
    pub fn own_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }
}

impl ServiceImplementation for MethodTable {
    fn method(&self, name: &str) -> Option<Arc<dyn ServiceMethod>> {
        self.methods
            .get(name)
            .map(Arc::clone)
            .or_else(|| self.base.as_ref().and_then(|base| base.method(name)))
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.own_names().collect();
        names.sort_unstable();
        f.debug_struct("MethodTable")
            .field("methods", &names)
            .field("inherits", &self.base.is_some())
            .finish()
    }
}

/// A service as the registry receives it: qualified name, declared methods and implementation.
#[derive(Clone)]
pub struct ServiceDefinition {
    service_full_name: String,
    methods: Vec<MethodDescriptor>,
    implementation: Arc<dyn ServiceImplementation>,
}

impl ServiceDefinition {
    pub fn new(
        service_full_name: impl Into<String>,
        implementation: impl ServiceImplementation + 'static,
    ) -> Self {
        Self {
            service_full_name: service_full_name.into(),
            methods: Vec::new(),
            implementation: Arc::new(implementation),
        }
    }

    /// Declare a method
    #[must_use]
    pub fn with_method(mut self, descriptor: MethodDescriptor) -> Self {
        self.methods.push(descriptor);
        self
    }

    /// Declare a unary method
    #[must_use]
    pub fn unary(self, name: impl Into<String>) -> Self {
        self.with_method(MethodDescriptor::unary(name))
    }

    #[must_use]
    pub fn service_full_name(&self) -> &str {
        &self.service_full_name
    }

    #[must_use]
    pub fn service_name(&self) -> &str {
        self.service_full_name
            .rsplit_once('.')
            .map_or(self.service_full_name.as_str(), |(_, name)| name)
    }

    #[must_use]
    pub fn package_name(&self) -> &str {
        self.service_full_name
            .rsplit_once('.')
            .map_or("", |(package, _)| package)
    }

    #[must_use]
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    #[must_use]
    pub fn implementation(&self) -> &Arc<dyn ServiceImplementation> {
        &self.implementation
    }

    #[must_use]
    pub fn method_properties(&self, method_name: &str) -> MethodProperties {
        MethodProperties::new(&self.service_full_name, method_name)
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("service_full_name", &self.service_full_name)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}
