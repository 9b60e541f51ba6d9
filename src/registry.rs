//! # Registry Module
//!
//! Collects services, middleware and error handlers, and freezes them into an
//! immutable [`Registry`] of dispatchers.
//!
//! Registration happens once, before serving, through [`RegistryBuilder`]:
//!
//! ```rust,ignore
//! let registry = RegistryBuilder::new()
//!     .add_service(ServiceDefinition::new("testapp.PersonService", people).unary("list"))
//!     .use_middleware(TracingMiddleware)
//!     .use_middleware_for("testapp.PersonService.list", audit)
//!     .add_error_handler(report_failures)
//!     .build()?;
//! ```
//!
//! `build` filters the middleware and error handlers for every declared method
//! (see [`crate::scope`]) so the dispatch path never evaluates a scope.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dispatcher::{MethodDispatcher, ServiceDispatcher};
use crate::middleware::{ErrorHandler, Middleware};
use crate::scope::{self, Scoped};
use crate::service::{ServiceDefinition, ServiceMethod, Unimplemented};

/// Registration error returned by [`RegistryBuilder::build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No service was added
    NoServices,
    /// Two services share a qualified name
    DuplicateService {
        /// The repeated qualified service name
        service: String,
    },
    /// A service declares the same method twice
    DuplicateMethod {
        /// Qualified service name
        service: String,
        /// The repeated method name
        method: String,
    },
    /// A middleware or error handler was registered with an empty scope string
    EmptyScope {
        /// `"middleware"` or `"error handler"`
        kind: &'static str,
        /// Registration position within its list
        position: usize,
    },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NoServices => write!(f, "No services have been defined"),
            RegistryError::DuplicateService { service } => {
                write!(f, "Service '{service}' is defined more than once")
            }
            RegistryError::DuplicateMethod { service, method } => {
                write!(f, "Method '{method}' is declared more than once on service '{service}'")
            }
            RegistryError::EmptyScope { kind, position } => {
                write!(
                    f,
                    "Empty scope for {kind} #{position}; omit the scope to register globally"
                )
            }
        }
    }
}

impl std::error::Error for RegistryError {}

/// Mutable collection of registrations; consumed by [`RegistryBuilder::build`].
#[derive(Default)]
pub struct RegistryBuilder {
    services: Vec<ServiceDefinition>,
    middleware: Vec<Scoped<Arc<dyn Middleware>>>,
    error_handlers: Vec<Scoped<Arc<dyn ErrorHandler>>>,
}

impl RegistryBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_service(mut self, service: ServiceDefinition) -> Self {
        self.services.push(service);
        self
    }

    /// Register a middleware stage for every call
    #[must_use]
    pub fn use_middleware(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Scoped::global(Arc::new(middleware)));
        self
    }

    /// Register a middleware stage for calls within `scope`
    /// (package, qualified service or qualified method name)
    #[must_use]
    pub fn use_middleware_for(
        mut self,
        scope: impl Into<String>,
        middleware: impl Middleware,
    ) -> Self {
        self.middleware
            .push(Scoped::scoped(scope, Arc::new(middleware)));
        self
    }

    /// Register an error handler for every call
    #[must_use]
    pub fn add_error_handler(mut self, handler: impl ErrorHandler) -> Self {
        self.error_handlers.push(Scoped::global(Arc::new(handler)));
        self
    }

    /// Register an error handler for calls within `scope`
    #[must_use]
    pub fn add_error_handler_for(
        mut self,
        scope: impl Into<String>,
        handler: impl ErrorHandler,
    ) -> Self {
        self.error_handlers
            .push(Scoped::scoped(scope, Arc::new(handler)));
        self
    }

    /// Validate the registrations and assemble one dispatcher per declared method.
    ///
    /// # Errors
    ///
    /// See [`RegistryError`].
    pub fn build(self) -> Result<Registry, RegistryError> {
        self.validate()?;

        let mut dispatchers = Vec::with_capacity(self.services.len());
        for service in &self.services {
            let mut methods = ServiceDispatcher::new(service.service_full_name());
            for descriptor in service.methods() {
                let properties = service.method_properties(&descriptor.name);
                let implementation: Arc<dyn ServiceMethod> =
                    match service.implementation().method(&descriptor.name) {
                        Some(method) => method,
                        None => {
                            warn!(
                                method = %properties.method_full_name,
                                "Declared method has no implementation; calls will fail as unimplemented"
                            );
                            Arc::new(Unimplemented {
                                method_full_name: properties.method_full_name.clone(),
                            })
                        }
                    };
                let middleware = scope::select(&self.middleware, &properties);
                let error_handlers = scope::select(&self.error_handlers, &properties);
                debug!(
                    method = %properties.method_full_name,
                    kind = ?descriptor.kind,
                    middleware_count = middleware.len(),
                    error_handler_count = error_handlers.len(),
                    "Method registered"
                );
                methods.insert(MethodDispatcher::new(
                    properties,
                    descriptor.kind,
                    middleware,
                    error_handlers,
                    implementation,
                ));
            }
            info!(
                service = %service.service_full_name(),
                methods = methods.len(),
                "Service registered"
            );
            dispatchers.push(methods);
        }

        self.warn_unmatched_scopes();

        Ok(Registry {
            services: self.services,
            dispatchers,
        })
    }

    fn validate(&self) -> Result<(), RegistryError> {
        if self.services.is_empty() {
            return Err(RegistryError::NoServices);
        }

        let mut seen = HashSet::new();
        for service in &self.services {
            if !seen.insert(service.service_full_name()) {
                return Err(RegistryError::DuplicateService {
                    service: service.service_full_name().to_string(),
                });
            }
            let mut names = HashSet::new();
            for descriptor in service.methods() {
                if !names.insert(descriptor.name.as_str()) {
                    return Err(RegistryError::DuplicateMethod {
                        service: service.service_full_name().to_string(),
                        method: descriptor.name.clone(),
                    });
                }
            }
        }

        let empty_scope = |scope: Option<&str>| scope.is_some_and(str::is_empty);
        if let Some(position) = self.middleware.iter().position(|m| empty_scope(m.scope())) {
            return Err(RegistryError::EmptyScope {
                kind: "middleware",
                position,
            });
        }
        if let Some(position) = self
            .error_handlers
            .iter()
            .position(|h| empty_scope(h.scope()))
        {
            return Err(RegistryError::EmptyScope {
                kind: "error handler",
                position,
            });
        }
        Ok(())
    }

    /// A scope that selects nothing is usually a typo in a qualified name.
    fn warn_unmatched_scopes(&self) {
        let declared: Vec<_> = self
            .services
            .iter()
            .flat_map(|service| {
                service
                    .methods()
                    .iter()
                    .map(|descriptor| service.method_properties(&descriptor.name))
            })
            .collect();

        let scopes = self
            .middleware
            .iter()
            .map(Scoped::scope)
            .chain(self.error_handlers.iter().map(Scoped::scope))
            .flatten();
        for pattern in scopes {
            if !declared
                .iter()
                .any(|properties| scope::matches(Some(pattern), properties))
            {
                warn!(scope = %pattern, "Scope matches no declared method");
            }
        }
    }
}

impl fmt::Debug for RegistryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryBuilder")
            .field("services", &self.services)
            .field("middleware", &self.middleware.len())
            .field("error_handlers", &self.error_handlers.len())
            .finish()
    }
}

/// Immutable registration snapshot: the services and their dispatchers.
#[derive(Debug, Clone)]
pub struct Registry {
    services: Vec<ServiceDefinition>,
    dispatchers: Vec<ServiceDispatcher>,
}

impl Registry {
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Service definitions in registration order
    #[must_use]
    pub fn services(&self) -> &[ServiceDefinition] {
        &self.services
    }

    /// One dispatcher map per service, in registration order
    #[must_use]
    pub fn dispatchers(&self) -> &[ServiceDispatcher] {
        &self.dispatchers
    }

    /// Dispatchers of the service with this qualified name
    #[must_use]
    pub fn service(&self, service_full_name: &str) -> Option<&ServiceDispatcher> {
        self.dispatchers
            .iter()
            .find(|d| d.service_full_name() == service_full_name)
    }

    /// Dispatcher for a qualified method name (`testapp.PersonService.list`)
    #[must_use]
    pub fn method(&self, method_full_name: &str) -> Option<&MethodDispatcher> {
        let (service, method) = method_full_name.rsplit_once('.')?;
        self.service(service)?.get(method)
    }
}
