use futures::future::BoxFuture;
use tracing::{info, warn};

use super::error::ServerError;
use super::options::{Credentials, ServerOptions};
use crate::dispatcher::ServiceDispatcher;
use crate::registry::Registry;

/// The network side of a server.
///
/// A transport decodes calls, picks the [`ServiceDispatcher`] and method they
/// address, and invokes the method's dispatcher. Wire formats and TLS
/// handshakes are entirely its business.
pub trait Transport: Send {
    /// Attach the dispatchers of one service
    fn add_service(&mut self, service: ServiceDispatcher) -> anyhow::Result<()>;

    /// Bind `listen` with the loaded credentials
    fn bind(&mut self, listen: &str, credentials: &Credentials) -> anyhow::Result<()>;

    /// Begin accepting calls
    fn start(&mut self) -> anyhow::Result<()>;

    /// Stop accepting calls and resolve once in-flight calls have finished
    fn shutdown(&mut self) -> BoxFuture<'_, anyhow::Result<()>>;

    /// Stop immediately, abandoning in-flight calls
    fn force_shutdown(&mut self);
}

/// A registry bound to a transport.
///
/// Certificate files are loaded and every service is attached when the server
/// is created, so configuration errors surface before `start`.
pub struct Server<T: Transport> {
    registry: Registry,
    options: ServerOptions,
    credentials: Credentials,
    transport: T,
    started: bool,
}

impl<T: Transport> Server<T> {
    /// # Errors
    ///
    /// Invalid options, unreadable certificate files, or a transport refusing a service.
    pub fn new(registry: Registry, options: ServerOptions, mut transport: T) -> Result<Self, ServerError> {
        let credentials = options.credentials()?;
        for service in registry.dispatchers() {
            transport.add_service(service.clone())?;
        }
        Ok(Self {
            registry,
            options,
            credentials,
            transport,
            started: false,
        })
    }

    #[must_use]
    pub fn options(&self) -> &ServerOptions {
        &self.options
    }

    #[must_use]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    #[must_use]
    pub fn has_started(&self) -> bool {
        self.started
    }

    /// Bind the listen address and start serving
    ///
    /// # Errors
    ///
    /// [`ServerError::AlreadyRunning`], or the transport's bind/start error.
    pub fn start(&mut self) -> Result<(), ServerError> {
        if self.started {
            return Err(ServerError::AlreadyRunning);
        }
        self.transport.bind(&self.options.listen, &self.credentials)?;
        self.transport.start()?;
        self.started = true;
        info!(
            listen = %self.options.listen,
            tls = self.credentials.is_tls(),
            services = self.registry.dispatchers().len(),
            "Server is listening at {}",
            self.options.listen
        );
        Ok(())
    }

    /// Graceful stop: waits for in-flight calls
    ///
    /// # Errors
    ///
    /// [`ServerError::NotRunning`], or the transport's shutdown error (the
    /// server then still counts as running).
    pub async fn stop(&mut self) -> Result<(), ServerError> {
        self.ensure_running()?;
        self.transport.shutdown().await?;
        self.started = false;
        info!(listen = %self.options.listen, "Server stopped");
        Ok(())
    }

    /// Immediate stop
    ///
    /// # Errors
    ///
    /// [`ServerError::NotRunning`]
    pub fn force_stop(&mut self) -> Result<(), ServerError> {
        self.ensure_running()?;
        self.transport.force_shutdown();
        self.started = false;
        warn!(listen = %self.options.listen, "Server force-stopped");
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), ServerError> {
        if self.started {
            Ok(())
        } else {
            Err(ServerError::NotRunning)
        }
    }
}

impl<T: Transport> std::fmt::Debug for Server<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("options", &self.options)
            .field("credentials", &self.credentials)
            .field("started", &self.started)
            .finish_non_exhaustive()
    }
}
