//! # Server Module
//!
//! Binds a [`Registry`](crate::registry::Registry) to a [`Transport`] and manages
//! its lifecycle. The transport owns sockets, wire encoding and TLS; this module
//! owns options, certificate loading and start/stop bookkeeping.
//!
//! ```rust,ignore
//! let options = ServerOptions::from_yaml_file("server.yaml")?;
//! let mut server = Server::new(registry, options, transport)?;
//! server.start()?;
//! // ...
//! server.stop().await?;
//! ```
//!
//! Options come from YAML ([`ServerOptions::from_yaml_file`]), the environment
//! ([`ServerOptions::from_env`]) or code. Setting any certificate path switches
//! to TLS, which then needs both `certChain` and `privateKey`.

mod core;
mod error;
mod options;

pub use self::core::{Server, Transport};
pub use self::error::ServerError;
pub use self::options::{Credentials, ServerOptions, DEFAULT_LISTEN};
