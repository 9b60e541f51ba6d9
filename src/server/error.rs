use std::fmt;
use std::path::PathBuf;

/// Server configuration and lifecycle error
#[derive(Debug)]
pub enum ServerError {
    /// A TLS option was given without both the certificate chain and the private key
    IncompleteTls,
    /// A configured certificate or key file does not exist
    FileNotFound {
        /// The configured path
        path: PathBuf,
    },
    /// A configured file exists but could not be read
    Unreadable {
        /// The configured path
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
    /// The listen address is empty
    EmptyListenAddress,
    /// `stop` or `force_stop` called on a server that is not running
    NotRunning,
    /// `start` called on a server that is already running
    AlreadyRunning,
    /// The transport rejected an operation
    Transport(anyhow::Error),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cannot perform operation: ")?;
        match self {
            ServerError::IncompleteTls => {
                write!(f, "privateKey and certChain are required when using ssl")
            }
            ServerError::FileNotFound { path } => write!(f, "File not found: {}", path.display()),
            ServerError::Unreadable { path, source } => {
                write!(f, "Cannot read {}: {source}", path.display())
            }
            ServerError::EmptyListenAddress => write!(f, "listen address is empty"),
            ServerError::NotRunning => write!(f, "Server is not running"),
            ServerError::AlreadyRunning => write!(f, "Server is already running"),
            ServerError::Transport(err) => write!(f, "transport error: {err:#}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Unreadable { source, .. } => Some(source),
            ServerError::Transport(err) => Some(&**err),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(err: anyhow::Error) -> Self {
        ServerError::Transport(err)
    }
}
