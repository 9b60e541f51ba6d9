use std::env;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use super::error::ServerError;

/// Default listen address
pub const DEFAULT_LISTEN: &str = "0.0.0.0:50051";

/// Server options.
///
/// Deserializes from YAML (or any serde format) with camelCase keys; missing
/// keys take their defaults:
///
/// ```yaml
/// listen: 0.0.0.0:50051
/// rootCert: /etc/tls/ca.pem
/// certChain: /etc/tls/server.pem
/// privateKey: /etc/tls/server.key
/// checkClientCert: false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerOptions {
    /// Address the transport binds
    pub listen: String,
    /// CA certificate used to verify client certificates
    pub root_cert: Option<PathBuf>,
    /// Server certificate chain
    pub cert_chain: Option<PathBuf>,
    /// Server private key
    pub private_key: Option<PathBuf>,
    /// Require and verify client certificates
    pub check_client_cert: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN.to_string(),
            root_cert: None,
            cert_chain: None,
            private_key: None,
            check_client_cert: false,
        }
    }
}

/// Certificate material loaded from the configured files, ready for the transport.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    Insecure,
    Tls {
        root_cert: Option<Vec<u8>>,
        cert_chain: Vec<u8>,
        private_key: Vec<u8>,
        check_client_cert: bool,
    },
}

impl Credentials {
    #[must_use]
    pub fn is_tls(&self) -> bool {
        matches!(self, Credentials::Tls { .. })
    }
}

// Never print key material.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Insecure => write!(f, "Insecure"),
            Credentials::Tls {
                root_cert,
                check_client_cert,
                ..
            } => f
                .debug_struct("Tls")
                .field("root_cert", &root_cert.is_some())
                .field("check_client_cert", check_client_cert)
                .finish_non_exhaustive(),
        }
    }
}

impl ServerOptions {
    /// Load options from environment variables.
    ///
    /// - `BRRTRPC_LISTEN`
    /// - `BRRTRPC_ROOT_CERT`, `BRRTRPC_CERT_CHAIN`, `BRRTRPC_PRIVATE_KEY`
    /// - `BRRTRPC_CHECK_CLIENT_CERT` (`true`/`1`/`yes`)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load options through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let path = |key: &str| lookup(key).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            listen: lookup("BRRTRPC_LISTEN")
                .filter(|v| !v.is_empty())
                .unwrap_or(defaults.listen),
            root_cert: path("BRRTRPC_ROOT_CERT"),
            cert_chain: path("BRRTRPC_CERT_CHAIN"),
            private_key: path("BRRTRPC_PRIVATE_KEY"),
            check_client_cert: lookup("BRRTRPC_CHECK_CLIENT_CERT")
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(defaults.check_client_cert),
        }
    }

    /// Load options from a YAML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not valid YAML for these options.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading server options from {}", path.display()))?;
        let options: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("parsing server options in {}", path.display()))?;
        Ok(options)
    }

    #[must_use]
    pub fn with_listen(mut self, listen: impl Into<String>) -> Self {
        self.listen = listen.into();
        self
    }

    #[must_use]
    pub fn with_tls(mut self, cert_chain: impl Into<PathBuf>, private_key: impl Into<PathBuf>) -> Self {
        self.cert_chain = Some(cert_chain.into());
        self.private_key = Some(private_key.into());
        self
    }

    #[must_use]
    pub fn with_client_verification(mut self, root_cert: impl Into<PathBuf>) -> Self {
        self.root_cert = Some(root_cert.into());
        self.check_client_cert = true;
        self
    }

    /// Whether any certificate option is set
    #[must_use]
    pub fn uses_tls(&self) -> bool {
        self.root_cert.is_some() || self.cert_chain.is_some() || self.private_key.is_some()
    }

    /// Check the options without touching the filesystem
    ///
    /// # Errors
    ///
    /// [`ServerError::EmptyListenAddress`], or [`ServerError::IncompleteTls`] when a
    /// certificate option is set without both the chain and the key.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.listen.trim().is_empty() {
            return Err(ServerError::EmptyListenAddress);
        }
        if self.uses_tls() && (self.cert_chain.is_none() || self.private_key.is_none()) {
            return Err(ServerError::IncompleteTls);
        }
        Ok(())
    }

    /// Validate and load the configured certificate files
    ///
    /// # Errors
    ///
    /// Any [`validate`](Self::validate) error, [`ServerError::FileNotFound`] for a
    /// missing file, [`ServerError::Unreadable`] for a file that cannot be read.
    pub fn credentials(&self) -> Result<Credentials, ServerError> {
        self.validate()?;
        let (Some(cert_chain), Some(private_key)) = (&self.cert_chain, &self.private_key) else {
            return Ok(Credentials::Insecure);
        };
        Ok(Credentials::Tls {
            root_cert: self.root_cert.as_deref().map(read_file).transpose()?,
            cert_chain: read_file(cert_chain)?,
            private_key: read_file(private_key)?,
            check_client_cert: self.check_client_cert,
        })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, ServerError> {
    if !path.exists() {
        return Err(ServerError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read(path).map_err(|source| ServerError::Unreadable {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults() {
        let options = ServerOptions::default();
        assert_eq!(options.listen, "0.0.0.0:50051");
        assert!(!options.check_client_cert);
        assert!(!options.uses_tls());
        assert_eq!(options.credentials().ok(), Some(Credentials::Insecure));
    }

    #[test]
    fn env_lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = [
            ("BRRTRPC_LISTEN", "127.0.0.1:9999"),
            ("BRRTRPC_CHECK_CLIENT_CERT", "TRUE"),
            ("BRRTRPC_ROOT_CERT", ""),
        ]
        .into_iter()
        .collect();
        let options = ServerOptions::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(options.listen, "127.0.0.1:9999");
        assert!(options.check_client_cert);
        assert_eq!(options.root_cert, None);
    }

    #[test]
    fn partial_tls_is_rejected() {
        let options = ServerOptions {
            cert_chain: Some("chain.pem".into()),
            ..ServerOptions::default()
        };
        let err = options.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot perform operation: privateKey and certChain are required when using ssl"
        );

        let root_only = ServerOptions {
            root_cert: Some("ca.pem".into()),
            ..ServerOptions::default()
        };
        assert!(matches!(root_only.validate(), Err(ServerError::IncompleteTls)));
    }

    #[test]
    fn yaml_uses_camel_case_keys() {
        let options: ServerOptions =
            serde_yaml::from_str("listen: 127.0.0.1:3000\ncheckClientCert: true\n").unwrap();
        assert_eq!(options.listen, "127.0.0.1:3000");
        assert!(options.check_client_cert);
        assert_eq!(options.cert_chain, None);
    }
}
