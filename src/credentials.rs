//! Bearer credential access.
//!
//! The credential is read once, near process start, and then handed to the components that make
//! authenticated calls. Nothing in this crate mutates or renews it.

use crate::config::Config;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while reading a stored credential.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Token file could not be read.
    #[error("failed to read token file {path}: {source}")]
    Io {
        /// Location of the token file.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

/// Opaque bearer token attached to authenticated requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw token, returning `None` when it is blank.
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Value for the `Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Source of the stored bearer credential.
pub trait CredentialStore: Send + Sync {
    /// Return the stored credential, or `None` when the user is not signed in.
    fn load(&self) -> Result<Option<Credential>, CredentialError>;
}

/// Credential held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCredential(Option<Credential>);

impl StaticCredential {
    /// Store the given token, if any.
    pub fn new(token: Option<&str>) -> Self {
        Self(token.and_then(Credential::new))
    }
}

impl CredentialStore for StaticCredential {
    fn load(&self) -> Result<Option<Credential>, CredentialError> {
        Ok(self.0.clone())
    }
}

/// Credential persisted in a file, one token per file.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    /// Read the token from `path` on each load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self) -> Result<Option<Credential>, CredentialError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Credential::new(contents)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "Token file not found");
                Ok(None)
            }
            Err(source) => Err(CredentialError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// Resolve the credential from configuration: an explicit token wins over the token file.
pub fn load_credential(config: &Config) -> Result<Option<Credential>, CredentialError> {
    if let Some(token) = config.token.as_deref() {
        return StaticCredential::new(Some(token)).load();
    }
    match config.token_file.as_deref() {
        Some(path) => FileCredentialStore::new(path).load(),
        None => Ok(None),
    }
}
