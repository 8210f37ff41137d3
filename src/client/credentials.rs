//! Bearer token storage
//!
//! The token itself is obtained by an external login flow; this module only
//! stores it, hands it to the HTTP backend and forgets it when the backend
//! rejects it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Source of the bearer token used for backend requests
pub trait CredentialStore: Send + Sync {
    /// Current token, if any
    fn token(&self) -> Option<String>;

    /// Replace the stored token
    fn set_token(&self, token: &str) -> Result<(), CredentialError>;

    /// Forget the stored token
    fn clear(&self) -> Result<(), CredentialError>;
}

/// In-memory token, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryCredentials {
    token: RwLock<Option<String>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        MemoryCredentials {
            token: RwLock::new(Some(token.into())),
        }
    }
}

impl CredentialStore for MemoryCredentials {
    fn token(&self) -> Option<String> {
        self.token.read().ok().and_then(|guard| guard.clone())
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        if let Ok(mut guard) = self.token.write() {
            *guard = Some(token.to_string());
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        if let Ok(mut guard) = self.token.write() {
            *guard = None;
        }
        Ok(())
    }
}

/// Token persisted in a file; a missing or blank file means "no token"
#[derive(Debug, Clone)]
pub struct TokenFile {
    path: PathBuf,
}

impl TokenFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        TokenFile {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CredentialStore for TokenFile {
    fn token(&self) -> Option<String> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                if token.is_empty() {
                    None
                } else {
                    Some(token.to_string())
                }
            }
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    log::warn!("Failed to read token file {:?}: {}", self.path, e);
                }
                None
            }
        }
    }

    fn set_token(&self, token: &str) -> Result<(), CredentialError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, format!("{}\n", token.trim()))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), CredentialError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
