//! File-backed session persistence.
//!
//! One JSON file holding the current [`SessionRecord`]. This is the
//! "ambient session" of a CLI or single-instance gateway deployment:
//! the token store's fallback read path, the lifecycle's write-back
//! target, and the thing forced sign-out destroys.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, warn};

use fncr_core::error::InvalidInputError;
use fncr_core::{Error, Result, SessionRecord, SessionSource, SessionStore, SignOutHandler};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// A session record persisted as a JSON file.
#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    /// Use the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file path.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn io_err(context: &str, err: std::io::Error) -> Error {
        Error::InvalidInput(InvalidInputError::Other {
            message: format!("{context}: {err}"),
        })
    }
}

#[async_trait]
impl SessionSource for SessionFile {
    async fn load(&self) -> Result<Option<SessionRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path)
            .map_err(|e| Self::io_err("failed to read session file", e))?;

        let record: SessionRecord = serde_json::from_str(&json).map_err(|e| {
            Error::InvalidInput(InvalidInputError::Other {
                message: format!("invalid session file: {e}"),
            })
        })?;

        Ok(Some(record))
    }
}

#[async_trait]
impl SessionStore for SessionFile {
    async fn save(&self, record: &SessionRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Self::io_err("failed to create session directory", e))?;
        }

        let json = serde_json::to_string_pretty(record).map_err(|e| {
            Error::InvalidInput(InvalidInputError::Other {
                message: format!("failed to serialize session: {e}"),
            })
        })?;

        fs::write(&self.path, &json)
            .map_err(|e| Self::io_err("failed to write session file", e))?;

        // Restrictive permissions (Unix only); the file holds tokens.
        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path)
                .map_err(|e| Self::io_err("failed to stat session file", e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .map_err(|e| Self::io_err("failed to chmod session file", e))?;
        }

        debug!(path = %self.path.display(), "session persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)
                .map_err(|e| Self::io_err("failed to remove session file", e))?;
        }
        Ok(())
    }
}

// Forced sign-out in a file-session deployment means deleting the file.
#[async_trait]
impl SignOutHandler for SessionFile {
    async fn sign_out(&self) {
        if let Err(e) = SessionStore::clear(self).await {
            warn!(error = %e, "failed to clear session file on sign-out");
        }
    }
}
