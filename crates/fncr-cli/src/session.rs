//! Ambient session wiring for the CLI.
//!
//! A single JSON file under the platform data directory is the
//! persisted session: it doubles as the token store's fallback read
//! path and as the sign-out handler that deletes it.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;

use fncr_api::{ApiSession, SessionFile};
use fncr_core::ApiUrl;

/// Get the session file path.
pub fn session_path() -> Result<PathBuf> {
    let dirs = ProjectDirs::from("", "", "fncr").context("Could not determine config directory")?;

    let data_dir = dirs.data_dir();
    fs::create_dir_all(data_dir).context("Failed to create data directory")?;

    Ok(data_dir.join("session.json"))
}

/// Build an authenticated session over the given backend, backed by
/// the persisted session file.
pub fn api_session(backend: &str) -> Result<(ApiSession, Arc<SessionFile>)> {
    let base = ApiUrl::new(backend).context("Invalid backend URL")?;
    let file = Arc::new(SessionFile::new(session_path()?));

    let session = ApiSession::builder(base)
        .with_session_source(file.clone())
        .with_sign_out(file.clone())
        .build();

    Ok((session, file))
}
