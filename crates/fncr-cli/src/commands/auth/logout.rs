//! Logout command implementation.

use anyhow::Result;
use clap::Args;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(_args: LogoutArgs, backend: &str) -> Result<()> {
    let (api, _file) = session::api_session(backend)?;

    // Seed the token store from the session file so sign-out has
    // something to clear; clearing it fires the handler that deletes
    // the file.
    if api.store().get().await.is_none() {
        output::error("No active session");
        return Ok(());
    }

    api.force_sign_out().await;
    output::success("Signed out");
    Ok(())
}
