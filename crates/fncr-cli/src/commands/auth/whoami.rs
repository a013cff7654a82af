//! Whoami command implementation.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct WhoamiArgs {}

pub async fn run(_args: WhoamiArgs, backend: &str) -> Result<()> {
    let (api, _file) = session::api_session(backend)?;

    // Goes through the full authenticated path: the token store seeds
    // itself from the session file, and an expired token is refreshed
    // transparently before the read.
    let cancel = CancellationToken::new();
    output::outcome(api.current_user(&cancel).await)
}
