//! Matches command implementation.

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct MatchesArgs {
    /// SMB id to list matches for
    #[arg(long)]
    pub smb_id: String,
}

pub async fn run(args: MatchesArgs, backend: &str) -> Result<()> {
    let (api, _file) = session::api_session(backend)?;

    let cancel = CancellationToken::new();
    output::outcome(api.algorithmic_matches(&args.smb_id, &cancel).await)
}
