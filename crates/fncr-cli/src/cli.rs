//! CLI argument definitions.

use clap::{Parser, Subcommand};

use crate::commands::auth::AuthCommand;
use crate::commands::matches::MatchesArgs;

/// CLI for the FNCR onboarding backend.
#[derive(Parser, Debug)]
#[command(name = "fncr")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Backend base URL
    #[arg(long, global = true, default_value = "https://server.fncr.com")]
    pub backend: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Session operations (login, whoami, logout)
    Auth(AuthCommand),

    /// List the algorithmic lender matches for an SMB
    Matches(MatchesArgs),
}
