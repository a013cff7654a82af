//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use fncr_core::SessionStore;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Email address the passcode was sent to
    #[arg(long)]
    pub email: String,

    /// The one-time passcode
    #[arg(long)]
    pub code: String,
}

pub async fn run(args: LoginArgs, backend: &str) -> Result<()> {
    let (api, file) = session::api_session(backend)?;

    eprintln!("{}", "Logging in...".dimmed());

    let cancel = CancellationToken::new();
    let record = api
        .verify_otp(&args.email, &args.code, &cancel)
        .await
        .context("Failed to login")?;

    // Save session
    file.save(&record)
        .await
        .context("Failed to save session")?;

    // Print success
    output::success("Logged in successfully");
    println!();
    output::field("Email", &record.user.email);
    output::field("User type", &record.user.user_type);

    Ok(())
}
