//! Request-OTP command implementation.

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tokio_util::sync::CancellationToken;

use crate::output;
use crate::session;

#[derive(Args, Debug)]
pub struct RequestOtpArgs {
    /// Email address to send the passcode to
    #[arg(long)]
    pub email: String,

    /// Delivery channel for the passcode
    #[arg(long, default_value = "email")]
    pub otp_type: String,
}

pub async fn run(args: RequestOtpArgs, backend: &str) -> Result<()> {
    let (api, _file) = session::api_session(backend)?;

    eprintln!("{}", "Requesting passcode...".dimmed());

    let cancel = CancellationToken::new();
    output::outcome(api.request_otp(&args.email, &args.otp_type, &cancel).await)?;

    output::success("Passcode sent");
    Ok(())
}
