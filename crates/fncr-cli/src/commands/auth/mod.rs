//! Auth subcommand implementations.

mod login;
mod logout;
mod request_otp;
mod whoami;

use anyhow::Result;
use clap::{Args, Subcommand};

#[derive(Args, Debug)]
pub struct AuthCommand {
    #[command(subcommand)]
    pub command: AuthSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthSubcommand {
    /// Ask the backend to send a one-time passcode
    RequestOtp(request_otp::RequestOtpArgs),

    /// Exchange a one-time passcode for a session
    Login(login::LoginArgs),

    /// Display the active session's user
    Whoami(whoami::WhoamiArgs),

    /// Destroy the active session
    Logout(logout::LogoutArgs),
}

pub async fn handle(cmd: AuthCommand, backend: &str) -> Result<()> {
    match cmd.command {
        AuthSubcommand::RequestOtp(args) => request_otp::run(args, backend).await,
        AuthSubcommand::Login(args) => login::run(args, backend).await,
        AuthSubcommand::Whoami(args) => whoami::run(args, backend).await,
        AuthSubcommand::Logout(args) => logout::run(args, backend).await,
    }
}
