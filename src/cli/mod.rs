//! CLI entry point for Orbyt.

pub mod auth;

use clap::{Parser, Subcommand};

/// Orbyt CLI
#[derive(Parser, Debug)]
#[command(name = "orbyt", version, about = "Orbyt CLI: sign in with a device code and manage the stored credential")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Login with the device authorization flow
    Login(LoginArgs),
    /// Logout and clear stored credentials
    Logout,
    /// Show the current authenticated user
    Whoami(WhoamiArgs),
}

/// Arguments for `orbyt login`.
#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Auth server URL
    #[arg(long)]
    pub server_url: Option<String>,

    /// OAuth client ID
    #[arg(long)]
    pub client_id: Option<String>,

    /// Never offer to open the verification page in a browser
    #[arg(long)]
    pub no_browser: bool,
}

/// Arguments for `orbyt whoami`.
#[derive(Parser, Debug)]
pub struct WhoamiArgs {
    /// Auth server URL
    #[arg(long)]
    pub server_url: Option<String>,
}

impl Cli {
    /// Parse CLI arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
