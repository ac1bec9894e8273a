//! Orbyt CLI binary entry point.

use orbyt::cli::{Cli, Commands};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse_args();

    let result = match cli.command {
        Commands::Login(args) => orbyt::cli::auth::handle_login(args).await,
        Commands::Logout => orbyt::cli::auth::handle_logout().await,
        Commands::Whoami(args) => orbyt::cli::auth::handle_whoami(args).await,
    };

    if let Err(e) = result {
        eprintln!("❌ {e}");
        std::process::exit(e.exit_code());
    }
}

/// Log to stderr, filtered by `ORBYT_LOG`, then `RUST_LOG`, else `warn`.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("ORBYT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
