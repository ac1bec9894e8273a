//! CLI auth command handlers for login, logout, and whoami.

use std::time::Duration;

use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{LoginArgs, WhoamiArgs};
use crate::auth::{AuthService, SessionStatus};
use crate::config::OrbytConfig;
use crate::error::Result;

/// Handle `orbyt login`.
pub async fn handle_login(args: LoginArgs) -> Result<()> {
    let config = OrbytConfig::load()?
        .with_server_url(args.server_url)
        .with_client_id(args.client_id);
    config.require_client_id()?;
    let service = AuthService::from_config(&config)?;

    println!("🔐 Orbyt Login\n");

    if let SessionStatus::Active { .. } = service.status() {
        if !confirm("You are already logged in. Login again?", false) {
            println!("Login cancelled");
            return Ok(());
        }
    }

    let spinner = new_spinner("Requesting device authorization...");
    let session = service.start_login().await;
    spinner.finish_and_clear();
    let session = session?;

    println!("Device Authorization Required");
    println!("🔗 Visit: {}", session.display_uri());
    println!("📋 Enter code: {}\n", session.user_code);

    if !args.no_browser && confirm("Open browser automatically?", true) {
        if let Err(e) = webbrowser::open(session.browser_uri()) {
            warn!(error = %e, "failed to open browser");
            println!("⚠️  Could not open a browser, visit the URL above manually.");
        }
    }

    println!(
        "⏳ Waiting for authorization (expires in {} minutes)...",
        session.expires_in.as_secs() / 60
    );

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let spinner = new_spinner("Polling for authorization...");
    let result = service
        .complete_login(&session, &cancel, |progress| {
            spinner.set_message(progress.message())
        })
        .await;
    interrupt.abort();
    spinner.finish_and_clear();
    let outcome = result?;

    match &outcome.storage_error {
        None => println!("\nToken saved successfully."),
        Some(e) => println!("\n⚠️  Could not save authentication token: {e}"),
    }
    println!("✅ Login successful!");
    if outcome.persisted() {
        println!("   Token stored at: {}", config.credential_path().display());
    }
    Ok(())
}

/// Handle `orbyt logout`.
pub async fn handle_logout() -> Result<()> {
    let config = OrbytConfig::load()?;
    let service = AuthService::from_config(&config)?;

    println!("👋 Logout\n");

    if service.status() == SessionStatus::LoggedOut {
        println!("You're not logged in");
        return Ok(());
    }

    if !confirm("Are you sure you want to logout?", false) {
        println!("Logout cancelled");
        return Ok(());
    }

    service.logout()?;
    println!("✅ Successfully logged out!");
    Ok(())
}

/// Handle `orbyt whoami`.
pub async fn handle_whoami(args: WhoamiArgs) -> Result<()> {
    let config = OrbytConfig::load()?.with_server_url(args.server_url);
    let service = AuthService::from_config(&config)?;

    let spinner = new_spinner("Fetching user information...");
    let user = service.whoami().await;
    spinner.finish_and_clear();
    let user = user?;

    println!("\n User: {}", user.name.as_deref().unwrap_or("-"));
    println!(" Email: {}", user.email.as_deref().unwrap_or("-"));
    println!(" ID: {}", user.id);
    Ok(())
}

/// Ask a yes/no question, taking `default` when no terminal is attached.
fn confirm(prompt: &str, default: bool) -> bool {
    match Confirm::new()
        .with_prompt(prompt)
        .default(default)
        .interact_opt()
    {
        Ok(Some(answer)) => answer,
        Ok(None) => false,
        Err(e) => {
            debug!(error = %e, "prompt unavailable, using default");
            default
        }
    }
}

fn new_spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
