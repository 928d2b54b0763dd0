use bdaycal::components::google_auth::TokenManager;
use bdaycal::config::{AuthConfig, Overrides};
use bdaycal::startup;
use clap::Parser;
use std::path::PathBuf;

/// Authorize calendar and drive access and save the token for later runs
#[derive(Parser)]
#[command(name = "get_calendar_token", version)]
struct Cli {
    /// Config file (defaults to bdaycal.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Paste the authorization code on stdin, for hosts without a local browser
    #[arg(long)]
    manual: bool,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();
    startup::init_logging()?;

    // Only the client credentials and token location are needed here
    let overrides = Overrides {
        config_file: cli.config,
        manual_auth: cli.manual,
        ..Default::default()
    };
    let auth = AuthConfig::load(&overrides)?;

    let token_manager =
        TokenManager::new(auth.credentials, auth.token_path).with_manual_authorization(auth.manual);
    token_manager.authorize().await?;

    println!(
        "Token successfully saved to {}!",
        token_manager.token_path().display()
    );

    Ok(())
}
