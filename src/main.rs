use bdaycal::config::Overrides;
use bdaycal::startup;
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

/// Create yearly Google Calendar birthday events from cached wiki pages
#[derive(Parser)]
#[command(name = "bdaycal", version)]
struct Cli {
    /// Config file (defaults to bdaycal.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory with the cached <key>.html pages
    #[arg(long)]
    root: Option<PathBuf>,

    /// Roster dataset, one `key,displayName,imageFileName` per line
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Parse and download, but do not create calendar events
    #[arg(long)]
    dry_run: bool,

    /// Stop after the first villager
    #[arg(long)]
    once: bool,

    /// Insert events even when an identical one already exists
    #[arg(long)]
    allow_duplicates: bool,

    /// Paste the authorization code on stdin instead of using the local callback
    #[arg(long)]
    manual_auth: bool,
}

impl From<Cli> for Overrides {
    fn from(cli: Cli) -> Self {
        Overrides {
            config_file: cli.config,
            root_dir: cli.root,
            dataset: cli.dataset,
            dry_run: cli.dry_run,
            once: cli.once,
            allow_duplicates: cli.allow_duplicates,
            manual_auth: cli.manual_auth,
        }
    }
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let overrides = Overrides::from(Cli::parse());

    // Initialize logging
    startup::init_logging()?;

    info!("Starting bdaycal");

    // Load configuration
    let config = startup::load_config(&overrides)?;

    startup::run(config).await?;
    Ok(())
}
