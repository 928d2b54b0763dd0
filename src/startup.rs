use crate::components::google_auth::TokenManager;
use crate::components::google_drive::build_attachment_index;
use crate::components::{DriveApi, GoogleCalendarClient, GoogleDriveClient};
use crate::config::{Config, Overrides};
use crate::error::{other_error, AppResult};
use crate::images::{DownloadedSet, ImageRetriever, WgetFetcher};
use crate::roster::load_roster;
use crate::runner::{RunReport, RunSettings, Runner};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Initialize logging with environment-based configuration
pub fn init_logging() -> AppResult<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| other_error(&format!("Failed to set up logging: {}", e)))?;

    Ok(())
}

/// Load the run configuration
pub fn load_config(overrides: &Overrides) -> AppResult<Config> {
    match Config::load(overrides) {
        Ok(config) => Ok(config),
        Err(e) => {
            error!("Failed to load configuration: {:?}", e);
            Err(e)
        }
    }
}

/// Connect to Google, build the lookup indices and walk the roster
pub async fn run(config: Config) -> AppResult<RunReport> {
    info!("Loading credentials.");
    let token_manager = Arc::new(
        TokenManager::new(config.credentials(), config.token_path.clone())
            .with_manual_authorization(config.manual_auth),
    );

    let calendar = Arc::new(GoogleCalendarClient::new(
        config.google_calendar_id.clone(),
        Arc::clone(&token_manager),
    ));
    info!("Calendar ID: {}", calendar.calendar_id());

    let drive = GoogleDriveClient::new(Arc::clone(&token_manager));
    info!("Folder ID: {}", config.google_folder_id);
    let folder_name = drive.folder_name(&config.google_folder_id).await?;
    info!("Drive folder: {}", folder_name);

    info!("Loading attachment images.");
    let attachments = build_attachment_index(&drive, &config.google_folder_id).await?;
    let downloaded = DownloadedSet::scan(&config.images_dir).await?;

    info!("Loading villager data.");
    let roster = load_roster(&config.dataset_path).await?;

    let retriever = ImageRetriever::new(
        config.images_dir.clone(),
        config.image_link_base.clone(),
        Box::new(WgetFetcher::new(config.downloader.clone())),
    );

    let mut runner = Runner::new(
        RunSettings::from(&config),
        calendar,
        attachments,
        retriever,
        downloaded,
    );
    runner.run(&roster).await
}
