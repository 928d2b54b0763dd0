mod client;
pub mod models;

pub use client::GoogleDriveClient;
pub use models::{DriveAttachment, DriveFile, FileListPage};

use crate::error::AppResult;
use crate::utils::text::strip_extension;
use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{info, warn};

/// Roster key to the drive image that should be attached to its event
pub type AttachmentIndex = HashMap<String, DriveAttachment>;

/// Drive operations the birthday run needs
#[async_trait]
pub trait DriveApi: Send + Sync {
    /// Display name of a folder
    async fn folder_name(&self, folder_id: &str) -> AppResult<String>;

    /// One page of the folder's files, continuing from `page_token`
    async fn list_files(&self, folder_id: &str, page_token: Option<&str>) -> AppResult<FileListPage>;
}

/// Page through the folder and index every file by its name minus extension.
///
/// Any page failure aborts; an empty page is only reported.
pub async fn build_attachment_index(drive: &dyn DriveApi, folder_id: &str) -> AppResult<AttachmentIndex> {
    let mut index = AttachmentIndex::new();
    let mut page_token: Option<String> = None;

    loop {
        let page = drive.list_files(folder_id, page_token.as_deref()).await?;

        if page.files.is_empty() {
            info!("No files found.");
        }
        for file in page.files {
            let Some(key) = strip_extension(&file.name).map(str::to_string) else {
                warn!("Skipping drive file without extension: {:?}", file.name);
                continue;
            };
            index.insert(key, DriveAttachment::from(file));
        }

        match page.next_page_token {
            Some(token) if !token.is_empty() => page_token = Some(token),
            _ => break,
        }
    }

    info!("Indexed {} attachment images", index.len());
    Ok(index)
}
