use super::models::{DriveFolder, FileListPage};
use super::DriveApi;
use crate::components::google_auth::TokenManager;
use crate::components::send_json;
use crate::error::{google_drive_error, AppResult};
use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const FILES_API: &str = "https://www.googleapis.com/drive/v3/files";
const PAGE_SIZE: u32 = 10;
const LIST_FIELDS: &str = "nextPageToken, files(id, name, webViewLink, iconLink, mimeType)";

/// Read-only Google Drive REST client
pub struct GoogleDriveClient {
    token_manager: Arc<TokenManager>,
    client: Client,
}

impl GoogleDriveClient {
    pub fn new(token_manager: Arc<TokenManager>) -> Self {
        Self {
            token_manager,
            client: Client::new(),
        }
    }

    fn list_url(folder_id: &str, page_token: Option<&str>) -> AppResult<Url> {
        let mut url = Url::parse(FILES_API)
            .map_err(|e| google_drive_error(&format!("Failed to parse URL: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("q", &format!("'{}' in parents", folder_id))
                .append_pair("pageSize", &PAGE_SIZE.to_string())
                .append_pair("fields", LIST_FIELDS);
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl DriveApi for GoogleDriveClient {
    async fn folder_name(&self, folder_id: &str) -> AppResult<String> {
        let access_token = self.token_manager.access_token().await?;
        let mut url = Url::parse(FILES_API)
            .map_err(|e| google_drive_error(&format!("Failed to parse URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| google_drive_error("Drive API URL cannot be a base"))?
            .push(folder_id);
        url.query_pairs_mut().append_pair("fields", "id, name");

        let folder: DriveFolder = send_json(
            self.client.get(url),
            &access_token,
            "get Drive folder",
            google_drive_error,
        )
        .await?;
        Ok(folder.name)
    }

    async fn list_files(&self, folder_id: &str, page_token: Option<&str>) -> AppResult<FileListPage> {
        let access_token = self.token_manager.access_token().await?;
        let url = Self::list_url(folder_id, page_token)?;

        let page: FileListPage = send_json(
            self.client.get(url),
            &access_token,
            "retrieve files",
            google_drive_error,
        )
        .await?;

        debug!(
            "Listed {} files (more pages: {})",
            page.files.len(),
            page.next_page_token.is_some()
        );
        Ok(page)
    }
}
