use serde::{Deserialize, Serialize};

/// One file from a drive folder listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub web_view_link: Option<String>,
    pub icon_link: Option<String>,
    pub mime_type: Option<String>,
}

/// One page of `files.list`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FileListPage {
    pub next_page_token: Option<String>,
    pub files: Vec<DriveFile>,
}

/// Folder metadata from `files.get`
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DriveFolder {
    pub id: String,
    pub name: String,
}

/// Everything a calendar event needs to attach a drive file
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriveAttachment {
    pub title: String,
    pub file_id: String,
    pub file_url: String,
    pub icon_link: String,
    pub mime_type: String,
}

impl From<DriveFile> for DriveAttachment {
    fn from(file: DriveFile) -> Self {
        DriveAttachment {
            title: file.name,
            file_id: file.id,
            file_url: file.web_view_link.unwrap_or_default(),
            icon_link: file.icon_link.unwrap_or_default(),
            mime_type: file.mime_type.unwrap_or_default(),
        }
    }
}
