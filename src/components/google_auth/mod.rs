pub mod flow;
pub mod token;

pub use token::{StoredToken, TokenManager};

use crate::error::{config_error, AppResult};
use serde::Deserialize;
use std::path::Path;

/// Google authorization endpoint
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google token endpoint
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scopes requested during authorization.
///
/// If these change, the persisted token must be deleted and issued again.
pub const SCOPES: [&str; 2] = [
    "https://www.googleapis.com/auth/calendar.events",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// OAuth client identity of this application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize)]
struct ClientSecretFile {
    installed: Option<ClientSecretSection>,
    web: Option<ClientSecretSection>,
}

#[derive(Deserialize)]
struct ClientSecretSection {
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Parse a client secret file downloaded from the Google Cloud console
    pub fn from_json(contents: &str) -> AppResult<Self> {
        let file: ClientSecretFile = serde_json::from_str(contents)?;
        let section = file
            .installed
            .or(file.web)
            .ok_or_else(|| config_error("client secret file has no \"installed\" or \"web\" section"))?;
        Ok(Self::new(section.client_id, section.client_secret))
    }

    /// Read a client secret file from disk
    pub fn from_file(path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            config_error(&format!("Unable to read client secret file {}: {}", path.display(), e))
        })?;
        Self::from_json(&contents)
    }
}
