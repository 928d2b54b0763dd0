use super::{flow, ClientCredentials, TOKEN_URL};
use crate::error::{auth_error, AppResult};
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Seconds of validity an access token must still have to be reused
const EXPIRY_MARGIN_SECS: i64 = 60;

/// OAuth token as persisted in the token file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Unix timestamp after which the access token is no longer valid
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

impl StoredToken {
    /// Whether the access token can still be used at `now`
    pub fn is_fresh(&self, now: i64) -> bool {
        matches!(self.expires_at, Some(expiry) if expiry > now + EXPIRY_MARGIN_SECS)
    }
}

/// Response body of the token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

impl TokenResponse {
    /// Convert to a storable token, keeping `previous_refresh` when Google
    /// does not issue a new refresh token
    pub fn into_stored(self, previous_refresh: Option<String>, now: i64) -> StoredToken {
        StoredToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: Some(now + self.expires_in.unwrap_or(3600)),
        }
    }
}

/// Loads, refreshes and persists the OAuth token used by the API clients
pub struct TokenManager {
    credentials: ClientCredentials,
    token_path: PathBuf,
    client: Client,
    cached: Mutex<Option<StoredToken>>,
    manual: bool,
}

impl TokenManager {
    pub fn new(credentials: ClientCredentials, token_path: PathBuf) -> Self {
        Self {
            credentials,
            token_path,
            client: Client::new(),
            cached: Mutex::new(None),
            manual: false,
        }
    }

    /// Read the authorization code from stdin instead of the loopback listener
    pub fn with_manual_authorization(mut self, manual: bool) -> Self {
        self.manual = manual;
        self
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Get a usable access token.
    ///
    /// Uses the persisted token when it is still valid, refreshes it when it
    /// has expired, and falls back to the interactive authorization flow when
    /// there is no usable token at all.
    pub async fn access_token(&self) -> AppResult<String> {
        let mut cached = self.cached.lock().await;
        if cached.is_none() {
            *cached = self.load_token().await?;
        }

        let now = Utc::now().timestamp();
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.access_token.clone());
            }
            if token.refresh_token.is_some() {
                match self.refresh_token(token).await {
                    Ok(refreshed) => {
                        self.save_token(&refreshed).await?;
                        let access_token = refreshed.access_token.clone();
                        *cached = Some(refreshed);
                        return Ok(access_token);
                    }
                    Err(e) => warn!("Token refresh failed, authorizing again: {}", e),
                }
            }
        }

        let token = flow::authorize(&self.client, &self.credentials, self.manual).await?;
        self.save_token(&token).await?;
        let access_token = token.access_token.clone();
        *cached = Some(token);
        Ok(access_token)
    }

    /// Run the interactive authorization flow regardless of the stored token
    pub async fn authorize(&self) -> AppResult<()> {
        let token = flow::authorize(&self.client, &self.credentials, self.manual).await?;
        self.save_token(&token).await?;
        *self.cached.lock().await = Some(token);
        Ok(())
    }

    /// Read the token file. A missing or unreadable token is not an error,
    /// it only means authorization has to happen again.
    async fn load_token(&self) -> AppResult<Option<StoredToken>> {
        let contents = match tokio::fs::read_to_string(&self.token_path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!("Ignoring invalid token file {}: {}", self.token_path.display(), e);
                Ok(None)
            }
        }
    }

    /// Refresh an expired token
    async fn refresh_token(&self, token: &StoredToken) -> AppResult<StoredToken> {
        let refresh_token = token
            .refresh_token
            .clone()
            .ok_or_else(|| auth_error("No refresh token in token data"))?;

        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .client
            .post(TOKEN_URL)
            .form(&params)
            .send()
            .await
            .map_err(|e| auth_error(&format!("Failed to refresh token: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error response".to_string());
            return Err(auth_error(&format!(
                "Failed to refresh token: HTTP {} - {}",
                status, error_body
            )));
        }

        let new_token: TokenResponse = response
            .json()
            .await
            .map_err(|e| auth_error(&format!("Failed to parse token response: {}", e)))?;

        info!("Refreshed access token");
        Ok(new_token.into_stored(Some(refresh_token), Utc::now().timestamp()))
    }

    /// Persist a token to the token file, readable only by the owner
    pub async fn save_token(&self, token: &StoredToken) -> AppResult<()> {
        info!("Saving credential file to: {}", self.token_path.display());
        let json = serde_json::to_string_pretty(token)?;
        tokio::fs::write(&self.token_path, json).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            tokio::fs::set_permissions(&self.token_path, permissions).await?;
        }

        Ok(())
    }
}
