use miette::{Diagnostic, Result};
use thiserror::Error;

/// Main error type for the application.
///
/// Every variant is a hard failure: the run driver stops at the first one.
/// Missing data (no birthday, no attachment) is never an error and is carried
/// as `None` instead.
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Malformed input: {0}")]
    #[diagnostic(code(bdaycal::malformed_input))]
    MalformedInput(String),

    #[error("Google Calendar API error: {0}")]
    #[diagnostic(code(bdaycal::google_calendar))]
    GoogleCalendar(String),

    #[error("Google Drive API error: {0}")]
    #[diagnostic(code(bdaycal::google_drive))]
    GoogleDrive(String),

    #[error("Authorization error: {0}")]
    #[diagnostic(
        code(bdaycal::auth),
        help("delete the token file and run `get_calendar_token` to authorize again")
    )]
    Auth(String),

    #[error("Image download error: {0}")]
    #[diagnostic(code(bdaycal::download))]
    Download(String),

    #[error("Environment error: {0}")]
    #[diagnostic(code(bdaycal::environment))]
    Environment(String),

    #[error("Configuration error: {0}")]
    #[diagnostic(code(bdaycal::config))]
    Config(String),

    #[error(transparent)]
    #[diagnostic(code(bdaycal::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(bdaycal::serialization))]
    Serialization(String),

    #[error("Other error: {0}")]
    #[diagnostic(code(bdaycal::other))]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Type alias for Result with our Error type
pub type AppResult<T> = Result<T, Error>;

/// Helper to create environment errors
pub fn env_error(var: &str) -> Error {
    Error::Environment(format!("Invalid environment variable: {}", var))
}

/// Helper to create configuration errors
pub fn config_error(message: &str) -> Error {
    Error::Config(message.to_string())
}

/// Helper to create malformed input errors
pub fn malformed_input(message: &str) -> Error {
    Error::MalformedInput(message.to_string())
}

/// Helper to create Google Calendar errors
pub fn google_calendar_error(message: &str) -> Error {
    Error::GoogleCalendar(message.to_string())
}

/// Helper to create Google Drive errors
pub fn google_drive_error(message: &str) -> Error {
    Error::GoogleDrive(message.to_string())
}

/// Helper to create authorization errors
pub fn auth_error(message: &str) -> Error {
    Error::Auth(message.to_string())
}

/// Helper to create image download errors
pub fn download_error(message: &str) -> Error {
    Error::Download(message.to_string())
}

/// Helper to create other errors
pub fn other_error(message: &str) -> Error {
    Error::Other(message.to_string())
}
