use crate::components::google_auth::ClientCredentials;
use crate::error::{config_error, env_error, AppResult};
use crate::events::REFERENCE_YEAR;
use chrono_tz::Tz;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Config file read when `--config` / `BDAYCAL_CONFIG` is not given
pub const DEFAULT_CONFIG_FILE: &str = "bdaycal.toml";
/// Default wiki every page and image comes from
pub const DEFAULT_WIKI_BASE: &str = "https://nookipedia.com/wiki/";
pub const DEFAULT_TIMEZONE: &str = "America/Toronto";
pub const DEFAULT_DATASET: &str = "acVillagerData.txt";
pub const DEFAULT_DOWNLOADER: &str = "wget";

/// Main configuration structure for a run
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the cached `<key>.html` pages
    pub root_dir: PathBuf,
    /// Roster dataset (`key,displayName,imageFileName`)
    pub dataset_path: PathBuf,
    /// Local image directory, `<root>/imgs` by default
    pub images_dir: PathBuf,
    /// Canonical per-villager link is `<wiki_base><key>`
    pub wiki_base: String,
    /// Wiki file pages are `<image_link_base><image file>`
    pub image_link_base: String,
    /// Time zone the all-day events are created in
    pub timezone: Tz,
    pub reference_year: i32,
    /// Program used to fetch images
    pub downloader: String,
    /// Do not create events
    pub dry_run: bool,
    /// Stop after the first villager
    pub once: bool,
    /// Look for an identical event before inserting
    pub skip_existing_events: bool,
    /// Google OAuth client ID
    pub google_client_id: String,
    /// Google OAuth client secret
    pub google_client_secret: String,
    /// Google Calendar ID events are created in
    pub google_calendar_id: String,
    /// Google Drive folder holding the attachment images
    pub google_folder_id: String,
    /// Where the OAuth token is persisted
    pub token_path: PathBuf,
    /// Paste the authorization code instead of waiting on the loopback listener
    pub manual_auth: bool,
}

/// The subset of the configuration needed to authorize against Google
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub credentials: ClientCredentials,
    pub token_path: PathBuf,
    pub manual: bool,
}

/// Optional settings from the TOML config file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub root_dir: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
    pub images_dir: Option<PathBuf>,
    pub wiki_base: Option<String>,
    pub image_link_base: Option<String>,
    pub timezone: Option<String>,
    pub reference_year: Option<i32>,
    pub downloader: Option<String>,
    pub dry_run: Option<bool>,
    pub once: Option<bool>,
    pub skip_existing_events: Option<bool>,
    pub manual_auth: Option<bool>,
    pub credentials_file: Option<PathBuf>,
    pub token_file: Option<PathBuf>,
    pub calendar_file: Option<PathBuf>,
    pub folder_file: Option<PathBuf>,
}

/// Settings given on the command line; they win over everything else
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config_file: Option<PathBuf>,
    pub root_dir: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
    pub dry_run: bool,
    pub once: bool,
    pub allow_duplicates: bool,
    pub manual_auth: bool,
}

#[derive(Deserialize)]
struct CalendarIdFile {
    calendar_id: String,
}

#[derive(Deserialize)]
struct FolderIdFile {
    folder_id: String,
}

impl FileConfig {
    /// Read the config file; a missing default file is the same as an empty one
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let (path, required) = match path {
            Some(path) => (path, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };

        match fs::read_to_string(path) {
            Ok(content) => Ok(toml::from_str(&content)?),
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(config_error(&format!(
                "Unable to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

/// `.env`, then the config file named on the command line or in `BDAYCAL_CONFIG`
fn load_file(overrides: &Overrides) -> AppResult<FileConfig> {
    // Load .env file if it exists
    dotenv().ok();

    let config_file = overrides
        .config_file
        .clone()
        .or_else(|| env::var("BDAYCAL_CONFIG").ok().map(PathBuf::from));
    FileConfig::load(config_file.as_deref())
}

impl AuthConfig {
    /// Load only what authorization needs; calendar and folder ids are not required
    pub fn load(overrides: &Overrides) -> AppResult<Self> {
        let file = load_file(overrides)?;
        Self::resolve(&file, |name| env::var(name).ok(), overrides)
    }

    pub fn resolve<F>(file: &FileConfig, lookup: F, overrides: &Overrides) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let credentials = match (lookup("GOOGLE_CLIENT_ID"), lookup("GOOGLE_CLIENT_SECRET")) {
            (Some(id), Some(secret)) => ClientCredentials::new(id, secret),
            _ => ClientCredentials::from_file(
                file.credentials_file
                    .as_deref()
                    .unwrap_or(Path::new("credentials.json")),
            )?,
        };
        let token_path = file
            .token_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("token.json"));
        let manual =
            overrides.manual_auth || flag(&lookup, "BDAYCAL_MANUAL_AUTH", file.manual_auth)?;

        Ok(AuthConfig {
            credentials,
            token_path,
            manual,
        })
    }
}

impl Config {
    /// Load configuration from `.env`, the config file, the environment and
    /// command line overrides, in increasing order of precedence
    pub fn load(overrides: &Overrides) -> AppResult<Self> {
        let file = load_file(overrides)?;
        Self::resolve(file, |name| env::var(name).ok(), overrides)
    }

    /// Combine the config layers; `lookup` reads environment variables
    pub fn resolve<F>(file: FileConfig, lookup: F, overrides: &Overrides) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let auth = AuthConfig::resolve(&file, &lookup, overrides)?;

        let root_dir = overrides
            .root_dir
            .clone()
            .or_else(|| lookup("BDAYCAL_ROOT").map(PathBuf::from))
            .or(file.root_dir)
            .unwrap_or_else(|| PathBuf::from("."));

        let dataset_path = overrides
            .dataset
            .clone()
            .or_else(|| lookup("BDAYCAL_DATASET").map(PathBuf::from))
            .or(file.dataset)
            .unwrap_or_else(|| root_dir.join(DEFAULT_DATASET));

        let images_dir = file.images_dir.unwrap_or_else(|| root_dir.join("imgs"));

        let wiki_base = lookup("BDAYCAL_WIKI_BASE")
            .or(file.wiki_base)
            .unwrap_or_else(|| DEFAULT_WIKI_BASE.to_string());
        let image_link_base = file
            .image_link_base
            .unwrap_or_else(|| format!("{}File:", wiki_base));

        let timezone_name = lookup("BDAYCAL_TIMEZONE")
            .or(file.timezone)
            .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
        let timezone = timezone_name
            .parse::<Tz>()
            .map_err(|e| config_error(&format!("Invalid time zone {:?}: {}", timezone_name, e)))?;

        let reference_year = match lookup("BDAYCAL_REFERENCE_YEAR") {
            Some(value) => value
                .parse::<i32>()
                .map_err(|_| env_error("BDAYCAL_REFERENCE_YEAR"))?,
            None => file.reference_year.unwrap_or(REFERENCE_YEAR),
        };

        let downloader = lookup("BDAYCAL_DOWNLOADER")
            .or(file.downloader)
            .unwrap_or_else(|| DEFAULT_DOWNLOADER.to_string());

        let dry_run = overrides.dry_run || flag(&lookup, "BDAYCAL_DRY_RUN", file.dry_run)?;
        let once = overrides.once || flag(&lookup, "BDAYCAL_ONCE", file.once)?;
        let skip_existing_events = !overrides.allow_duplicates
            && flag(
                &lookup,
                "BDAYCAL_SKIP_EXISTING",
                Some(file.skip_existing_events.unwrap_or(true)),
            )?;

        let google_calendar_id = match lookup("BDAYCAL_CALENDAR_ID") {
            Some(id) => id,
            None => {
                let path = file.calendar_file.unwrap_or_else(|| PathBuf::from("calendarid.json"));
                read_json::<CalendarIdFile>(&path, "calendar ID")?.calendar_id
            }
        };

        let google_folder_id = match lookup("BDAYCAL_FOLDER_ID") {
            Some(id) => id,
            None => {
                let path = file.folder_file.unwrap_or_else(|| PathBuf::from("folderid.json"));
                read_json::<FolderIdFile>(&path, "folder ID")?.folder_id
            }
        };

        Ok(Config {
            root_dir,
            dataset_path,
            images_dir,
            wiki_base,
            image_link_base,
            timezone,
            reference_year,
            downloader,
            dry_run,
            once,
            skip_existing_events,
            google_client_id: auth.credentials.client_id,
            google_client_secret: auth.credentials.client_secret,
            google_calendar_id,
            google_folder_id,
            token_path: auth.token_path,
            manual_auth: auth.manual,
        })
    }

    /// OAuth client identity
    pub fn credentials(&self) -> ClientCredentials {
        ClientCredentials::new(&self.google_client_id, &self.google_client_secret)
    }
}

/// Boolean from the environment, falling back to the config file value
fn flag<F>(lookup: &F, name: &str, fallback: Option<bool>) -> AppResult<bool>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) => match value.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" | "" => Ok(false),
            _ => Err(env_error(name)),
        },
        None => Ok(fallback.unwrap_or(false)),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, what: &str) -> AppResult<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        config_error(&format!("Unable to read the {} from {}: {}", what, path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        config_error(&format!("Unable to parse the {} in {}: {}", what, path.display(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn google_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("GOOGLE_CLIENT_ID", "client"),
            ("GOOGLE_CLIENT_SECRET", "secret"),
            ("BDAYCAL_CALENDAR_ID", "cal@group.calendar.google.com"),
            ("BDAYCAL_FOLDER_ID", "folder"),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(FileConfig::default(), env_of(&google_env()), &Overrides::default())
            .unwrap();

        assert_eq!(config.root_dir, PathBuf::from("."));
        assert_eq!(config.dataset_path, PathBuf::from("./acVillagerData.txt"));
        assert_eq!(config.images_dir, PathBuf::from("./imgs"));
        assert_eq!(config.wiki_base, DEFAULT_WIKI_BASE);
        assert_eq!(config.image_link_base, "https://nookipedia.com/wiki/File:");
        assert_eq!(config.timezone, chrono_tz::America::Toronto);
        assert_eq!(config.reference_year, 2020);
        assert_eq!(config.downloader, "wget");
        assert!(!config.dry_run);
        assert!(!config.once);
        assert!(config.skip_existing_events);
        assert_eq!(config.google_calendar_id, "cal@group.calendar.google.com");
        assert_eq!(config.credentials(), ClientCredentials::new("client", "secret"));
    }

    #[test]
    fn test_precedence() {
        let file: FileConfig = toml::from_str(
            r#"
            root_dir = "/data/villagers"
            timezone = "Europe/Helsinki"
            dry_run = false
            skip_existing_events = false
            "#,
        )
        .unwrap();
        let mut env = google_env();
        env.push(("BDAYCAL_ROOT", "/env/root"));
        env.push(("BDAYCAL_DRY_RUN", "true"));
        let overrides = Overrides {
            dataset: Some(PathBuf::from("/cli/data.txt")),
            once: true,
            ..Default::default()
        };

        let config = Config::resolve(file, env_of(&env), &overrides).unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/env/root"));
        assert_eq!(config.dataset_path, PathBuf::from("/cli/data.txt"));
        assert_eq!(config.images_dir, PathBuf::from("/env/root/imgs"));
        assert_eq!(config.timezone, chrono_tz::Europe::Helsinki);
        assert!(config.dry_run);
        assert!(config.once);
        assert!(!config.skip_existing_events);
    }

    #[test]
    fn test_allow_duplicates_disables_guard() {
        let overrides = Overrides {
            allow_duplicates: true,
            ..Default::default()
        };
        let config = Config::resolve(FileConfig::default(), env_of(&google_env()), &overrides).unwrap();
        assert!(!config.skip_existing_events);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut env = google_env();
        env.push(("BDAYCAL_TIMEZONE", "Mars/Olympus"));
        assert!(Config::resolve(FileConfig::default(), env_of(&env), &Overrides::default()).is_err());

        let mut env = google_env();
        env.push(("BDAYCAL_ONCE", "sometimes"));
        assert!(Config::resolve(FileConfig::default(), env_of(&env), &Overrides::default()).is_err());
    }

    #[test]
    fn test_ids_from_descriptor_files() {
        let dir = tempfile::tempdir().unwrap();
        let calendar_file = dir.path().join("calendarid.json");
        let folder_file = dir.path().join("folderid.json");
        let credentials_file = dir.path().join("credentials.json");
        fs::write(&calendar_file, r#"{"calendar_id": "from-file"}"#).unwrap();
        fs::write(&folder_file, r#"{"folder_id": "folder-from-file"}"#).unwrap();
        fs::write(
            &credentials_file,
            r#"{"installed": {"client_id": "file-client", "client_secret": "file-secret"}}"#,
        )
        .unwrap();

        let file = FileConfig {
            calendar_file: Some(calendar_file),
            folder_file: Some(folder_file),
            credentials_file: Some(credentials_file),
            ..Default::default()
        };
        let config = Config::resolve(file, env_of(&[]), &Overrides::default()).unwrap();
        assert_eq!(config.google_calendar_id, "from-file");
        assert_eq!(config.google_folder_id, "folder-from-file");
        assert_eq!(config.google_client_id, "file-client");
    }

    #[test]
    fn test_unknown_config_keys_are_rejected() {
        assert!(toml::from_str::<FileConfig>("discord_token = \"x\"").is_err());
    }

    #[test]
    fn test_auth_config_needs_no_ids() {
        let dir = tempfile::tempdir().unwrap();
        let file = FileConfig {
            calendar_file: Some(dir.path().join("calendarid.json")),
            folder_file: Some(dir.path().join("folderid.json")),
            token_file: Some(dir.path().join("token.json")),
            ..Default::default()
        };
        let env = env_of(&[("GOOGLE_CLIENT_ID", "client"), ("GOOGLE_CLIENT_SECRET", "secret")]);

        let auth = AuthConfig::resolve(&file, &env, &Overrides::default()).unwrap();
        assert_eq!(auth.credentials, ClientCredentials::new("client", "secret"));
        assert_eq!(auth.token_path, dir.path().join("token.json"));
        assert!(!auth.manual);

        assert!(Config::resolve(file, env, &Overrides::default()).is_err());
    }

    #[test]
    fn test_manual_auth_from_env_and_cli() {
        let mut env = google_env();
        env.push(("BDAYCAL_MANUAL_AUTH", "yes"));
        let config = Config::resolve(FileConfig::default(), env_of(&env), &Overrides::default()).unwrap();
        assert!(config.manual_auth);

        let overrides = Overrides {
            manual_auth: true,
            ..Default::default()
        };
        let auth = AuthConfig::resolve(&FileConfig::default(), env_of(&google_env()), &overrides).unwrap();
        assert!(auth.manual);
    }
}
