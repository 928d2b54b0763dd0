use crate::error::{malformed_input, AppResult};
use std::path::Path;
use tracing::{info, warn};

/// One character from the villager dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Stable key naming the cached page and the image files
    pub key: String,
    /// Name as shown on the wiki, possibly with a parenthetical qualifier
    pub display_name: String,
    /// Wiki image file name, `None` when the dataset has no image for the key
    pub image_file: Option<String>,
}

/// Parse the `key,displayName,imageFileName` dataset.
///
/// Entries keep file order. Blank lines are ignored and a repeated key
/// replaces the earlier entry in place.
pub fn parse_roster(contents: &str) -> AppResult<Vec<RosterEntry>> {
    let mut entries: Vec<RosterEntry> = Vec::new();

    for (index, line) in contents.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < 3 {
            return Err(malformed_input(&format!(
                "roster line {} has {} fields, expected 3: {:?}",
                index + 1,
                fields.len(),
                line
            )));
        }

        let image_file = Some(fields[2].trim())
            .filter(|name| !name.is_empty())
            .map(str::to_string);
        let entry = RosterEntry {
            key: fields[0].to_string(),
            display_name: fields[1].to_string(),
            image_file,
        };

        match entries.iter_mut().find(|e| e.key == entry.key) {
            Some(existing) => {
                warn!("Duplicate roster key {:?} on line {}", entry.key, index + 1);
                *existing = entry;
            }
            None => entries.push(entry),
        }
    }

    Ok(entries)
}

/// Load the roster dataset from disk
pub async fn load_roster(path: &Path) -> AppResult<Vec<RosterEntry>> {
    let contents = tokio::fs::read_to_string(path).await?;
    let entries = parse_roster(&contents)?;
    info!("Loaded {} villagers from {}", entries.len(), path.display());
    Ok(entries)
}
