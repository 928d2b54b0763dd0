use crate::error::{malformed_input, AppResult, Error};
use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

lazy_static! {
    // Marker cell of the villager infobox, an optional link around the value,
    // and the value itself up to the closing link or cell.
    static ref BIRTHDAY_CELL: Regex =
        Regex::new(r"(?ims)Infobox-villager-birthday.*?>(?:<a.*?>)?(.*?)(?:</a>|</td)")
            .expect("birthday cell pattern is valid");
}

/// Footnote superscripts start here; everything after it is citation noise.
const FOOTNOTE_MARKER: &str = "<sup";

const MONTHS: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// A recurring birthday, without a year
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Birthday {
    month: u32,
    day: u32,
}

impl Birthday {
    /// Build a birthday, checking month 1-12 and day 1-31
    pub fn new(month: u32, day: u32) -> AppResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(malformed_input(&format!("month {} is out of range", month)));
        }
        if !(1..=31).contains(&day) {
            return Err(malformed_input(&format!("day {} is out of range", day)));
        }
        Ok(Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }
}

/// Serialized as `MM-DD`
impl fmt::Display for Birthday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Look up a full English month name, ignoring case
pub fn month_number(word: &str) -> Option<u32> {
    let word = word.to_lowercase();
    MONTHS
        .iter()
        .position(|month| *month == word)
        .map(|index| index as u32 + 1)
}

/// Extract the birthday from a cached villager page.
///
/// Returns `Ok(None)` when the page has no usable birthday cell. A day token
/// that is not a number, or a month word that is not a month, is an error.
pub fn extract_birthday(document: &str) -> AppResult<Option<Birthday>> {
    let Some(captures) = BIRTHDAY_CELL.captures(document) else {
        return Ok(None);
    };
    let Some(raw) = captures.get(1).map(|m| m.as_str()) else {
        return Ok(None);
    };

    let words = match raw.find(FOOTNOTE_MARKER) {
        Some(cut) => &raw[..cut],
        None => raw,
    };

    let parts: Vec<&str> = words.trim().split(' ').collect();
    if parts.len() != 2 {
        warn!("Expected \"Month Day\" in birthday cell, got {:?}", parts);
        return Ok(None);
    }

    let month = month_number(parts[0])
        .ok_or_else(|| malformed_input(&format!("unknown month {:?}", parts[0])))?;
    let day = parts[1]
        .parse::<u32>()
        .map_err(|e| malformed_input(&format!("invalid day {:?}: {}", parts[1], e)))?;

    let birthday = Birthday::new(month, day)?;
    debug!("Parsed birthday {} from {:?}", birthday, words.trim());
    Ok(Some(birthday))
}

/// Read `<dir>/<key>.html` and extract its birthday
pub async fn extract_birthday_from_file(dir: &Path, key: &str) -> AppResult<Option<Birthday>> {
    let path = dir.join(format!("{}.html", key));
    let document = tokio::fs::read_to_string(&path).await?;
    extract_birthday(&document).map_err(|e| match e {
        Error::MalformedInput(message) => {
            malformed_input(&format!("{}: {}", path.display(), message))
        }
        other => other,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(value: &str) -> String {
        format!(
            "<table><tr><td class=\"Infobox-villager-birthday\">{}</td></tr></table>",
            value
        )
    }

    #[test]
    fn test_month_day_is_zero_padded() {
        let birthday = extract_birthday(&cell("March 3")).unwrap().unwrap();
        assert_eq!(birthday.to_string(), "03-03");

        let birthday = extract_birthday(&cell("December 25")).unwrap().unwrap();
        assert_eq!(birthday.to_string(), "12-25");
    }

    #[test]
    fn test_month_is_case_insensitive() {
        let birthday = extract_birthday(&cell("sEPTEMBER 9")).unwrap().unwrap();
        assert_eq!(birthday.to_string(), "09-09");
    }

    #[test]
    fn test_link_around_value_is_skipped() {
        let page = "<td class=\"infobox-villager-birthday\"><a href=\"/wiki/March_3\" title=\"March 3\">March 3</a></td>";
        let birthday = extract_birthday(page).unwrap().unwrap();
        assert_eq!(birthday.to_string(), "03-03");
    }

    #[test]
    fn test_footnote_is_cut_before_tokenizing() {
        let birthday = extract_birthday(&cell("June 1<sup>citation</sup>"))
            .unwrap()
            .unwrap();
        assert_eq!(birthday.to_string(), "06-01");
    }

    #[test]
    fn test_surrounding_whitespace_is_trimmed() {
        let birthday = extract_birthday(&cell("  April 20 ")).unwrap().unwrap();
        assert_eq!(birthday, Birthday::new(4, 20).unwrap());
    }

    #[test]
    fn test_missing_marker_is_not_an_error() {
        let page = "<html><body><td>March 3</td></body></html>";
        assert!(extract_birthday(page).unwrap().is_none());
    }

    #[test]
    fn test_wrong_token_count_is_not_an_error() {
        assert!(extract_birthday(&cell("March")).unwrap().is_none());
        assert!(extract_birthday(&cell("March 3 2001")).unwrap().is_none());
        assert!(extract_birthday(&cell("")).unwrap().is_none());
    }

    #[test]
    fn test_malformed_day_is_an_error() {
        let result = extract_birthday(&cell("March third"));
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_unknown_month_is_an_error() {
        let result = extract_birthday(&cell("Smarch 3"));
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_day_out_of_range_is_an_error() {
        let result = extract_birthday(&cell("March 40"));
        assert!(matches!(result, Err(Error::MalformedInput(_))));
    }

    #[test]
    fn test_month_number() {
        assert_eq!(month_number("January"), Some(1));
        assert_eq!(month_number("may"), Some(5));
        assert_eq!(month_number("DECEMBER"), Some(12));
        assert_eq!(month_number("Jan"), None);
    }

    #[tokio::test]
    async fn test_extract_from_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bob.html"), cell("March 3")).unwrap();

        let birthday = extract_birthday_from_file(dir.path(), "bob").await.unwrap();
        assert_eq!(birthday.map(|b| b.to_string()), Some("03-03".to_string()));

        let missing = extract_birthday_from_file(dir.path(), "nobody").await;
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
