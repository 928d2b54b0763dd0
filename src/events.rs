use crate::birthday::Birthday;
use crate::components::google_calendar::CalendarApi;
use crate::components::google_drive::DriveAttachment;
use crate::error::{malformed_input, AppResult};
use crate::utils::text::escape_html;
use chrono::{Duration, NaiveDate};
use chrono_tz::Tz;
use tracing::info;

/// Year every birthday event starts in; 2020 is a leap year so February 29 fits
pub const REFERENCE_YEAR: i32 = 2020;
/// Event id reported when nothing was sent to the calendar
pub const DRY_RUN_EVENT_ID: &str = "-1";
pub const YEARLY_RECURRENCE: &str = "RRULE:FREQ=YEARLY";
/// Does not block time in the calendar
pub const TRANSPARENT: &str = "transparent";

/// A yearly all-day birthday event, ready to be inserted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayEvent {
    pub summary: String,
    pub description: String,
    pub start: NaiveDate,
    /// Exclusive end, the day after `start`
    pub end: NaiveDate,
    pub time_zone: String,
    pub recurrence: Vec<String>,
    pub transparency: String,
}

/// Drop a parenthetical qualifier such as "(Raccoon)" and surrounding spaces
pub fn clean_name(display_name: &str) -> &str {
    let name = match display_name.find('(') {
        Some(cut) => &display_name[..cut],
        None => display_name,
    };
    name.trim()
}

/// "Tom" becomes "Tom's", "Chris" becomes "Chris'"
pub fn possessive(name: &str) -> String {
    if name.to_lowercase().ends_with('s') {
        format!("{}'", name)
    } else {
        format!("{}'s", name)
    }
}

/// Build the birthday event for one villager
pub fn build_event(
    display_name: &str,
    birthday: Birthday,
    reference_year: i32,
    wiki_link: &str,
    time_zone: Tz,
) -> AppResult<BirthdayEvent> {
    let start = NaiveDate::from_ymd_opt(reference_year, birthday.month(), birthday.day())
        .ok_or_else(|| {
            malformed_input(&format!(
                "{} is not a valid date in {} for {}",
                birthday, reference_year, display_name
            ))
        })?;
    let end = start + Duration::days(1);

    let name = possessive(clean_name(display_name));

    Ok(BirthdayEvent {
        summary: format!("{} Birthday", name),
        description: format!("It's {} birthday today!\n{}", escape_html(&name), wiki_link),
        start,
        end,
        time_zone: time_zone.name().to_string(),
        recurrence: vec![YEARLY_RECURRENCE.to_string()],
        transparency: TRANSPARENT.to_string(),
    })
}

/// Insert the event and attach the villager image when one is available.
///
/// In dry-run mode nothing is sent and [`DRY_RUN_EVENT_ID`] is returned.
pub async fn submit_event(
    calendar: &dyn CalendarApi,
    event: &BirthdayEvent,
    attachment: Option<&DriveAttachment>,
    dry_run: bool,
) -> AppResult<String> {
    if dry_run {
        info!("Dry run, not creating {:?} on {}", event.summary, event.start);
        return Ok(DRY_RUN_EVENT_ID.to_string());
    }

    let event_id = calendar.insert_event(event).await?;
    if let Some(attachment) = attachment {
        calendar.attach_file(&event_id, attachment).await?;
    }

    info!("Created birthday event {:?} on {}", event.summary, event.start.format("%m-%d"));
    Ok(event_id)
}
