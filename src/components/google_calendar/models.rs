use crate::components::google_drive::DriveAttachment;
use crate::events::BirthdayEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Simplified calendar event representation
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub start_date_time: Option<String>,
    pub start_date: Option<String>,
    pub end_date_time: Option<String>,
    pub end_date: Option<String>,
}

impl CalendarEvent {
    /// Convert one item of an events list response
    pub fn from_api(event: &Value) -> Self {
        let text = |value: Option<&Value>| value.and_then(|v| v.as_str()).map(|s| s.to_string());
        let boundary = |name: &str, field: &str| text(event.get(name).and_then(|b| b.get(field)));

        CalendarEvent {
            id: text(event.get("id")).unwrap_or_default(),
            summary: text(event.get("summary")),
            description: text(event.get("description")),
            start_date_time: boundary("start", "dateTime"),
            start_date: boundary("start", "date"),
            end_date_time: boundary("end", "dateTime"),
            end_date: boundary("end", "date"),
        }
    }
}

/// All-day boundary of an event
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventDate {
    pub date: String,
    pub time_zone: String,
}

/// Request body for `events.insert`
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventResource {
    pub summary: String,
    pub description: String,
    pub start: EventDate,
    pub end: EventDate,
    pub recurrence: Vec<String>,
    pub transparency: String,
}

impl From<&BirthdayEvent> for EventResource {
    fn from(event: &BirthdayEvent) -> Self {
        let date = |day: chrono::NaiveDate| EventDate {
            date: day.format("%Y-%m-%d").to_string(),
            time_zone: event.time_zone.clone(),
        };
        EventResource {
            summary: event.summary.clone(),
            description: event.description.clone(),
            start: date(event.start),
            end: date(event.end),
            recurrence: event.recurrence.clone(),
            transparency: event.transparency.clone(),
        }
    }
}

/// Drive file attached to an event
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventAttachment {
    pub file_url: String,
    pub title: String,
    pub file_id: String,
    pub icon_link: String,
    pub mime_type: String,
}

impl From<&DriveAttachment> for EventAttachment {
    fn from(file: &DriveAttachment) -> Self {
        EventAttachment {
            file_url: file.file_url.clone(),
            title: file.title.clone(),
            file_id: file.file_id.clone(),
            icon_link: file.icon_link.clone(),
            mime_type: file.mime_type.clone(),
        }
    }
}

/// Request body for `events.patch` that only replaces attachments
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AttachmentPatch {
    pub attachments: Vec<EventAttachment>,
}

/// The part of an `events.insert` response we use
#[derive(Debug, Clone, Deserialize)]
pub struct InsertedEvent {
    pub id: String,
}
