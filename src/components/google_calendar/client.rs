use super::models::{AttachmentPatch, CalendarEvent, EventAttachment, EventResource, InsertedEvent};
use super::CalendarApi;
use crate::components::google_auth::TokenManager;
use crate::components::google_drive::DriveAttachment;
use crate::components::send_json;
use crate::error::{google_calendar_error, AppResult};
use crate::events::BirthdayEvent;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;
use url::Url;

const CALENDAR_API: &str = "https://www.googleapis.com/calendar/v3/";

/// Google Calendar REST client bound to one calendar
pub struct GoogleCalendarClient {
    calendar_id: String,
    token_manager: Arc<TokenManager>,
    client: Client,
}

impl GoogleCalendarClient {
    pub fn new(calendar_id: String, token_manager: Arc<TokenManager>) -> Self {
        Self {
            calendar_id,
            token_manager,
            client: Client::new(),
        }
    }

    pub fn calendar_id(&self) -> &str {
        &self.calendar_id
    }

    /// `calendars/<id>/events[/<event id>]`, with ids percent-encoded as path segments
    fn events_url(&self, event_id: Option<&str>) -> AppResult<Url> {
        let mut url = Url::parse(CALENDAR_API)
            .map_err(|e| google_calendar_error(&format!("Failed to parse URL: {}", e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| google_calendar_error("Calendar API URL cannot be a base"))?;
            segments.pop_if_empty();
            segments.extend(["calendars", self.calendar_id.as_str(), "events"]);
            if let Some(event_id) = event_id {
                segments.push(event_id);
            }
        }
        Ok(url)
    }

    /// Event search for `query` limited to the whole UTC day of `date`
    fn search_url(&self, query: &str, date: NaiveDate) -> AppResult<Url> {
        let mut url = self.events_url(None)?;
        let time_min = format!("{}T00:00:00Z", date.format("%Y-%m-%d"));
        let time_max = format!("{}T00:00:00Z", (date + Duration::days(1)).format("%Y-%m-%d"));
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("timeMin", &time_min)
            .append_pair("timeMax", &time_max)
            .append_pair("singleEvents", "true");
        Ok(url)
    }
}

#[async_trait]
impl CalendarApi for GoogleCalendarClient {
    async fn insert_event(&self, event: &BirthdayEvent) -> AppResult<String> {
        let access_token = self.token_manager.access_token().await?;
        let url = self.events_url(None)?;
        let body = EventResource::from(event);

        let inserted: InsertedEvent = send_json(
            self.client.post(url).json(&body),
            &access_token,
            "add a new event",
            google_calendar_error,
        )
        .await?;

        debug!("Inserted event {} ({})", inserted.id, event.summary);
        Ok(inserted.id)
    }

    async fn attach_file(&self, event_id: &str, attachment: &DriveAttachment) -> AppResult<()> {
        let access_token = self.token_manager.access_token().await?;
        let mut url = self.events_url(Some(event_id))?;
        url.query_pairs_mut().append_pair("supportsAttachments", "true");

        let body = AttachmentPatch {
            attachments: vec![EventAttachment::from(attachment)],
        };

        let _: Value = send_json(
            self.client.patch(url).json(&body),
            &access_token,
            &format!("add attachment {} to event {}", attachment.title, event_id),
            google_calendar_error,
        )
        .await?;

        Ok(())
    }

    async fn find_events(&self, query: &str, date: NaiveDate) -> AppResult<Vec<CalendarEvent>> {
        let access_token = self.token_manager.access_token().await?;
        let url = self.search_url(query, date)?;

        let response_data: Value = send_json(
            self.client.get(url),
            &access_token,
            "search events",
            google_calendar_error,
        )
        .await?;

        let events = response_data
            .get("items")
            .and_then(|i| i.as_array())
            .map(|items| items.iter().map(CalendarEvent::from_api).collect())
            .unwrap_or_default();

        Ok(events)
    }
}
