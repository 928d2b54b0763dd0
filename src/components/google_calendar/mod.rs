mod client;
pub mod models;

pub use client::GoogleCalendarClient;
pub use models::CalendarEvent;

use crate::components::google_drive::DriveAttachment;
use crate::error::AppResult;
use crate::events::BirthdayEvent;
use async_trait::async_trait;
use chrono::NaiveDate;

/// Calendar operations the birthday run needs
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// Insert an event and return its id
    async fn insert_event(&self, event: &BirthdayEvent) -> AppResult<String>;

    /// Attach a drive file to an existing event
    async fn attach_file(&self, event_id: &str, attachment: &DriveAttachment) -> AppResult<()>;

    /// Events matching `query` that occur on `date`
    async fn find_events(&self, query: &str, date: NaiveDate) -> AppResult<Vec<CalendarEvent>>;
}
