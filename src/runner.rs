use crate::birthday::{extract_birthday_from_file, Birthday};
use crate::components::google_calendar::CalendarApi;
use crate::components::google_drive::AttachmentIndex;
use crate::config::Config;
use crate::error::AppResult;
use crate::events::{build_event, submit_event, BirthdayEvent};
use crate::images::{DownloadedSet, ImageRetriever};
use crate::roster::RosterEntry;
use chrono_tz::Tz;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// The parts of [`Config`] the per-villager loop needs
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub documents_dir: PathBuf,
    pub wiki_base: String,
    pub reference_year: i32,
    pub timezone: Tz,
    pub dry_run: bool,
    pub once: bool,
    pub skip_existing_events: bool,
}

impl From<&Config> for RunSettings {
    fn from(config: &Config) -> Self {
        Self {
            documents_dir: config.root_dir.clone(),
            wiki_base: config.wiki_base.clone(),
            reference_year: config.reference_year,
            timezone: config.timezone,
            dry_run: config.dry_run,
            once: config.once,
            skip_existing_events: config.skip_existing_events,
        }
    }
}

/// What happened to one villager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CharacterOutcome {
    /// The roster has no image for this villager
    NoImageMapping,
    /// The cached page has no usable birthday
    NoBirthday,
    /// An event was created (or would have been, in a dry run)
    Created {
        event_id: String,
        birthday: Birthday,
        attached: bool,
    },
    /// An identical event already exists in the calendar
    AlreadyScheduled { event_id: String, birthday: Birthday },
}

/// Outcomes of a completed run, in roster order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub outcomes: Vec<(String, CharacterOutcome)>,
}

impl RunReport {
    pub fn outcome(&self, key: &str) -> Option<&CharacterOutcome> {
        self.outcomes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, outcome)| outcome)
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, CharacterOutcome::Created { .. }))
    }

    pub fn already_scheduled(&self) -> usize {
        self.count(|o| matches!(o, CharacterOutcome::AlreadyScheduled { .. }))
    }

    pub fn without_birthday(&self) -> usize {
        self.count(|o| matches!(o, CharacterOutcome::NoBirthday))
    }

    fn count(&self, predicate: impl Fn(&CharacterOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|(_, o)| predicate(o)).count()
    }
}

/// Walks the roster: extract the birthday, fetch the image, schedule the event.
///
/// The first hard error stops the run; villagers handled before it keep
/// their images and events.
pub struct Runner {
    settings: RunSettings,
    calendar: Arc<dyn CalendarApi>,
    attachments: AttachmentIndex,
    retriever: ImageRetriever,
    downloaded: DownloadedSet,
}

impl Runner {
    pub fn new(
        settings: RunSettings,
        calendar: Arc<dyn CalendarApi>,
        attachments: AttachmentIndex,
        retriever: ImageRetriever,
        downloaded: DownloadedSet,
    ) -> Self {
        Self {
            settings,
            calendar,
            attachments,
            retriever,
            downloaded,
        }
    }

    /// Images known to be present locally, including this run's downloads
    pub fn downloaded(&self) -> &DownloadedSet {
        &self.downloaded
    }

    pub async fn run(&mut self, roster: &[RosterEntry]) -> AppResult<RunReport> {
        info!("Handling birthdays.");
        let mut report = RunReport::default();
        let mut count = 0;

        for entry in roster {
            let outcome = match self.process(entry, count).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Stopping at {} ({}): {}", entry.display_name, entry.key, e);
                    return Err(e);
                }
            };

            let processed = outcome != CharacterOutcome::NoImageMapping;
            report.outcomes.push((entry.key.clone(), outcome));
            if processed {
                count += 1;
                if self.settings.once {
                    info!("Stopping after one villager");
                    break;
                }
            }
        }

        info!(
            "Done: {} created, {} already scheduled, {} without birthday",
            report.created(),
            report.already_scheduled(),
            report.without_birthday()
        );
        Ok(report)
    }

    async fn process(&mut self, entry: &RosterEntry, count: usize) -> AppResult<CharacterOutcome> {
        let Some(image_file) = entry.image_file.as_deref() else {
            return Ok(CharacterOutcome::NoImageMapping);
        };

        let birthday = extract_birthday_from_file(&self.settings.documents_dir, &entry.key).await?;

        self.retriever
            .retrieve(&mut self.downloaded, &entry.key, image_file)
            .await?;

        info!(
            "{}: {} ({}) - {} - {}",
            count,
            entry.display_name,
            entry.key,
            birthday.map(|b| b.to_string()).unwrap_or_default(),
            image_file
        );

        match birthday {
            Some(birthday) => self.schedule(entry, birthday).await,
            None => {
                warn!("{} doesn't have a birthday!", entry.display_name);
                Ok(CharacterOutcome::NoBirthday)
            }
        }
    }

    async fn schedule(&self, entry: &RosterEntry, birthday: Birthday) -> AppResult<CharacterOutcome> {
        let wiki_link = format!("{}{}", self.settings.wiki_base, entry.key);
        let event = build_event(
            &entry.display_name,
            birthday,
            self.settings.reference_year,
            &wiki_link,
            self.settings.timezone,
        )?;

        if self.settings.skip_existing_events && !self.settings.dry_run {
            if let Some(event_id) = self.find_existing(&event).await? {
                info!("{} already has event {}", event.summary, event_id);
                return Ok(CharacterOutcome::AlreadyScheduled { event_id, birthday });
            }
        }

        let attachment = self.attachments.get(&entry.key);
        if attachment.is_none() {
            info!("No attachment image for {}", entry.key);
        }

        let event_id = submit_event(
            self.calendar.as_ref(),
            &event,
            attachment,
            self.settings.dry_run,
        )
        .await?;

        Ok(CharacterOutcome::Created {
            event_id,
            birthday,
            attached: attachment.is_some() && !self.settings.dry_run,
        })
    }

    /// Id of an event with the same title starting on the same day
    async fn find_existing(&self, event: &BirthdayEvent) -> AppResult<Option<String>> {
        let start = event.start.format("%Y-%m-%d").to_string();
        let existing = self.calendar.find_events(&event.summary, event.start).await?;
        Ok(existing
            .into_iter()
            .find(|e| {
                e.summary.as_deref() == Some(event.summary.as_str())
                    && e.start_date.as_deref() == Some(start.as_str())
            })
            .map(|e| e.id))
    }
}
