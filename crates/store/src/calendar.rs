//! Calendar service implementations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slo_core::error::StoreError;
use slo_core::store::{CalendarEvent, CalendarService, EventPatch, NewEvent, UserId};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// The message an unlinked Outlook account fails with.
pub const NO_OUTLOOK_TOKEN: &str = "No valid Outlook token";

/// Calendar kept in process memory, keyed by user.
#[derive(Default)]
pub struct InMemoryCalendar {
    events: RwLock<HashMap<UserId, Vec<CalendarEvent>>>,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CalendarService for InMemoryCalendar {
    async fn list_events(
        &self,
        user_id: UserId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, StoreError> {
        let events = self.events.read().await;
        let mut found: Vec<CalendarEvent> = events
            .get(&user_id)
            .map(|list| {
                list.iter()
                    .filter(|e| e.start >= from && e.start <= until)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        found.sort_by_key(|e| e.start);
        Ok(found)
    }

    async fn create_event(&self, user_id: UserId, event: NewEvent) -> Result<CalendarEvent, StoreError> {
        let created = CalendarEvent {
            id: Uuid::new_v4().to_string(),
            subject: event.subject,
            start: event.start,
            end: event.end,
            body: event.body,
        };
        self.events
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(created.clone());
        Ok(created)
    }

    async fn update_event(&self, user_id: UserId, event_id: &str, patch: EventPatch) -> Result<CalendarEvent, StoreError> {
        let mut events = self.events.write().await;
        let event = events
            .get_mut(&user_id)
            .and_then(|list| list.iter_mut().find(|e| e.id == event_id))
            .ok_or_else(|| StoreError::NotFound(format!("event {event_id} not found")))?;
        event.apply(patch);
        Ok(event.clone())
    }

    async fn delete_event(&self, user_id: UserId, event_id: &str) -> Result<(), StoreError> {
        let mut events = self.events.write().await;
        let list = events.entry(user_id).or_default();
        let before = list.len();
        list.retain(|e| e.id != event_id);
        if list.len() == before {
            return Err(StoreError::NotFound(format!("event {event_id} not found")));
        }
        Ok(())
    }
}

/// A calendar for users who never linked an Outlook account.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedCalendar;

fn not_connected<T>() -> Result<T, StoreError> {
    Err(StoreError::NotConnected(NO_OUTLOOK_TOKEN.into()))
}

#[async_trait]
impl CalendarService for DisconnectedCalendar {
    async fn list_events(
        &self,
        _user_id: UserId,
        _from: DateTime<Utc>,
        _until: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>, StoreError> {
        not_connected()
    }

    async fn create_event(&self, _user_id: UserId, _event: NewEvent) -> Result<CalendarEvent, StoreError> {
        not_connected()
    }

    async fn update_event(&self, _user_id: UserId, _event_id: &str, _patch: EventPatch) -> Result<CalendarEvent, StoreError> {
        not_connected()
    }

    async fn delete_event(&self, _user_id: UserId, _event_id: &str) -> Result<(), StoreError> {
        not_connected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use slo_core::Patch;

    fn event(subject: &str, hours_from_now: i64) -> NewEvent {
        let start = Utc::now() + Duration::hours(hours_from_now);
        NewEvent {
            subject: subject.into(),
            start,
            end: start + Duration::hours(1),
            body: None,
        }
    }

    #[tokio::test]
    async fn list_within_range_sorted() {
        let cal = InMemoryCalendar::new();
        cal.create_event(1, event("Exam", 48)).await.unwrap();
        cal.create_event(1, event("Study group", 2)).await.unwrap();
        cal.create_event(1, event("Next month", 24 * 30)).await.unwrap();

        let now = Utc::now();
        let week = cal.list_events(1, now, now + Duration::days(7)).await.unwrap();
        let subjects: Vec<_> = week.iter().map(|e| e.subject.as_str()).collect();
        assert_eq!(subjects, vec!["Study group", "Exam"]);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let cal = InMemoryCalendar::new();
        let created = cal.create_event(1, event("Office hours", 3)).await.unwrap();
        let updated = cal
            .update_event(
                1,
                &created.id,
                EventPatch { subject: Patch::Set("Moved office hours".into()), ..Default::default() },
            )
            .await
            .unwrap();
        assert_eq!(updated.subject, "Moved office hours");
        assert_eq!(updated.start, created.start);

        cal.delete_event(1, &created.id).await.unwrap();
        assert!(matches!(cal.delete_event(1, &created.id).await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn disconnected_calendar_reports_missing_token() {
        let err = DisconnectedCalendar.delete_event(1, "x").await.unwrap_err();
        assert_eq!(err.to_string(), NO_OUTLOOK_TOKEN);
    }
}
