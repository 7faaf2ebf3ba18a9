//! Event ring buffer
//!
//! User-visible events (created/deleted/refresh progress/failures) are held
//! in a bounded in-memory buffer, never persisted. The feed endpoint reads
//! them newest-first.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

pub const HISTORY_SIZE: usize = 100;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Event {
    pub event: String,
    pub subject: Option<String>,
    pub action: Option<String>,
    pub url: Option<String>,
    pub message: Option<String>,
    pub dt: DateTime<Utc>,
}

/// Shared, bounded event history. Cheap to clone.
#[derive(Clone, Debug)]
pub struct EventBus {
    inner: Arc<Mutex<VecDeque<Event>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(HISTORY_SIZE))),
        }
    }

    /// Append an event, evicting the oldest entries past the history limit.
    pub fn send(
        &self,
        event: &str,
        subject: Option<&str>,
        action: Option<&str>,
        url: Option<&str>,
        message: Option<&str>,
    ) {
        let record = Event {
            event: event.to_string(),
            subject: subject.map(str::to_string),
            action: action.map(str::to_string),
            url: url.map(str::to_string),
            message: message.map(str::to_string),
            dt: Utc::now(),
        };
        tracing::debug!(
            event = %record.event,
            subject = ?record.subject,
            message = ?record.message,
            "event"
        );

        let mut history = self.inner.lock().expect("events lock poisoned");
        history.push_back(record);
        while history.len() > HISTORY_SIZE {
            history.pop_front();
        }
    }

    /// Events after `after` (all when `None`), most recent first.
    pub fn events_since(&self, after: Option<DateTime<Utc>>) -> Vec<Event> {
        let history = self.inner.lock().expect("events lock poisoned");
        let mut events: Vec<Event> = match after {
            Some(after) => history.iter().filter(|e| e.dt > after).cloned().collect(),
            None => history.iter().cloned().collect(),
        };
        events.reverse();
        events
    }

    pub fn send_created(&self, message: &str) {
        self.send("created", Some("created"), None, None, Some(message));
    }

    pub fn send_deleted(&self, message: &str) {
        self.send("deleted", Some("deleted"), None, None, Some(message));
    }

    pub fn send_user_notify(&self, message: &str, url: Option<&str>) {
        self.send(
            "user_notify_message",
            Some("user_notify"),
            None,
            url,
            Some(message),
        );
    }

    pub fn send_global_refresh_started(&self, message: Option<&str>) {
        self.send("global_refresh_started", Some("refresh"), None, None, message);
    }

    pub fn send_global_refresh_discovery_completed(&self) {
        self.send(
            "global_refresh_discovery_completed",
            Some("refresh"),
            None,
            None,
            None,
        );
    }

    pub fn send_global_refresh_indexing_completed(&self) {
        self.send(
            "global_refresh_indexing_completed",
            Some("refresh"),
            None,
            None,
            None,
        );
    }

    pub fn send_global_refresh_modeling_completed(&self) {
        self.send(
            "global_refresh_modeling_completed",
            Some("refresh"),
            None,
            None,
            None,
        );
    }

    pub fn send_global_after_refresh_completed(&self) {
        self.send(
            "global_after_refresh_completed",
            Some("refresh"),
            None,
            None,
            None,
        );
    }

    pub fn send_refresh_completed(&self, message: Option<&str>) {
        self.send("refresh_completed", Some("refresh"), None, None, message);
    }

    pub fn send_directory_refresh(&self, message: &str) {
        self.send("directory_refresh", Some("refresh"), None, None, Some(message));
    }

    pub fn send_downloads_disabled(&self, message: Option<&str>) {
        self.send("downloads_disabled", Some("downloads"), None, None, message);
    }

    pub fn send_download_failed(&self, url: &str, message: &str) {
        self.send(
            "download_failed",
            Some("downloads"),
            None,
            Some(url),
            Some(message),
        );
    }

    pub fn send_config_import_failed(&self, message: &str) {
        self.send(
            "config_import_failed",
            Some("configs"),
            None,
            None,
            Some(message),
        );
    }

    pub fn send_config_save_failed(&self, message: &str) {
        self.send(
            "config_save_failed",
            Some("configs"),
            None,
            None,
            Some(message),
        );
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let bus = EventBus::new();
        for i in 0..(HISTORY_SIZE + 25) {
            bus.send_created(&format!("item {}", i));
        }
        let events = bus.events_since(None);
        assert_eq!(events.len(), HISTORY_SIZE);
        // Oldest entries were evicted; the newest survives.
        assert_eq!(events[0].message.as_deref(), Some("item 124"));
    }

    #[test]
    fn events_are_newest_first() {
        let bus = EventBus::new();
        bus.send_created("first");
        bus.send_deleted("second");
        let events = bus.events_since(None);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event, "deleted");
        assert_eq!(events[1].event, "created");
    }

    #[test]
    fn events_since_filters_by_datetime() {
        let bus = EventBus::new();
        bus.send_created("old");
        let cutoff = Utc::now();
        bus.send_created("new");
        let events = bus.events_since(Some(cutoff));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].message.as_deref(), Some("new"));
    }
}
