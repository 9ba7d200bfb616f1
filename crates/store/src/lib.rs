//! Data store implementations for Slo.
//!
//! Every store implements the traits in `slo_core::store`:
//! - [`InMemoryStore`] for tests and ephemeral sessions
//! - [`SqliteStore`] for persistent local use
//! - [`InMemoryCalendar`] / [`DisconnectedCalendar`] for the calendar contract

pub mod calendar;
pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use calendar::{DisconnectedCalendar, InMemoryCalendar};
pub use in_memory::InMemoryStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;

use slo_core::{CalendarService, DataStores, JournalStore, NoteStore, NotificationStore, TaskStore};
use std::sync::Arc;

/// Bundle one backend that implements every record store with a calendar.
pub fn data_stores<S>(store: Arc<S>, calendar: Arc<dyn CalendarService>) -> DataStores
where
    S: JournalStore + TaskStore + NoteStore + NotificationStore + 'static,
{
    DataStores {
        journals: store.clone(),
        tasks: store.clone(),
        notes: store.clone(),
        notifications: store,
        calendar,
    }
}
