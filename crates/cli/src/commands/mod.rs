pub mod agent;
pub mod onboard;
pub mod status;

use slo_config::{AppConfig, StorageBackend};
use slo_core::{DataStores, HistoryStore};
use slo_store::{DisconnectedCalendar, InMemoryStore, SqliteStore, data_stores};
use std::sync::Arc;

/// Record stores plus the history store backing them.
pub struct Backend {
    pub stores: DataStores,
    pub history: Arc<dyn HistoryStore>,
}

/// Open the configured storage backend.
///
/// Outlook is never linked from the CLI, so calendar tools report the
/// account as not connected.
pub async fn open_backend(config: &AppConfig) -> Result<Backend, Box<dyn std::error::Error>> {
    let calendar = Arc::new(DisconnectedCalendar);
    match config.storage.backend {
        StorageBackend::Sqlite => {
            let path = config.storage.database_path();
            let store = Arc::new(
                SqliteStore::open_file(&path)
                    .await
                    .map_err(|e| format!("Failed to open {}: {e}", path.display()))?,
            );
            Ok(Backend {
                stores: data_stores(store.clone(), calendar),
                history: store,
            })
        }
        StorageBackend::Memory => {
            let store = Arc::new(InMemoryStore::new());
            Ok(Backend {
                stores: data_stores(store.clone(), calendar),
                history: store,
            })
        }
    }
}
