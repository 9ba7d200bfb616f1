//! `slo status`: show configuration and storage status.

use slo_config::{AppConfig, StorageBackend};
use slo_store::{DisconnectedCalendar, InMemoryStore, SqliteStore, data_stores};
use std::sync::Arc;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let policy = &config.agent;

    println!("Slo Status");
    println!("==========");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Model:        {}", config.provider.model);
    println!("  Endpoint:     {}", config.provider.base_url);
    println!("  API key:      {}", if config.has_api_key() { "configured" } else { "missing" });
    println!("  Temperature:  {}", config.provider.temperature);
    println!("  Max tokens:   {}", config.provider.max_tokens);
    println!(
        "  Policy:       {} steps, {} writes/turn, confirm after {}",
        policy.max_tool_calls, policy.max_writes_per_turn, policy.require_confirm_threshold
    );
    println!(
        "  Rate limit:   {} turns per {}s",
        config.rate_limit.max_calls, config.rate_limit.window_secs
    );
    println!(
        "  History:      {} (last {})",
        if config.history.enabled { "enabled" } else { "disabled" },
        config.history.limit
    );

    match config.storage.backend {
        StorageBackend::Memory => println!("  Storage:      memory"),
        StorageBackend::Sqlite => {
            let path = config.storage.database_path();
            println!("  Storage:      sqlite ({})", path.display());
            if path.exists() {
                let store = SqliteStore::open_file(&path).await?;
                for (table, count) in store.table_counts().await? {
                    println!("    {table:<14}{count}");
                }
            }
        }
    }

    let stores = data_stores(Arc::new(InMemoryStore::new()), Arc::new(DisconnectedCalendar));
    let tools = slo_tools::default_registry(&stores);
    println!("  Tools:        {}", tools.names().join(", "));

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, run `slo onboard` first");
    }

    Ok(())
}
