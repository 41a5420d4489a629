use anyhow::{Context, Result};
use chatbox_application::ChatStore;
use chatbox_infrastructure::{StorageBackend, StoreConfig};

pub async fn run(config: &StoreConfig) -> Result<()> {
    let store = ChatStore::open(config).await.context("Failed to open store")?;
    let snapshot = store.bridge().snapshot();

    match config.storage.backend {
        StorageBackend::File => {
            let data_dir = config.paths().data_dir()?;
            println!("Storage:         file ({})", data_dir.display());
        }
        StorageBackend::Memory => println!("Storage:         memory"),
    }
    println!("Schema version:  {}", store.migration_report().to);
    println!("Sessions:        {}", snapshot.sessions.len());
    println!(
        "Starred:         {}",
        snapshot.sessions.iter().filter(|s| s.starred).count()
    );
    println!(
        "Current session: {}",
        snapshot
            .current_session_id
            .as_deref()
            .and_then(|id| snapshot.session(id))
            .map(|s| format!("{} ({})", s.name, s.id))
            .unwrap_or_else(|| "none".to_string())
    );
    println!("Sidebar:         {}", if snapshot.settings.show_sidebar { "shown" } else { "hidden" });
    println!("Blobs in use:    {}", store.cleanup_report().retained);
    Ok(())
}
