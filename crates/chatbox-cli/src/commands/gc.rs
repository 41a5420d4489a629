use anyhow::{Context, Result};
use chatbox_application::ChatStore;
use chatbox_infrastructure::StoreConfig;

pub async fn run(config: &StoreConfig) -> Result<()> {
    let store = ChatStore::open(config).await.context("Failed to open store")?;
    let report = store.cleanup_report();

    if report.is_clean() {
        println!("Nothing to clean ({} blobs in use)", report.retained);
        return Ok(());
    }

    for key in &report.deleted {
        println!("deleted   {}", key);
    }
    for key in &report.failed {
        println!("failed    {}", key);
    }
    for orphan in &report.orphans {
        println!("cleared   {} (session {})", orphan.key, orphan.session_id);
    }
    println!(
        "{} deleted, {} failed, {} references cleared, {} blobs in use",
        report.deleted.len(),
        report.failed.len(),
        report.orphans.len(),
        report.retained
    );
    Ok(())
}
