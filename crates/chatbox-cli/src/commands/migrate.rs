use anyhow::{Context, Result};
use chatbox_application::{StoreBootstrap, open_backends};
use chatbox_infrastructure::StoreConfig;

pub async fn run(config: &StoreConfig) -> Result<()> {
    let (repository, blobs) = open_backends(config).context("Failed to open storage")?;
    let migrated = StoreBootstrap::new(repository, blobs)
        .migrate()
        .await
        .context("Migration failed")?;
    let report = migrated.migration_report();

    if report.fresh_install {
        println!("Fresh store initialized at schema {}", report.to);
    } else if report.applied.is_empty() {
        println!("Store is already at schema {}", report.to);
    } else {
        println!("Migrated {} -> {}", report.from, report.to);
        for step in &report.applied {
            println!(
                "  {} -> {}  {} ({} keys changed)",
                step.from, step.to, step.description, step.changed_keys
            );
        }
    }
    Ok(())
}
