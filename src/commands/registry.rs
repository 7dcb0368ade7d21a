//! Registry commands: group, stats, import.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation

use anyhow::{bail, Context, Result};

use crate::config::{Settings, StorageKind};
use crate::output::OutputControls;
use crate::registry::{loader, RegistryStats};

fn print_stats(stats: &RegistryStats, output: &OutputControls) {
    if output.wants_json() {
        output.print(stats);
        return;
    }

    println!("Registry ({}, {}):", stats.mode, stats.storage);
    println!("{}", "-".repeat(50));
    if let Some(path) = &stats.dataset_path {
        println!("dataset:        {}", path);
    }
    println!("source rows:    {}", stats.source_rows);
    println!("records:        {}", stats.record_rows);
    println!("dedupe groups:  {}", stats.dedupe_groups);
    println!("dedupe ratio:   {:.4}", stats.dedupe_ratio);
    if let Some(path) = &stats.sqlite_path {
        println!("sqlite:         {}", path);
    }
    match stats.sqlite_loaded_rows {
        Some(-1) => println!("sqlite load:    reused existing rows"),
        Some(rows) => println!("sqlite load:    {} rows imported", rows),
        None => {}
    }
    if stats.key_drift_rows > 0 {
        println!("key drift rows: {}", stats.key_drift_rows);
    }
}

/// Show the source ids collapsed into one representative record.
pub fn group(settings: &Settings, rep_id: i64, output: &OutputControls) -> Result<()> {
    let loaded = loader::load(settings).context("Failed to load name registry")?;
    let Some(members) = loaded.audit.group_ids_by_rep_id(rep_id) else {
        bail!(
            "No dedupe group with representative {} (mode {})",
            rep_id,
            loaded.audit.stats.mode
        );
    };

    if output.wants_json() {
        output.print(&serde_json::json!({ "rep_id": rep_id, "member_ids": members }));
    } else {
        let ids: Vec<String> = members.iter().map(i64::to_string).collect();
        println!("{} <- {}", rep_id, ids.join(", "));
    }
    Ok(())
}

/// Load the registry and print its audit stats.
pub fn stats(settings: &Settings, output: &OutputControls) -> Result<()> {
    let loaded = loader::load(settings).context("Failed to load name registry")?;
    print_stats(&loaded.audit.stats, output);
    Ok(())
}

/// Re-import the dataset into SQLite.
pub fn import(settings: &Settings, output: &OutputControls) -> Result<()> {
    if settings.storage != StorageKind::Sqlite {
        tracing::info!(storage = %settings.storage, "import always targets sqlite");
    }
    let settings = Settings {
        storage: StorageKind::Sqlite,
        sqlite_force_reload: true,
        ..settings.clone()
    };

    let loaded = loader::load(&settings).with_context(|| {
        format!(
            "Failed to import {} into {}",
            settings.dataset_path().display(),
            settings.sqlite_path.display()
        )
    })?;
    print_stats(&loaded.audit.stats, output);
    Ok(())
}
