use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use ercrowd::app::{load_hospitals, seed_directory};
use ercrowd::config::Config;
use ercrowd::sources::{ScraperFactory, SourceRegistry};
use ercrowd::storage::{self, HospitalDirectory, StatusStore};

/// Load the static hospital directory file into storage
pub async fn seed(config: Config, file: &Path) -> Result<()> {
    let storage = storage::connect(&config.database).await?;
    let seeds = load_hospitals(file)?;

    let written = seed_directory(storage.as_ref(), &SourceRegistry::standard(), &seeds).await?;
    println!("Seeded {written} hospitals from {}", file.display());
    Ok(())
}

/// Current status plus the most recent history rows
pub async fn status(config: Config, hospital_id: i64, limit: usize) -> Result<()> {
    let storage = storage::connect(&config.database).await?;

    let hospital = storage
        .get_hospital(hospital_id)
        .await?
        .with_context(|| format!("Hospital {hospital_id} not found"))?;

    println!("{}", hospital.label());
    println!("{}", "=".repeat(hospital.label().chars().count()));

    match storage.current_status(hospital_id).await? {
        Some(status) => {
            println!("  Colour: {}", status.color_code);
            println!("  Waiting: {}", status.patients_waiting);
            println!("  Estimated wait: {} min", status.waiting_time);
            println!("  Available beds: {}", status.available_beds);
            if let Some(stamp) = status.external_last_update {
                println!("  Source updated: {stamp}");
            }
            println!("  Last updated: {}", status.last_updated);
        }
        None => println!("  No status recorded yet"),
    }

    let history = storage.history(hospital_id, limit).await?;
    if !history.is_empty() {
        println!("\nHistory");
        println!("-------");
        for row in history {
            println!(
                "  {}  {:<8} waiting {:>3}  wait {:>3} min",
                row.scraped_at.format("%Y-%m-%d %H:%M"),
                row.color_code.as_str(),
                row.patients_waiting,
                row.waiting_time
            );
        }
    }

    Ok(())
}

/// Registry entries and whether a strategy is wired for each
pub fn sources() {
    let registry = Arc::new(SourceRegistry::standard());
    let factory = ScraperFactory::standard(registry.clone());
    let available = factory.available_sources();

    println!("Registered sources");
    println!("==================");
    for (id, code) in registry.entries() {
        let mark = if available.contains(&code) { "" } else { "  (no strategy)" };
        println!("  {id:>2}  {:<24} {}{mark}", code.as_str(), code.family().as_str());
    }
}
