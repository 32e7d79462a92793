use anyhow::Result;

use ercrowd::app::App;
use ercrowd::config::Config;
use ercrowd::error::Error;
use ercrowd::ingest::{FleetReport, IngestError};

/// One manual fleet run
pub async fn run(config: Config) -> Result<()> {
    let app = App::build(config).await?;
    let trigger = app.manual_trigger().await;

    match trigger.run_fleet_now().await {
        Ok(report) => {
            print_report(&report);
            Ok(())
        }
        Err(IngestError::RateLimited(e)) => {
            println!("Manual run rejected: retry in {}s", e.remaining().as_secs());
            Err(IngestError::RateLimited(e).into())
        }
        Err(e) => Err(report_failure(e.into()).into()),
    }
}

pub async fn run_hospital(config: Config, hospital_id: i64) -> Result<()> {
    let app = App::build(config).await?;
    let trigger = app.manual_trigger().await;

    let ok = trigger
        .run_hospital_now(hospital_id)
        .await
        .map_err(|e| report_failure(e.into()))?;
    if ok {
        println!("Hospital {hospital_id}: status updated");
    } else {
        println!("Hospital {hospital_id}: no status written (see log for the reason)");
    }
    Ok(())
}

fn report_failure(err: Error) -> Error {
    tracing::error!(
        category = err.category().description(),
        recoverable = err.is_recoverable(),
        error = %err,
        "Manual run failed"
    );
    err
}

fn print_report(report: &FleetReport) {
    println!("\nFleet Run Summary");
    println!("=================");
    for (label, outcome) in &report.outcomes {
        let mark = if outcome.is_success() { "ok " } else { "ERR" };
        println!("  [{mark}] {label} ({})", outcome.as_str());
    }
    println!();
    println!("Succeeded: {}", report.succeeded());
    println!("Failed: {}", report.failed());
    println!("Total: {}", report.total());
    println!("Duration: {:.1}s", report.duration.as_secs_f64());
}
