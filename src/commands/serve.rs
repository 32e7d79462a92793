use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;

use ercrowd::app::App;
use ercrowd::config::Config;
use ercrowd::metrics;
use ercrowd::scheduler::FleetScheduler;

/// Run the periodic scheduler until Ctrl-C
pub async fn serve(config: Config) -> Result<()> {
    if let Err(e) = metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics disabled");
    }

    let app = App::build(config).await?;
    let scheduler = FleetScheduler::from_config(app.service.clone(), &app.config.scraper)
        .context("Cannot start scheduler")?;

    let metrics_listener = if app.config.metrics.enabled {
        let addr = &app.config.metrics.bind_address;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind metrics endpoint to {addr}"))?;
        Some(listener)
    } else {
        None
    };

    println!("Starting ercrowd scheduler");
    println!("==========================");
    println!("  Interval: {}s", scheduler.interval().as_secs());
    println!("  Job timeout: {}s", app.config.scraper.job_timeout_secs);
    println!("  Max concurrent jobs: {}", app.config.scraper.max_concurrent_jobs);
    if let Some(listener) = &metrics_listener {
        println!("  Metrics: http://{}/metrics", listener.local_addr()?);
    }
    println!();
    println!("Press Ctrl-C to stop");

    let (stop_tx, stop_rx) = watch::channel(false);
    let metrics_task = metrics_listener.map(|listener| {
        let mut stop_rx = stop_rx;
        tokio::spawn(metrics::serve(listener, async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        }))
    });

    let handle = Arc::new(scheduler).spawn()?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    println!("\nShutting down, waiting for the current run to finish...");
    handle.shutdown().await?;

    let _ = stop_tx.send(true);
    if let Some(task) = metrics_task {
        task.await
            .context("Metrics endpoint task panicked")?
            .context("Metrics endpoint failed")?;
    }
    println!("Stopped");

    Ok(())
}
