//! Batch Ingestion Example
//!
//! Registers a synthetic capture session, aggregates it, and writes the
//! store to a JSON snapshot. Running it twice shows the find-or-create
//! behavior: nothing new is stored on the second pass.
//!
//! Run with: cargo run --example batch_ingest [config.toml]

use chrono::{Duration, TimeZone, Utc};
use lidar_db::capture::{Capture, CapturePack, ChannelProfile};
use lidar_db::config::ServiceConfig;
use lidar_db::events::TracingSink;
use lidar_db::service::AggregationService;
use lidar_db::store::MemoryStore;
use lidar_db::telemetry::init_tracing;

const BINS: usize = 2048;

fn synthetic_pack() -> CapturePack {
    let session_start = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();

    (0..10)
        .map(|i| {
            let start = session_start + Duration::minutes(i);
            // Range-squared falloff plus a constant background
            let analog: Vec<f64> = (1..=BINS)
                .map(|bin| 1.0e6 / (bin * bin) as f64 + 3.0)
                .collect();
            Capture::builder(start, start + Duration::seconds(59))
                .site("Tomsk")
                .laser(1200, 20)
                .profile(ChannelProfile::new("BT0", 1200, analog.clone()))
                .profile(ChannelProfile::new("BC0", 1200, analog))
                .build()
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => ServiceConfig::load(path)?,
        None => ServiceConfig::default(),
    };
    init_tracing(&config.logging)?;

    println!("=== lidar-db Batch Ingestion ===\n");

    let service = AggregationService::with_config(MemoryStore::new(), TracingSink, config);
    let pack = synthetic_pack();

    // -------------------------------------------------------------------------
    // 1. Ingest the pack twice
    // -------------------------------------------------------------------------
    for pass in 1..=2 {
        let report = service.ingest_pack("Tomsk night", "synthetic", &pack).await?;
        println!(
            "Pass {pass}: experiment {} ({} new, {} already stored)",
            report.experiment.id(),
            report.created,
            report.existing
        );
    }

    // -------------------------------------------------------------------------
    // 2. Aggregate
    // -------------------------------------------------------------------------
    let start = pack.start_time().expect("pack is not empty");
    let experiment = service
        .experiments_started_at(start)
        .await?
        .into_iter()
        .next()
        .expect("experiment was registered");

    let result = service.create_processing_result(experiment.id()).await?;
    let aggregated = result.aggregated();
    println!("\nProcessing result {}", result.id());
    println!("   Mode: {}", result.mode());
    println!(
        "   Window: {} .. {}",
        aggregated.start_time(),
        aggregated.stop_time()
    );
    for profile in aggregated.profiles() {
        println!(
            "   {}: {} shots, first bin {:.1}",
            profile.label(),
            profile.shots(),
            profile.samples()[0]
        );
    }

    // -------------------------------------------------------------------------
    // 3. Snapshot
    // -------------------------------------------------------------------------
    let path = std::env::temp_dir().join("lidar-db-demo.json");
    service.store().save_json(&path)?;
    println!("\nSnapshot written to {}", path.display());

    Ok(())
}
