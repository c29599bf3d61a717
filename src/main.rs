// src/main.rs

mod capture;
mod config;
mod control;
mod drive;
mod overlay;
mod runner;
mod telemetry;
mod types;
mod vision;

use anyhow::Result;
use config::Config;
use drive::SimulatedDrive;
use runner::{ControlLoop, RunStats};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("linetrack=info")
        .init();

    info!("🚗 Line Tracker Starting...");

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    info!(
        "✓ Camera: {}x{} @ {} fps, segmenting top {} rows, HSV {:?}..{:?}",
        config.camera.width,
        config.camera.height,
        config.camera.fps,
        config.vision.roi_rows,
        config.vision.lower_bound,
        config.vision.upper_bound
    );
    info!(
        "✓ Steering: baseline {}%, clamp [{}%, {}%], dead zone ±{} px",
        config.steering.baseline_duty,
        config.steering.duty_min,
        config.steering.duty_max,
        config.steering.dead_zone_half_width
    );
    info!(
        "✓ Stall: recover after {:.1}s without the line, reverse for {:.1}s",
        config.stall.timeout_secs, config.stall.recovery_secs
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Ctrl-C received, stopping after the current cycle");
                shutdown.store(true, Ordering::SeqCst);
            }
        });
    }

    let source = capture::build_source(&config.camera)?;
    let driver = SimulatedDrive::new(&config.drive);
    let control = ControlLoop::new(config, source, driver, shutdown)?;
    let stats = control.run().await?;

    report(&stats);
    Ok(())
}

fn report(stats: &RunStats) {
    info!("📊 ===== RUN COMPLETE =====");
    info!("   Frames processed: {}", stats.frames);
    info!(
        "   Confident detections: {} ({:.1}%)",
        stats.confident_detections,
        stats.detection_rate()
    );
    info!("   Stalls: {}", stats.stalls);
    info!("   Recoveries completed: {}", stats.recoveries_completed);
    info!("   Snapshots saved: {}", stats.snapshots_saved);
    info!("   Events written: {}", stats.events_written);
    info!(
        "   Duration: {:.1}s ({:.1} fps)",
        stats.duration_secs,
        stats.avg_fps()
    );
}
