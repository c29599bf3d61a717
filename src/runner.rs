// src/runner.rs
//
// The perception-and-control loop.
//
// Each cycle pulls one frame, segments it, reduces the mask to the
// largest blob, advances the stall monitor, and commands the wheel
// duties. Recovery transitions flip the direction pins and are recorded
// to the JSONL event stream with an annotated snapshot. The loop runs
// until the source is exhausted, the frame limit is reached, or the
// shutdown flag is raised; the drive guard puts the motors in a safe
// state on every exit path.

use crate::capture::FrameSource;
use crate::config::Config;
use crate::control::{StallEvent, StallMonitor, SteeringController};
use crate::drive::{DriveGuard, MotorDriver};
use crate::overlay;
use crate::telemetry::EventLog;
use crate::types::{Blob, DriveDirection, Frame, MotorCommand, MotorSide};
use crate::vision::{BlobLocator, ColorSegmenter};
use anyhow::Result;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const PROGRESS_EVERY_N_FRAMES: u64 = 50;

#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub frames: u64,
    pub confident_detections: u64,
    pub stalls: u64,
    pub recoveries_completed: u64,
    pub snapshots_saved: u64,
    pub events_written: u64,
    pub duration_secs: f64,
}

impl RunStats {
    pub fn detection_rate(&self) -> f64 {
        if self.frames == 0 {
            return 0.0;
        }
        self.confident_detections as f64 * 100.0 / self.frames as f64
    }

    pub fn avg_fps(&self) -> f64 {
        if self.duration_secs <= 0.0 {
            return 0.0;
        }
        self.frames as f64 / self.duration_secs
    }
}

pub struct ControlLoop<D: MotorDriver> {
    config: Config,
    source: Box<dyn FrameSource>,
    drive: DriveGuard<D>,
    segmenter: ColorSegmenter,
    locator: BlobLocator,
    steering: SteeringController,
    stall: StallMonitor,
    events: EventLog,
    shutdown: Arc<AtomicBool>,
}

impl<D: MotorDriver> ControlLoop<D> {
    pub fn new(
        config: Config,
        source: Box<dyn FrameSource>,
        driver: D,
        shutdown: Arc<AtomicBool>,
    ) -> Result<Self> {
        let (width, height) = source.resolution();
        let events = EventLog::create(
            Path::new(&config.output.output_dir),
            &config.output.events_file,
        )?;

        Ok(Self {
            segmenter: ColorSegmenter::new(&config.vision),
            locator: BlobLocator::new(width, height),
            steering: SteeringController::new(&config.steering, width),
            stall: StallMonitor::new(&config.stall, config.vision.min_radius, 0.0),
            drive: DriveGuard::new(driver),
            config,
            source,
            events,
            shutdown,
        })
    }

    pub async fn run(mut self) -> Result<RunStats> {
        let (width, height) = self.source.resolution();
        info!("🚗 Control loop starting: {}", self.source.describe());

        // Startup protocol: direction pins low and baseline duty while the
        // camera settles, forward engaged only for the first real cycle.
        for side in [MotorSide::Left, MotorSide::Right] {
            self.drive.set_direction(side, DriveDirection::Stopped)?;
            self.drive
                .set_duty(side, self.config.steering.baseline_duty)?;
        }

        if self.config.camera.warmup_ms > 0 {
            debug!("Letting the camera settle for {} ms", self.config.camera.warmup_ms);
            tokio::time::sleep(Duration::from_millis(self.config.camera.warmup_ms)).await;
        }

        for side in [MotorSide::Left, MotorSide::Right] {
            self.drive.set_direction(side, DriveDirection::Forward)?;
        }

        self.events.append(&json!({
            "event": "startup",
            "source": self.source.describe(),
            "resolution": [width, height],
            "fps": self.config.camera.fps,
            "baseline_duty": self.config.steering.baseline_duty,
        }))?;

        let started = Instant::now();
        let frame_interval = Duration::from_secs_f64(1.0 / self.config.camera.fps as f64);
        let mut stats = RunStats::default();
        let mut frame_id: u64 = 0;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("🛑 Shutdown requested, stopping control loop");
                break;
            }
            if self.config.camera.max_frames > 0 && frame_id >= self.config.camera.max_frames {
                info!("Reached max_frames = {}, stopping", self.config.camera.max_frames);
                break;
            }

            let Some(frame) = self.source.next_frame()? else {
                info!("Frame source exhausted after {} frames", frame_id);
                break;
            };
            frame_id += 1;
            stats.frames += 1;

            let now_s = started.elapsed().as_secs_f64();
            let mask = self.segmenter.segment(&frame);
            let blob = self.locator.locate(&mask);
            if blob.found && blob.radius > self.config.vision.min_radius {
                stats.confident_detections += 1;
            }

            if let Some(event) = self.stall.update(&blob, now_s, frame_id) {
                self.handle_stall_event(&event, &frame, &blob, &mut stats)?;
            }

            // Recovery is open-loop: perception keeps running but the
            // wheels hold the baseline duty in reverse until the deadline.
            let command = if self.stall.is_recovering() {
                MotorCommand::straight(self.config.steering.baseline_duty)
            } else {
                self.steering.steer(&blob)
            };
            self.drive.set_duty(MotorSide::Left, command.left)?;
            self.drive.set_duty(MotorSide::Right, command.right)?;

            debug!(
                "frame {}: {} mask px, centroid ({}, {}) r={:.1} found={} state={} starved {:.1}s duty L={}% R={}%",
                frame_id,
                mask.foreground_count(),
                blob.cx,
                blob.cy,
                blob.radius,
                blob.found,
                self.stall.state_str(),
                self.stall.seconds_since_detection(now_s),
                command.left,
                command.right
            );

            if frame_id % PROGRESS_EVERY_N_FRAMES == 0 {
                info!(
                    "📊 {} frames, {:.1}% confident, {} stalls, duty L={}% R={}%",
                    frame_id,
                    stats.detection_rate(),
                    stats.stalls,
                    command.left,
                    command.right
                );
            }

            if self.config.output.save_snapshots
                && self.config.output.snapshot_every_n_frames > 0
                && frame_id % self.config.output.snapshot_every_n_frames == 0
            {
                match self.save_annotated(frame_id, "periodic", &frame, &blob) {
                    Ok(_) => stats.snapshots_saved += 1,
                    Err(e) => warn!("Failed to save periodic snapshot: {}", e),
                }
            }

            tokio::time::sleep(frame_interval).await;
        }

        self.drive.release()?;
        stats.duration_secs = started.elapsed().as_secs_f64();
        self.events.append(&json!({
            "event": "shutdown",
            "frames": stats.frames,
            "confident_detections": stats.confident_detections,
            "stalls": stats.stalls,
            "recoveries_completed": stats.recoveries_completed,
            "duration_secs": stats.duration_secs,
        }))?;
        stats.events_written = self.events.count();
        info!(
            "💾 {} events recorded in {}",
            self.events.count(),
            self.events.path().display()
        );

        Ok(stats)
    }

    fn handle_stall_event(
        &mut self,
        event: &StallEvent,
        frame: &Frame,
        blob: &Blob,
        stats: &mut RunStats,
    ) -> Result<()> {
        self.events.append(&serde_json::to_value(event)?)?;

        match event {
            StallEvent::RecoveryStarted {
                frame_id,
                seconds_without_detection,
                stall_number,
                ..
            } => {
                warn!(
                    "⚠️ Stall #{}: no confident detection for {:.1}s, reversing",
                    stall_number, seconds_without_detection
                );
                stats.stalls += 1;

                if self.config.output.save_snapshots {
                    match self.save_annotated(*frame_id, "stall", frame, blob) {
                        Ok(path) => {
                            stats.snapshots_saved += 1;
                            info!("📸 Stall snapshot: {}", path.display());
                        }
                        Err(e) => warn!("Failed to save stall snapshot: {}", e),
                    }
                }

                for side in [MotorSide::Left, MotorSide::Right] {
                    self.drive.set_direction(side, DriveDirection::Reverse)?;
                }
            }
            StallEvent::RecoveryComplete { stall_number, .. } => {
                info!("✓ Recovery #{} complete, resuming forward tracking", stall_number);
                stats.recoveries_completed += 1;

                for side in [MotorSide::Left, MotorSide::Right] {
                    self.drive.set_direction(side, DriveDirection::Forward)?;
                }
            }
        }
        Ok(())
    }

    fn save_annotated(
        &self,
        frame_id: u64,
        tag: &str,
        frame: &Frame,
        blob: &Blob,
    ) -> Result<PathBuf> {
        let img = overlay::annotate(frame, blob, self.config.vision.min_radius)?;
        overlay::save_snapshot(
            Path::new(&self.config.output.output_dir),
            frame_id,
            tag,
            &img,
            self.config.output.jpeg_quality,
        )
    }
}
