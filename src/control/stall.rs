// src/control/stall.rs
//
// Stall detection and timed recovery.
//
// The monitor watches for confident line detections. If none arrives
// for longer than the configured timeout the vehicle is assumed stalled
// (wedged against the line, or the line left the field of view) and a
// fixed-length reverse maneuver is scheduled. The maneuver runs to its
// deadline regardless of what perception reports in the meantime; the
// detection timer restarts both when recovery begins and when it ends,
// so back-to-back recoveries are always a full timeout apart.

use crate::config::StallConfig;
use crate::types::Blob;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq)]
enum State {
    Tracking,
    Recovering,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StallEvent {
    RecoveryStarted {
        frame_id: u64,
        timestamp_s: f64,
        seconds_without_detection: f64,
        stall_number: u64,
    },
    RecoveryComplete {
        frame_id: u64,
        timestamp_s: f64,
        stall_number: u64,
    },
}

pub struct StallMonitor {
    state: State,
    timeout_secs: f64,
    recovery_secs: f64,
    min_radius: f32,
    last_detection_s: f64,
    recovery_deadline_s: f64,
    stall_count: u64,
}

impl StallMonitor {
    pub fn new(config: &StallConfig, min_radius: f32, start_time_s: f64) -> Self {
        Self {
            state: State::Tracking,
            timeout_secs: config.timeout_secs,
            recovery_secs: config.recovery_secs,
            min_radius,
            last_detection_s: start_time_s,
            recovery_deadline_s: 0.0,
            stall_count: 0,
        }
    }

    /// Advance the monitor by one perception cycle.
    ///
    /// Only blobs larger than the confidence radius count as detections;
    /// small matches keep the starvation timer running. The timer refresh
    /// happens before the timeout comparison, so a confident detection on
    /// the same cycle the timeout would expire keeps the vehicle tracking.
    pub fn update(&mut self, blob: &Blob, now_s: f64, frame_id: u64) -> Option<StallEvent> {
        match self.state {
            State::Tracking => {
                if blob.found && blob.radius > self.min_radius {
                    self.last_detection_s = now_s;
                    return None;
                }

                let starved_for = now_s - self.last_detection_s;
                if starved_for > self.timeout_secs {
                    self.stall_count += 1;
                    self.state = State::Recovering;
                    self.recovery_deadline_s = now_s + self.recovery_secs;
                    self.last_detection_s = now_s;
                    return Some(StallEvent::RecoveryStarted {
                        frame_id,
                        timestamp_s: now_s,
                        seconds_without_detection: starved_for,
                        stall_number: self.stall_count,
                    });
                }
                None
            }
            State::Recovering => {
                if now_s >= self.recovery_deadline_s {
                    self.state = State::Tracking;
                    self.last_detection_s = now_s;
                    return Some(StallEvent::RecoveryComplete {
                        frame_id,
                        timestamp_s: now_s,
                        stall_number: self.stall_count,
                    });
                }
                None
            }
        }
    }

    pub fn is_recovering(&self) -> bool {
        self.state == State::Recovering
    }

    pub fn state_str(&self) -> &'static str {
        match self.state {
            State::Tracking => "TRACKING",
            State::Recovering => "RECOVERING",
        }
    }

    pub fn seconds_since_detection(&self, now_s: f64) -> f64 {
        now_s - self.last_detection_s
    }
}
