// src/config.rs

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub steering: SteeringConfig,
    #[serde(default)]
    pub stall: StallConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub width: usize,
    pub height: usize,
    pub fps: u32,
    /// Flip upside down or not
    pub vflip: bool,
    /// Flip left-right or not
    pub hflip: bool,
    /// Settle time before the first frame is pulled
    pub warmup_ms: u64,
    /// Which frame source to build: "synthetic" or "sequence"
    pub source: String,
    /// Still-image directory for the sequence source
    pub input_dir: String,
    /// Wrap around at the end of the sequence instead of stopping
    pub loop_input: bool,
    /// Stop after this many frames; 0 = run until interrupted
    pub max_frames: u64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            fps: 24,
            vflip: false,
            hflip: false,
            warmup_ms: 1000, // 1s camera warm-up
            source: "synthetic".to_string(),
            input_dir: "frames".to_string(),
            loop_input: false,
            max_frames: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    /// Lower HSV bound, inclusive. 8-bit convention: hue halved to 0..=179.
    pub lower_bound: [u8; 3],
    /// Upper HSV bound, inclusive
    pub upper_bound: [u8; 3],
    /// Only the top `roi_rows` rows of the frame are segmented
    pub roi_rows: usize,
    /// Enclosing-circle radius above which a blob counts as the line
    pub min_radius: f32,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            lower_bound: [100, 115, 145],
            upper_bound: [255, 255, 255],
            roi_rows: 350, // drops the bottom 130 rows of a 480-row frame
            min_radius: 4.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteeringConfig {
    /// Duty percent on both wheels when centered or the line is not found
    pub baseline_duty: u8,
    /// Duty correction = centroid offset / gain_divisor
    pub gain_divisor: f32,
    /// Clamp floor, keeps forward momentum
    pub duty_min: u8,
    /// Clamp ceiling, mechanical limit
    pub duty_max: u8,
    /// Centroid offsets within this many px of frame center need no correction
    pub dead_zone_half_width: i32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            baseline_duty: 45,
            gain_divisor: 15.0,
            duty_min: 20,
            duty_max: 70,
            dead_zone_half_width: 25, // dead zone [295, 345] on a 640px frame
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StallConfig {
    /// No confident detection for this long = stalled
    pub timeout_secs: f64,
    /// Open-loop reverse duration
    pub recovery_secs: f64,
}

impl Default for StallConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 5.0,
            recovery_secs: 1.0,
        }
    }
}

/// Pin assignment of one wheel channel: two direction pins and one PWM pin.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelPins {
    pub in1: u8,
    pub in2: u8,
    pub pwm: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    pub pwm_frequency_hz: u32,
    pub left: ChannelPins,
    pub right: ChannelPins,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            pwm_frequency_hz: 50,
            left: ChannelPins {
                in1: 11,
                in2: 13,
                pwm: 15,
            },
            right: ChannelPins {
                in1: 29,
                in2: 31,
                pwm: 33,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub output_dir: String,
    pub events_file: String,
    pub save_snapshots: bool,
    /// 0 = snapshots on recovery events only
    pub snapshot_every_n_frames: u64,
    pub jpeg_quality: u8,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            output_dir: "output".to_string(),
            events_file: "events.jsonl".to_string(),
            save_snapshots: true,
            snapshot_every_n_frames: 0,
            jpeg_quality: 85,
        }
    }
}

impl Config {
    /// Load from a YAML file, falling back to built-in defaults when the
    /// file does not exist. Out-of-range values are rejected here so the
    /// control loop never has to re-check them.
    pub fn load(path: &str) -> Result<Self> {
        let config = if Path::new(path).exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path))?;
            serde_yaml::from_str(&contents)
                .with_context(|| format!("failed to parse config file {}", path))?
        } else {
            warn!("Config file {} not found, using built-in defaults", path);
            Config::default()
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.camera.width == 0 || self.camera.height == 0 {
            bail!("camera resolution must be non-zero");
        }
        if self.camera.fps == 0 {
            bail!("camera fps must be non-zero");
        }
        if self.vision.roi_rows == 0 || self.vision.roi_rows > self.camera.height {
            bail!(
                "vision.roi_rows must be in 1..={} (got {})",
                self.camera.height,
                self.vision.roi_rows
            );
        }
        for ch in 0..3 {
            if self.vision.lower_bound[ch] > self.vision.upper_bound[ch] {
                bail!(
                    "vision bounds inverted on channel {}: {} > {}",
                    ch,
                    self.vision.lower_bound[ch],
                    self.vision.upper_bound[ch]
                );
            }
        }
        if self.steering.duty_min >= self.steering.duty_max {
            bail!(
                "steering clamp inverted: duty_min {} >= duty_max {}",
                self.steering.duty_min,
                self.steering.duty_max
            );
        }
        if self.steering.duty_max > 100 {
            bail!("steering.duty_max must be <= 100");
        }
        if self.steering.baseline_duty < self.steering.duty_min
            || self.steering.baseline_duty > self.steering.duty_max
        {
            bail!(
                "steering.baseline_duty {} outside clamp [{}, {}]",
                self.steering.baseline_duty,
                self.steering.duty_min,
                self.steering.duty_max
            );
        }
        if self.steering.gain_divisor <= 0.0 {
            bail!("steering.gain_divisor must be positive");
        }
        if self.steering.dead_zone_half_width < 0 {
            bail!("steering.dead_zone_half_width must be non-negative");
        }
        if self.stall.timeout_secs <= 0.0 {
            bail!("stall.timeout_secs must be positive");
        }
        if self.stall.recovery_secs <= 0.0 {
            bail!("stall.recovery_secs must be positive");
        }
        if self.vision.min_radius < 0.0 {
            bail!("vision.min_radius must be non-negative");
        }
        if self.output.jpeg_quality == 0 || self.output.jpeg_quality > 100 {
            bail!("output.jpeg_quality must be in 1..=100");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.width, 640);
        assert_eq!(config.steering.baseline_duty, 45);
        assert_eq!(config.vision.lower_bound, [100, 115, 145]);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "steering:\n  baseline_duty: 50\n  gain_divisor: 15.0\n  duty_min: 20\n  duty_max: 70\n  dead_zone_half_width: 25\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.steering.baseline_duty, 50);
        // untouched sections come from Default
        assert_eq!(config.camera.fps, 24);
        assert_eq!(config.stall.timeout_secs, 5.0);
    }

    #[test]
    fn test_validate_rejects_inverted_clamp() {
        let mut config = Config::default();
        config.steering.duty_min = 80;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_baseline_outside_clamp() {
        let mut config = Config::default();
        config.steering.baseline_duty = 10;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_roi_taller_than_frame() {
        let mut config = Config::default();
        config.vision.roi_rows = 481;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_color_bounds() {
        let mut config = Config::default();
        config.vision.lower_bound = [200, 115, 145];
        config.vision.upper_bound = [150, 255, 255];
        assert!(config.validate().is_err());
    }
}
