// src/control/steering.rs
//
// Proportional differential steering.
//
// The horizontal offset of the track centroid from frame center is
// divided by a gain and split across the two wheels: the inner wheel
// slows by the correction, the outer wheel speeds up by it. Inside the
// dead zone both wheels run at the baseline duty.

use crate::config::SteeringConfig;
use crate::types::{Blob, MotorCommand};

pub struct SteeringController {
    baseline_duty: u8,
    gain_divisor: f32,
    duty_min: u8,
    duty_max: u8,
    dead_zone_half_width: i32,
    frame_center_x: i32,
}

impl SteeringController {
    pub fn new(config: &SteeringConfig, frame_width: usize) -> Self {
        Self {
            baseline_duty: config.baseline_duty,
            gain_divisor: config.gain_divisor,
            duty_min: config.duty_min,
            duty_max: config.duty_max,
            dead_zone_half_width: config.dead_zone_half_width,
            frame_center_x: (frame_width / 2) as i32,
        }
    }

    /// Compute per-wheel duty for the current centroid.
    ///
    /// A missing blob steers straight at the baseline duty rather than
    /// chasing the fallback centroid. Correction terms truncate toward
    /// zero after the subtraction, then clamp into [duty_min, duty_max].
    pub fn steer(&self, blob: &Blob) -> MotorCommand {
        if !blob.found {
            return MotorCommand::straight(self.baseline_duty);
        }

        let dx = blob.cx - self.frame_center_x;
        if dx.abs() <= self.dead_zone_half_width {
            return MotorCommand::straight(self.baseline_duty);
        }

        let correction = dx as f32 / self.gain_divisor;
        let left = (self.baseline_duty as f32 - correction) as i32;
        let right = (self.baseline_duty as f32 + correction) as i32;

        MotorCommand {
            left: self.clamp_duty(left),
            right: self.clamp_duty(right),
        }
    }

    fn clamp_duty(&self, duty: i32) -> u8 {
        duty.clamp(self.duty_min as i32, self.duty_max as i32) as u8
    }
}
