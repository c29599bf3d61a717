// src/drive.rs
//
// Motor actuation behind a trait so the control loop never knows
// whether real hardware sits on the other side. Each wheel channel is
// an H-bridge half: two direction pins plus one PWM pin whose duty
// cycle sets wheel speed.
//
// SimulatedDrive is the only implementation here. It tracks the exact
// pin state a hardware backend would hold and logs transitions, which
// is what the JSONL telemetry and the tests observe.

use crate::config::{ChannelPins, DriveConfig};
use crate::types::{DriveDirection, MotorSide};
use anyhow::Result;
use tracing::{debug, info, warn};

pub trait MotorDriver {
    /// Set the direction pins of one wheel channel.
    fn set_direction(&mut self, side: MotorSide, direction: DriveDirection) -> Result<()>;

    /// Set the PWM duty cycle of one wheel channel, percent.
    fn set_duty(&mut self, side: MotorSide, duty: u8) -> Result<()>;

    /// Drop both channels to a safe state: direction pins low, duty zero.
    fn release(&mut self) -> Result<()>;
}

struct Channel {
    pins: ChannelPins,
    direction: DriveDirection,
    duty: u8,
}

impl Channel {
    fn new(pins: ChannelPins) -> Self {
        Self {
            pins,
            direction: DriveDirection::Stopped,
            duty: 0,
        }
    }
}

pub struct SimulatedDrive {
    left: Channel,
    right: Channel,
}

impl SimulatedDrive {
    pub fn new(config: &DriveConfig) -> Self {
        info!(
            "✓ Drive ready: left pins in1={} in2={} pwm={}, right pins in1={} in2={} pwm={}, {} Hz PWM",
            config.left.in1,
            config.left.in2,
            config.left.pwm,
            config.right.in1,
            config.right.in2,
            config.right.pwm,
            config.pwm_frequency_hz
        );
        Self {
            left: Channel::new(config.left),
            right: Channel::new(config.right),
        }
    }

    fn channel_mut(&mut self, side: MotorSide) -> &mut Channel {
        match side {
            MotorSide::Left => &mut self.left,
            MotorSide::Right => &mut self.right,
        }
    }

    fn channel(&self, side: MotorSide) -> &Channel {
        match side {
            MotorSide::Left => &self.left,
            MotorSide::Right => &self.right,
        }
    }

    pub fn direction(&self, side: MotorSide) -> DriveDirection {
        self.channel(side).direction
    }

    pub fn duty(&self, side: MotorSide) -> u8 {
        self.channel(side).duty
    }
}

impl MotorDriver for SimulatedDrive {
    fn set_direction(&mut self, side: MotorSide, direction: DriveDirection) -> Result<()> {
        let channel = self.channel_mut(side);
        if channel.direction != direction {
            let (in1, in2) = direction.pin_levels();
            debug!(
                "{} motor -> {} (pin {}={}, pin {}={})",
                side.as_str(),
                direction.as_str(),
                channel.pins.in1,
                in1 as u8,
                channel.pins.in2,
                in2 as u8
            );
        }
        channel.direction = direction;
        Ok(())
    }

    fn set_duty(&mut self, side: MotorSide, duty: u8) -> Result<()> {
        let channel = self.channel_mut(side);
        if channel.duty != duty {
            debug!(
                "{} motor duty {}% -> {}% (pin {})",
                side.as_str(),
                channel.duty,
                duty,
                channel.pins.pwm
            );
        }
        channel.duty = duty;
        Ok(())
    }

    fn release(&mut self) -> Result<()> {
        debug!(
            "Releasing drive: left {}% {}, right {}% {}",
            self.duty(MotorSide::Left),
            self.direction(MotorSide::Left).as_str(),
            self.duty(MotorSide::Right),
            self.direction(MotorSide::Right).as_str()
        );
        for side in [MotorSide::Left, MotorSide::Right] {
            self.set_direction(side, DriveDirection::Stopped)?;
            self.set_duty(side, 0)?;
        }
        info!("🛑 Drive released, all pins low");
        Ok(())
    }
}

/// Owns a driver for the lifetime of a run and guarantees the motors
/// end up released, even on an early error path. Explicit `release`
/// is the normal route; Drop is the backstop.
pub struct DriveGuard<D: MotorDriver> {
    driver: D,
    released: bool,
}

impl<D: MotorDriver> DriveGuard<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            released: false,
        }
    }

    pub fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        self.driver.release()
    }
}

impl<D: MotorDriver> std::ops::Deref for DriveGuard<D> {
    type Target = D;

    fn deref(&self) -> &D {
        &self.driver
    }
}

impl<D: MotorDriver> std::ops::DerefMut for DriveGuard<D> {
    fn deref_mut(&mut self) -> &mut D {
        &mut self.driver
    }
}

impl<D: MotorDriver> Drop for DriveGuard<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to release drive on shutdown: {}", e);
        }
    }
}
