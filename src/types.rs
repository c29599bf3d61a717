// src/types.rs

use serde::Serialize;

/// One captured color image. Owned by the cycle that pulled it and dropped
/// at the end of that cycle; nothing retains frames across cycles.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Packed RGB, row-major, 3 bytes per pixel
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub timestamp_ms: f64,
}

impl Frame {
    pub fn new(width: usize, height: usize, timestamp_ms: f64) -> Self {
        Self {
            data: vec![0u8; width * height * 3],
            width,
            height,
            timestamp_ms,
        }
    }

    /// RGB triple at (x, y). Caller keeps coordinates in bounds.
    pub fn pixel(&self, x: usize, y: usize) -> (u8, u8, u8) {
        let i = (y * self.width + x) * 3;
        (self.data[i], self.data[i + 1], self.data[i + 2])
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, rgb: (u8, u8, u8)) {
        let i = (y * self.width + x) * 3;
        self.data[i] = rgb.0;
        self.data[i + 1] = rgb.1;
        self.data[i + 2] = rgb.2;
    }
}

/// Binary mask over the segmented region of interest. Same width as the
/// source frame, height limited to the configured top rows. One byte per
/// pixel, 255 = line-colored, 0 = background.
#[derive(Debug, Clone)]
pub struct ColorMask {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
}

impl ColorMask {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            data: vec![0u8; width * height],
            width,
            height,
        }
    }

    #[inline]
    pub fn is_set(&self, x: usize, y: usize) -> bool {
        self.data[y * self.width + x] != 0
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize) {
        self.data[y * self.width + x] = 255;
    }

    pub fn foreground_count(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Largest connected foreground region of the current cycle's mask,
/// reduced to the values the controller needs.
///
/// When nothing was found the centroid holds the steering-neutral fallback
/// (frame midpoint), not a real detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Blob {
    pub cx: i32,
    pub cy: i32,
    /// Radius of the minimum enclosing circle of the region boundary
    pub radius: f32,
    pub found: bool,
}

impl Blob {
    pub fn not_found(default_cx: i32, default_cy: i32) -> Self {
        Self {
            cx: default_cx,
            cy: default_cy,
            radius: 0.0,
            found: false,
        }
    }
}

/// Duty-cycle pair commanded to the two wheel channels, percent.
/// Both values already sit inside the configured clamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MotorCommand {
    pub left: u8,
    pub right: u8,
}

impl MotorCommand {
    pub fn straight(duty: u8) -> Self {
        Self {
            left: duty,
            right: duty,
        }
    }
}

/// Wheel channel selector for the actuator interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorSide {
    Left,
    Right,
}

impl MotorSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

/// Direction state of one wheel channel, encoded on two boolean pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriveDirection {
    Forward,
    Reverse,
    Stopped,
}

impl DriveDirection {
    /// (in1, in2) pin levels for this direction
    pub fn pin_levels(&self) -> (bool, bool) {
        match self {
            Self::Forward => (true, false),
            Self::Reverse => (false, true),
            Self::Stopped => (false, false),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Forward => "FORWARD",
            Self::Reverse => "REVERSE",
            Self::Stopped => "STOPPED",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_pin_levels() {
        assert_eq!(DriveDirection::Forward.pin_levels(), (true, false));
        assert_eq!(DriveDirection::Reverse.pin_levels(), (false, true));
        assert_eq!(DriveDirection::Stopped.pin_levels(), (false, false));
    }

    #[test]
    fn test_mask_indexing() {
        let mut mask = ColorMask::new(8, 4);
        assert!(!mask.is_set(3, 2));
        mask.set(3, 2);
        assert!(mask.is_set(3, 2));
        assert_eq!(mask.foreground_count(), 1);
    }

    #[test]
    fn test_frame_pixel_roundtrip() {
        let mut frame = Frame::new(4, 4, 0.0);
        frame.set_pixel(1, 3, (10, 20, 30));
        assert_eq!(frame.pixel(1, 3), (10, 20, 30));
        assert_eq!(frame.pixel(0, 0), (0, 0, 0));
    }
}
