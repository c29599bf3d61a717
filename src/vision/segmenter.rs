// src/vision/segmenter.rs

use crate::config::VisionConfig;
use crate::types::{ColorMask, Frame};
use crate::vision::morphology;

/// Turns a color frame into a binary mask of line-colored pixels.
///
/// Pixels are compared in HSV space, which holds up much better under
/// lighting changes than raw RGB thresholds. The mask only covers the top
/// `roi_rows` rows; the strip near the chassis is dropped before it can
/// contribute shadow noise. A single erode/dilate pass (morphological
/// opening) removes speckle while leaving any substantial line segment
/// intact.
pub struct ColorSegmenter {
    lower: [u8; 3],
    upper: [u8; 3],
    roi_rows: usize,
}

impl ColorSegmenter {
    pub fn new(config: &VisionConfig) -> Self {
        Self {
            lower: config.lower_bound,
            upper: config.upper_bound,
            roi_rows: config.roi_rows,
        }
    }

    /// All-black and all-white masks are valid outputs; the locator deals
    /// with both.
    pub fn segment(&self, frame: &Frame) -> ColorMask {
        let rows = self.roi_rows.min(frame.height);
        let mut mask = ColorMask::new(frame.width, rows);

        for y in 0..rows {
            for x in 0..frame.width {
                let (r, g, b) = frame.pixel(x, y);
                let hsv = rgb_to_hsv(r, g, b);
                if self.in_range(hsv) {
                    mask.set(x, y);
                }
            }
        }

        morphology::open(&mask)
    }

    #[inline]
    fn in_range(&self, hsv: (u8, u8, u8)) -> bool {
        let (h, s, v) = hsv;
        h >= self.lower[0]
            && h <= self.upper[0]
            && s >= self.lower[1]
            && s <= self.upper[1]
            && v >= self.lower[2]
            && v <= self.upper[2]
    }
}

/// RGB to HSV in the 8-bit convention: hue halved to 0..=179, saturation
/// and value in 0..=255. Achromatic pixels get hue 0.
pub(crate) fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let rf = r as f32;
    let gf = g as f32;
    let bf = b as f32;

    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { 255.0 * delta / max } else { 0.0 };

    let h_deg = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    let h_deg = if h_deg < 0.0 { h_deg + 360.0 } else { h_deg };

    let h = ((h_deg / 2.0).round() as i32).rem_euclid(180) as u8;
    (h, s.round() as u8, v.round() as u8)
}
