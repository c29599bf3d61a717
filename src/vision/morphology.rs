// src/vision/morphology.rs

use crate::types::ColorMask;

/// One erosion pass followed by one dilation pass, 3x3 window.
pub fn open(mask: &ColorMask) -> ColorMask {
    dilate(&erode(mask))
}

/// A pixel survives when every in-bounds pixel of its 3x3 window is
/// foreground. Window positions outside the image are ignored.
pub fn erode(mask: &ColorMask) -> ColorMask {
    let mut out = ColorMask::new(mask.width, mask.height);

    for y in 0..mask.height {
        for x in 0..mask.width {
            if !mask.is_set(x, y) {
                continue;
            }
            if window_all_set(mask, x, y) {
                out.set(x, y);
            }
        }
    }

    out
}

/// A pixel becomes foreground when any in-bounds pixel of its 3x3 window
/// is foreground.
pub fn dilate(mask: &ColorMask) -> ColorMask {
    let mut out = ColorMask::new(mask.width, mask.height);

    for y in 0..mask.height {
        for x in 0..mask.width {
            if window_any_set(mask, x, y) {
                out.set(x, y);
            }
        }
    }

    out
}

fn window_all_set(mask: &ColorMask, x: usize, y: usize) -> bool {
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= mask.width as i32 || ny >= mask.height as i32 {
                continue;
            }
            if !mask.is_set(nx as usize, ny as usize) {
                return false;
            }
        }
    }
    true
}

fn window_any_set(mask: &ColorMask, x: usize, y: usize) -> bool {
    for dy in -1i32..=1 {
        for dx in -1i32..=1 {
            let nx = x as i32 + dx;
            let ny = y as i32 + dy;
            if nx < 0 || ny < 0 || nx >= mask.width as i32 || ny >= mask.height as i32 {
                continue;
            }
            if mask.is_set(nx as usize, ny as usize) {
                return true;
            }
        }
    }
    false
}
