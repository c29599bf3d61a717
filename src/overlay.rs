// src/overlay.rs
//
// Debug overlay rendering and JPEG snapshots.
//
// Annotations mirror what the vehicle's live preview shows: three fixed
// anchor dots near the bottom of the frame, a line from the bottom
// anchor to the detected centroid, and a steering indicator whose tilt
// is half the centroid offset. Duty percentages go to the JSONL event
// stream instead of being rendered into the image.

use crate::types::{Blob, Frame};
use anyhow::{Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_circle_mut, draw_line_segment_mut};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tracing::debug;

const ANCHOR_COLOR: Rgb<u8> = Rgb([0, 0, 255]);
const CENTROID_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
const STEERING_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Render the frame with tracking annotations.
///
/// The centroid dot appears only for confident detections; the centroid
/// line is always drawn and points at the neutral fallback when the line
/// was not found.
pub fn annotate(frame: &Frame, blob: &Blob, min_radius: f32) -> Result<RgbImage> {
    let mut img = RgbImage::from_raw(
        frame.width as u32,
        frame.height as u32,
        frame.data.clone(),
    )
    .context("Frame buffer does not match its dimensions")?;

    let w = frame.width as i32;
    let h = frame.height as i32;
    let center_x = w / 2;
    let anchor_y = h - 85;

    if blob.found && blob.radius > min_radius {
        draw_filled_circle_mut(&mut img, (blob.cx, blob.cy), 5, CENTROID_COLOR);
    }

    for x in [center_x, center_x - 100, center_x + 100] {
        draw_filled_circle_mut(&mut img, (x, anchor_y), 5, ANCHOR_COLOR);
    }

    draw_thick_segment(
        &mut img,
        (center_x, anchor_y),
        (blob.cx, blob.cy),
        3,
        CENTROID_COLOR,
    );

    let tilt_x = center_x + (blob.cx - center_x) / 2;
    draw_thick_segment(
        &mut img,
        (tilt_x, h - 80),
        (center_x, h - 40),
        4,
        STEERING_COLOR,
    );

    Ok(img)
}

/// Near-vertical line with width, drawn as horizontally offset strands.
fn draw_thick_segment(
    img: &mut RgbImage,
    from: (i32, i32),
    to: (i32, i32),
    thickness: i32,
    color: Rgb<u8>,
) {
    let lo = -(thickness / 2);
    let hi = lo + thickness - 1;
    for dx in lo..=hi {
        draw_line_segment_mut(
            img,
            ((from.0 + dx) as f32, from.1 as f32),
            ((to.0 + dx) as f32, to.1 as f32),
            color,
        );
    }
}

pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut cursor, quality);
    img.write_with_encoder(encoder)
        .context("Failed to encode JPEG")?;
    Ok(cursor.into_inner())
}

/// Write an annotated frame under `dir` as frame_NNNNNN_tag.jpg.
pub fn save_snapshot(
    dir: &Path,
    frame_id: u64,
    tag: &str,
    img: &RgbImage,
    quality: u8,
) -> Result<PathBuf> {
    let path = dir.join(format!("frame_{:06}_{}.jpg", frame_id, tag));
    let jpeg = encode_jpeg(img, quality)?;
    fs::write(&path, &jpeg)
        .with_context(|| format!("Failed to write snapshot {}", path.display()))?;
    debug!("Saved snapshot: {} ({} bytes)", path.display(), jpeg.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray_frame() -> Frame {
        let mut frame = Frame::new(640, 480, 0.0);
        for y in 0..480 {
            for x in 0..640 {
                frame.set_pixel(x, y, (60, 60, 60));
            }
        }
        frame
    }

    fn found_blob(cx: i32, radius: f32) -> Blob {
        Blob {
            cx,
            cy: 200,
            radius,
            found: true,
        }
    }

    #[test]
    fn test_annotate_preserves_dimensions() {
        let img = annotate(&gray_frame(), &found_blob(320, 12.0), 4.0).unwrap();
        assert_eq!(img.dimensions(), (640, 480));
    }

    #[test]
    fn test_anchor_dots_are_drawn() {
        let img = annotate(&gray_frame(), &found_blob(320, 12.0), 4.0).unwrap();
        // side anchors stay clear of the centroid and steering lines
        assert_eq!(img.get_pixel(220, 395), &ANCHOR_COLOR);
        assert_eq!(img.get_pixel(420, 395), &ANCHOR_COLOR);
    }

    #[test]
    fn test_centroid_dot_needs_confident_radius() {
        let img = annotate(&gray_frame(), &found_blob(400, 12.0), 4.0).unwrap();
        assert_eq!(img.get_pixel(404, 200), &CENTROID_COLOR);

        let img = annotate(&gray_frame(), &found_blob(400, 2.0), 4.0).unwrap();
        assert_eq!(img.get_pixel(404, 200), &Rgb([60, 60, 60]));
    }

    #[test]
    fn test_steering_indicator_tilts_with_offset() {
        // centered: indicator top sits at frame center
        let img = annotate(&gray_frame(), &found_blob(320, 12.0), 4.0).unwrap();
        assert_eq!(img.get_pixel(320, 400), &STEERING_COLOR);

        // offset 80 px: indicator top shifts by half of that
        let img = annotate(&gray_frame(), &found_blob(400, 12.0), 4.0).unwrap();
        assert_eq!(img.get_pixel(360, 400), &STEERING_COLOR);
    }

    #[test]
    fn test_missing_blob_still_renders_fallback_line() {
        let img = annotate(&gray_frame(), &Blob::not_found(320, 240), 4.0).unwrap();
        // vertical centroid line toward the fallback passes through x=320
        assert_eq!(img.get_pixel(320, 300), &CENTROID_COLOR);
    }

    #[test]
    fn test_jpeg_encoding_produces_jfif_bytes() {
        let img = annotate(&gray_frame(), &found_blob(320, 12.0), 4.0).unwrap();
        let jpeg = encode_jpeg(&img, 85).unwrap();
        assert!(jpeg.len() > 2);
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn test_snapshot_lands_on_disk() {
        let dir = std::env::temp_dir().join(format!("linetrack_snap_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let img = annotate(&gray_frame(), &found_blob(320, 12.0), 4.0).unwrap();
        let path = save_snapshot(&dir, 42, "recovery", &img, 85).unwrap();
        assert!(path.ends_with("frame_000042_recovery.jpg"));
        assert!(path.exists());

        fs::remove_dir_all(&dir).ok();
    }
}
