// src/capture.rs
//
// Frame acquisition behind a trait. Two sources ship: a synthetic track
// generator that renders a swaying line for bench runs, and a still-image
// sequence reader for replaying captured frames from disk. The control
// loop only ever sees `FrameSource`.

use crate::config::CameraConfig;
use crate::types::Frame;
use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

/// Line color rendered by the synthetic source; lands inside the default
/// HSV segmentation bounds.
const SYNTHETIC_LINE_RGB: (u8, u8, u8) = (40, 60, 220);
const SYNTHETIC_BACKGROUND_RGB: (u8, u8, u8) = (60, 60, 60);
const SWAY_PHASE_STEP: f64 = 0.02;

pub trait FrameSource {
    /// Pull the next frame. `Ok(None)` means the source is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn resolution(&self) -> (usize, usize);

    fn describe(&self) -> String;
}

/// Build the source named by the camera config.
pub fn build_source(config: &CameraConfig) -> Result<Box<dyn FrameSource>> {
    match config.source.as_str() {
        "synthetic" => Ok(Box::new(SyntheticTrackSource::new(config))),
        "sequence" => Ok(Box::new(ImageSequenceSource::new(config)?)),
        other => bail!("Unknown frame source '{}', expected 'synthetic' or 'sequence'", other),
    }
}

// ============ SYNTHETIC TRACK ============

/// Renders a vertical line band that sways sinusoidally around frame
/// center. Never exhausts; run length is bounded by the camera
/// `max_frames` setting or the shutdown signal.
pub struct SyntheticTrackSource {
    width: usize,
    height: usize,
    fps: u32,
    band_half_width: usize,
    sway_amplitude: f64,
    frame_index: u64,
}

impl SyntheticTrackSource {
    pub fn new(config: &CameraConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            fps: config.fps,
            band_half_width: config.width / 32,
            sway_amplitude: config.width as f64 / 8.0,
            frame_index: 0,
        }
    }

    fn band_center_x(&self) -> i32 {
        let phase = self.frame_index as f64 * SWAY_PHASE_STEP;
        (self.width as f64 / 2.0 + self.sway_amplitude * phase.sin()) as i32
    }
}

impl FrameSource for SyntheticTrackSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let timestamp_ms = self.frame_index as f64 * 1000.0 / self.fps as f64;
        let mut frame = Frame::new(self.width, self.height, timestamp_ms);

        let center = self.band_center_x();
        let lo = center - self.band_half_width as i32;
        let hi = center + self.band_half_width as i32;

        for y in 0..self.height {
            for x in 0..self.width {
                let color = if (x as i32) >= lo && (x as i32) < hi {
                    SYNTHETIC_LINE_RGB
                } else {
                    SYNTHETIC_BACKGROUND_RGB
                };
                frame.set_pixel(x, y, color);
            }
        }

        self.frame_index += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn describe(&self) -> String {
        format!("synthetic track {}x{} @ {} fps", self.width, self.height, self.fps)
    }
}

// ============ IMAGE SEQUENCE ============

/// Replays a directory of still images in lexicographic order.
pub struct ImageSequenceSource {
    files: Vec<PathBuf>,
    cursor: usize,
    emitted: u64,
    width: usize,
    height: usize,
    fps: u32,
    vflip: bool,
    hflip: bool,
    loop_input: bool,
    input_dir: String,
}

impl ImageSequenceSource {
    pub fn new(config: &CameraConfig) -> Result<Self> {
        let files = find_frame_files(&config.input_dir)?;
        if files.is_empty() {
            bail!("No frame images found in '{}'", config.input_dir);
        }
        info!("✓ Found {} frames in '{}'", files.len(), config.input_dir);

        Ok(Self {
            files,
            cursor: 0,
            emitted: 0,
            width: config.width,
            height: config.height,
            fps: config.fps,
            vflip: config.vflip,
            hflip: config.hflip,
            loop_input: config.loop_input,
            input_dir: config.input_dir.clone(),
        })
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.cursor >= self.files.len() {
            if !self.loop_input {
                return Ok(None);
            }
            self.cursor = 0;
        }

        let path = &self.files[self.cursor];
        let mut img = image::open(path)
            .with_context(|| format!("Failed to read frame image {}", path.display()))?
            .to_rgb8();

        let (w, h) = img.dimensions();
        if w as usize != self.width || h as usize != self.height {
            bail!(
                "Frame {} is {}x{}, camera is configured for {}x{}",
                path.display(),
                w,
                h,
                self.width,
                self.height
            );
        }

        apply_flips(&mut img, self.vflip, self.hflip);

        let timestamp_ms = self.emitted as f64 * 1000.0 / self.fps as f64;
        let frame = Frame {
            data: img.into_raw(),
            width: self.width,
            height: self.height,
            timestamp_ms,
        };

        self.cursor += 1;
        self.emitted += 1;
        Ok(Some(frame))
    }

    fn resolution(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn describe(&self) -> String {
        format!(
            "{} frames from '{}'{}",
            self.files.len(),
            self.input_dir,
            if self.loop_input { ", looped" } else { "" }
        )
    }
}

/// Recursively collect readable frame images under `dir`, sorted by path
/// so numbered captures replay in order.
fn find_frame_files(dir: &str) -> Result<Vec<PathBuf>> {
    let mut frame_files = Vec::new();

    for entry in WalkDir::new(dir).into_iter().filter_map(|e| e.ok()) {
        let path = entry.path();
        if path.is_file() && is_frame_file(path) {
            frame_files.push(path.to_path_buf());
        }
    }

    frame_files.sort();
    Ok(frame_files)
}

fn is_frame_file(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => matches!(ext.to_lowercase().as_str(), "jpg" | "jpeg" | "png"),
        None => false,
    }
}

fn apply_flips(img: &mut RgbImage, vflip: bool, hflip: bool) {
    if vflip {
        image::imageops::flip_vertical_in_place(img);
    }
    if hflip {
        image::imageops::flip_horizontal_in_place(img);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_is_frame_file_matches_image_extensions() {
        assert!(is_frame_file(Path::new("frames/frame_000001.jpg")));
        assert!(is_frame_file(Path::new("frames/FRAME.JPEG")));
        assert!(is_frame_file(Path::new("a/b/c.png")));
        assert!(!is_frame_file(Path::new("frames/notes.txt")));
        assert!(!is_frame_file(Path::new("frames/noext")));
    }

    #[test]
    fn test_synthetic_first_frame_is_centered() {
        let config = CameraConfig::default();
        let mut source = SyntheticTrackSource::new(&config);

        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!((frame.width, frame.height), (640, 480));
        assert_eq!(frame.timestamp_ms, 0.0);
        assert_eq!(frame.pixel(320, 240), SYNTHETIC_LINE_RGB);
        assert_eq!(frame.pixel(0, 0), SYNTHETIC_BACKGROUND_RGB);

        let frame = source.next_frame().unwrap().unwrap();
        assert!((frame.timestamp_ms - 1000.0 / 24.0).abs() < 1e-9);
    }

    #[test]
    fn test_synthetic_band_sways_off_center() {
        let config = CameraConfig::default();
        let mut source = SyntheticTrackSource::new(&config);

        // quarter period of the sway, band sits near its right extreme
        for _ in 0..79 {
            source.next_frame().unwrap();
        }
        let frame = source.next_frame().unwrap().unwrap();
        assert_eq!(frame.pixel(320, 240), SYNTHETIC_BACKGROUND_RGB);
        assert_eq!(frame.pixel(399, 240), SYNTHETIC_LINE_RGB);
    }

    #[test]
    fn test_apply_flips_moves_marker_pixel() {
        let mut img = RgbImage::new(4, 4);
        img.put_pixel(0, 0, image::Rgb([255, 0, 0]));

        apply_flips(&mut img, true, false);
        assert_eq!(img.get_pixel(0, 3), &image::Rgb([255, 0, 0]));

        apply_flips(&mut img, false, true);
        assert_eq!(img.get_pixel(3, 3), &image::Rgb([255, 0, 0]));
    }

    #[test]
    fn test_sequence_replays_sorted_and_loops() {
        let dir = std::env::temp_dir().join(format!("linetrack_seq_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut second = RgbImage::new(4, 4);
        second.put_pixel(0, 0, image::Rgb([2, 0, 0]));
        second.save(dir.join("b.png")).unwrap();
        let mut first = RgbImage::new(4, 4);
        first.put_pixel(0, 0, image::Rgb([1, 0, 0]));
        first.save(dir.join("a.png")).unwrap();

        let config = CameraConfig {
            width: 4,
            height: 4,
            input_dir: dir.to_string_lossy().into_owned(),
            loop_input: true,
            ..CameraConfig::default()
        };
        let mut source = ImageSequenceSource::new(&config).unwrap();

        let f1 = source.next_frame().unwrap().unwrap();
        let f2 = source.next_frame().unwrap().unwrap();
        let f3 = source.next_frame().unwrap().unwrap();
        assert_eq!(f1.pixel(0, 0).0, 1);
        assert_eq!(f2.pixel(0, 0).0, 2);
        // looped back to the first file, timestamps keep advancing
        assert_eq!(f3.pixel(0, 0).0, 1);
        assert!(f3.timestamp_ms > f2.timestamp_ms);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sequence_ends_without_loop() {
        let dir = std::env::temp_dir().join(format!("linetrack_seq_end_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        RgbImage::new(4, 4).save(dir.join("only.png")).unwrap();

        let config = CameraConfig {
            width: 4,
            height: 4,
            input_dir: dir.to_string_lossy().into_owned(),
            loop_input: false,
            ..CameraConfig::default()
        };
        let mut source = ImageSequenceSource::new(&config).unwrap();

        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sequence_rejects_empty_directory() {
        let dir = std::env::temp_dir().join(format!("linetrack_seq_empty_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let config = CameraConfig {
            input_dir: dir.to_string_lossy().into_owned(),
            ..CameraConfig::default()
        };
        assert!(ImageSequenceSource::new(&config).is_err());

        fs::remove_dir_all(&dir).ok();
    }
}
