// src/vision/mod.rs
//
// Perception side of the loop.
//
// Signal flow:
//   Frame (RGB) → segmenter (HSV range + ROI crop) → morphology (open)
//               → blobs (largest component → centroid + radius)

pub mod blobs;
pub mod morphology;
pub mod segmenter;

pub use blobs::BlobLocator;
pub use segmenter::ColorSegmenter;
