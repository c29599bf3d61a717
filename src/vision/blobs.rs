// src/vision/blobs.rs
//
// Largest-region extraction from the segmented mask.
//
// Regions are grown with a BFS over 8-connected foreground pixels, then
// each region's outer boundary is traced and reduced to the three values
// the controller consumes: centroid, enclosing radius, found flag.
// Selection is largest boundary area with first-maximum-wins; region
// seeds are discovered in row-major order, so equal-area ties always
// resolve to the region whose seed comes first in that order.

use crate::types::{Blob, ColorMask};
use std::collections::VecDeque;

/// Clockwise 8-neighborhood in image coordinates (y grows downward)
const NEIGHBORS: [(i32, i32); 8] = [
    (1, 0),   // E
    (1, 1),   // SE
    (0, 1),   // S
    (-1, 1),  // SW
    (-1, 0),  // W
    (-1, -1), // NW
    (0, -1),  // N
    (1, -1),  // NE
];

pub struct BlobLocator {
    frame_width: usize,
    frame_height: usize,
}

struct Region {
    seed: (i32, i32),
    size: usize,
}

impl BlobLocator {
    pub fn new(frame_width: usize, frame_height: usize) -> Self {
        Self {
            frame_width,
            frame_height,
        }
    }

    /// Reduce the mask to its largest foreground region.
    ///
    /// An empty mask, or a selected region whose boundary encloses zero
    /// area (single pixels, one-pixel-wide strands), yields `found=false`
    /// with the neutral fallback centroid. Zero area never reaches the
    /// centroid division.
    pub fn locate(&self, mask: &ColorMask) -> Blob {
        let default_cx = (self.frame_width / 2) as i32;
        let default_cy = (self.frame_height / 2) as i32;

        let (labels, regions) = label_regions(mask);
        if regions.is_empty() {
            return Blob::not_found(default_cx, default_cy);
        }

        let mut best: Option<(i64, Vec<(i32, i32)>)> = None;
        for (index, region) in regions.iter().enumerate() {
            let label = (index + 1) as u32;
            let contour = trace_boundary(&labels, mask.width, mask.height, label, region);
            let (m00_twice, _, _) = polygon_moments(&contour);
            let area_twice = m00_twice.abs();

            let replace = match &best {
                None => true,
                Some((best_area, _)) => area_twice > *best_area,
            };
            if replace {
                best = Some((area_twice, contour));
            }
        }

        let (_, contour) = best.unwrap_or((0, Vec::new()));
        let (m00_twice, m10_six, m01_six) = polygon_moments(&contour);
        if m00_twice == 0 {
            return Blob::not_found(default_cx, default_cy);
        }

        let cx = (m10_six as f64 / (3.0 * m00_twice as f64)) as i32;
        let cy = (m01_six as f64 / (3.0 * m00_twice as f64)) as i32;
        let (_, _, radius) = min_enclosing_circle(&contour);

        Blob {
            cx,
            cy,
            radius: radius as f32,
            found: true,
        }
    }
}

/// Grow 8-connected regions with BFS. Seeds are scanned in row-major
/// order; a region's seed is therefore its topmost-leftmost pixel.
/// Labels start at 1; 0 means background.
fn label_regions(mask: &ColorMask) -> (Vec<u32>, Vec<Region>) {
    let w = mask.width;
    let h = mask.height;
    let mut labels = vec![0u32; w * h];
    let mut regions = Vec::new();
    let mut queue = VecDeque::new();

    for y in 0..h {
        for x in 0..w {
            if !mask.is_set(x, y) || labels[y * w + x] != 0 {
                continue;
            }

            let label = regions.len() as u32 + 1;
            let mut size = 0usize;
            labels[y * w + x] = label;
            queue.push_back((x as i32, y as i32));

            while let Some((px, py)) = queue.pop_front() {
                size += 1;
                for (dx, dy) in NEIGHBORS {
                    let nx = px + dx;
                    let ny = py + dy;
                    if nx < 0 || ny < 0 || nx >= w as i32 || ny >= h as i32 {
                        continue;
                    }
                    let ni = ny as usize * w + nx as usize;
                    if mask.data[ni] != 0 && labels[ni] == 0 {
                        labels[ni] = label;
                        queue.push_back((nx, ny));
                    }
                }
            }

            regions.push(Region {
                seed: (x as i32, y as i32),
                size,
            });
        }
    }

    (labels, regions)
}

/// Moore-neighbor boundary trace with Jacob's stopping criterion,
/// clockwise, starting at the region seed. Returns boundary pixel
/// centers; a lone pixel traces to itself.
fn trace_boundary(
    labels: &[u32],
    w: usize,
    h: usize,
    label: u32,
    region: &Region,
) -> Vec<(i32, i32)> {
    let in_region = |x: i32, y: i32| -> bool {
        x >= 0 && y >= 0 && x < w as i32 && y < h as i32 && labels[y as usize * w + x as usize] == label
    };

    let seed = region.seed;
    if region.size == 1 {
        return vec![seed];
    }

    let mut contour = vec![seed];
    let mut cur = seed;
    // The seed is topmost-leftmost, so its west neighbor is background.
    // Scanning starts just past the backtrack direction.
    let mut backtrack_dir = 4usize; // W
    let mut first_move: Option<((i32, i32), (i32, i32))> = None;
    let cap = region.size * 4 + 8;

    loop {
        let mut found = None;
        for step in 1..=8 {
            let d = (backtrack_dir + step) % 8;
            let nx = cur.0 + NEIGHBORS[d].0;
            let ny = cur.1 + NEIGHBORS[d].1;
            if in_region(nx, ny) {
                found = Some((d, (nx, ny)));
                break;
            }
        }

        let Some((d, next)) = found else {
            break;
        };

        match first_move {
            Some((from, to)) if cur == from && next == to => break,
            None => first_move = Some((cur, next)),
            _ => {}
        }

        contour.push(next);

        // New backtrack: the last background position checked before
        // `next`, re-expressed from `next`.
        let prev_dir = (d + 7) % 8;
        let back = (cur.0 + NEIGHBORS[prev_dir].0, cur.1 + NEIGHBORS[prev_dir].1);
        backtrack_dir = direction_index(next, back);
        cur = next;

        if contour.len() > cap {
            break;
        }
    }

    if contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }
    contour
}

fn direction_index(from: (i32, i32), to: (i32, i32)) -> usize {
    let delta = (to.0 - from.0, to.1 - from.1);
    for (i, d) in NEIGHBORS.iter().enumerate() {
        if *d == delta {
            return i;
        }
    }
    // consecutive ring positions are always adjacent, so this is unreachable
    0
}

/// Signed polygon moments over integer vertices via the shoelace formula.
/// Returns (2*m00, 6*m10, 6*m01); all three stay exact in i64. Centroid
/// is m10/m00 and m01/m00, the signs cancel in the ratios.
fn polygon_moments(contour: &[(i32, i32)]) -> (i64, i64, i64) {
    let n = contour.len();
    if n < 3 {
        return (0, 0, 0);
    }

    let mut m00_twice = 0i64;
    let mut m10_six = 0i64;
    let mut m01_six = 0i64;

    for i in 0..n {
        let (x0, y0) = contour[i];
        let (x1, y1) = contour[(i + 1) % n];
        let (x0, y0, x1, y1) = (x0 as i64, y0 as i64, x1 as i64, y1 as i64);

        let cross = x0 * y1 - x1 * y0;
        m00_twice += cross;
        m10_six += (x0 + x1) * cross;
        m01_six += (y0 + y1) * cross;
    }

    (m00_twice, m10_six, m01_six)
}

/// Exact minimum enclosing circle, incremental construction. Returns
/// (cx, cy, radius); an empty input collapses to a zero circle.
fn min_enclosing_circle(points: &[(i32, i32)]) -> (f64, f64, f64) {
    if points.is_empty() {
        return (0.0, 0.0, 0.0);
    }

    let pts: Vec<(f64, f64)> = points.iter().map(|&(x, y)| (x as f64, y as f64)).collect();

    let mut circle = Circle::from_one(pts[0]);
    for i in 1..pts.len() {
        if circle.contains(pts[i]) {
            continue;
        }
        circle = Circle::from_one(pts[i]);
        for j in 0..i {
            if circle.contains(pts[j]) {
                continue;
            }
            circle = Circle::from_two(pts[i], pts[j]);
            for k in 0..j {
                if !circle.contains(pts[k]) {
                    circle = Circle::from_three(pts[i], pts[j], pts[k]);
                }
            }
        }
    }

    (circle.cx, circle.cy, circle.r)
}

#[derive(Clone, Copy)]
struct Circle {
    cx: f64,
    cy: f64,
    r: f64,
}

impl Circle {
    fn from_one(p: (f64, f64)) -> Self {
        Self {
            cx: p.0,
            cy: p.1,
            r: 0.0,
        }
    }

    fn from_two(a: (f64, f64), b: (f64, f64)) -> Self {
        let cx = (a.0 + b.0) / 2.0;
        let cy = (a.1 + b.1) / 2.0;
        let r = ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt() / 2.0;
        Self { cx, cy, r }
    }

    fn from_three(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> Self {
        let d = 2.0 * (a.0 * (b.1 - c.1) + b.0 * (c.1 - a.1) + c.0 * (a.1 - b.1));
        if d.abs() < 1e-9 {
            // collinear: the widest pair's diameter circle covers all three
            let ab = Self::from_two(a, b);
            let ac = Self::from_two(a, c);
            let bc = Self::from_two(b, c);
            let mut widest = ab;
            if ac.r > widest.r {
                widest = ac;
            }
            if bc.r > widest.r {
                widest = bc;
            }
            return widest;
        }

        let a2 = a.0 * a.0 + a.1 * a.1;
        let b2 = b.0 * b.0 + b.1 * b.1;
        let c2 = c.0 * c.0 + c.1 * c.1;
        let cx = (a2 * (b.1 - c.1) + b2 * (c.1 - a.1) + c2 * (a.1 - b.1)) / d;
        let cy = (a2 * (c.0 - b.0) + b2 * (a.0 - c.0) + c2 * (b.0 - a.0)) / d;
        let r = ((a.0 - cx).powi(2) + (a.1 - cy).powi(2)).sqrt();
        Self { cx, cy, r }
    }

    fn contains(&self, p: (f64, f64)) -> bool {
        let dx = p.0 - self.cx;
        let dy = p.1 - self.cy;
        (dx * dx + dy * dy).sqrt() <= self.r + 1e-7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mask_with(width: usize, height: usize, pixels: &[(usize, usize)]) -> ColorMask {
        let mut mask = ColorMask::new(width, height);
        for &(x, y) in pixels {
            mask.set(x, y);
        }
        mask
    }

    fn filled_rect(pixels: &mut Vec<(usize, usize)>, x0: usize, y0: usize, side: usize) {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                pixels.push((x, y));
            }
        }
    }

    #[test]
    fn test_empty_mask_yields_fallback_centroid() {
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&ColorMask::new(640, 350));

        assert!(!blob.found);
        assert_eq!((blob.cx, blob.cy), (320, 240));
        assert_eq!(blob.radius, 0.0);
    }

    #[test]
    fn test_square_centroid_and_radius() {
        let mut pixels = Vec::new();
        filled_rect(&mut pixels, 20, 30, 11);
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&mask_with(64, 64, &pixels));

        assert!(blob.found);
        assert_eq!((blob.cx, blob.cy), (25, 35));
        // boundary corners sit 5px out on both axes
        assert!((blob.radius - 50.0_f32.sqrt()).abs() < 0.05);
    }

    #[test]
    fn test_largest_region_wins() {
        let mut pixels = Vec::new();
        filled_rect(&mut pixels, 2, 2, 5);
        filled_rect(&mut pixels, 30, 20, 11);
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&mask_with(64, 64, &pixels));

        assert!(blob.found);
        assert_eq!((blob.cx, blob.cy), (35, 25));
    }

    #[test]
    fn test_equal_area_tie_takes_first_in_scan_order() {
        let mut pixels = Vec::new();
        filled_rect(&mut pixels, 2, 2, 5);
        filled_rect(&mut pixels, 30, 2, 5);
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&mask_with(64, 64, &pixels));

        assert!(blob.found);
        assert_eq!((blob.cx, blob.cy), (4, 4));
    }

    #[test]
    fn test_single_pixel_is_degenerate() {
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&mask_with(64, 64, &[(10, 10)]));

        assert!(!blob.found);
        assert_eq!((blob.cx, blob.cy), (320, 240));
    }

    #[test]
    fn test_one_pixel_strand_is_degenerate() {
        let pixels: Vec<(usize, usize)> = (5..25).map(|x| (x, 8)).collect();
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&mask_with(64, 64, &pixels));

        assert!(!blob.found);
    }

    #[test]
    fn test_degenerate_loses_to_real_region() {
        let mut pixels: Vec<(usize, usize)> = (0..30).map(|x| (x, 0)).collect();
        filled_rect(&mut pixels, 10, 10, 5);
        let locator = BlobLocator::new(640, 480);
        let blob = locator.locate(&mask_with(64, 64, &pixels));

        assert!(blob.found);
        assert_eq!((blob.cx, blob.cy), (12, 12));
    }

    #[test]
    fn test_trace_boundary_of_square_visits_perimeter() {
        let mut pixels = Vec::new();
        filled_rect(&mut pixels, 3, 3, 4);
        let mask = mask_with(16, 16, &pixels);
        let (labels, regions) = label_regions(&mask);
        assert_eq!(regions.len(), 1);

        let contour = trace_boundary(&labels, 16, 16, 1, &regions[0]);
        // 4x4 square has 12 perimeter pixels
        assert_eq!(contour.len(), 12);
        assert!(contour.contains(&(3, 3)));
        assert!(contour.contains(&(6, 6)));
        assert!(!contour.contains(&(4, 4)));
    }

    #[test]
    fn test_polygon_moments_of_unit_square() {
        let contour = vec![(0, 0), (10, 0), (10, 10), (0, 10)];
        let (m00_twice, m10_six, m01_six) = polygon_moments(&contour);
        assert_eq!(m00_twice.abs(), 200);

        let cx = m10_six as f64 / (3.0 * m00_twice as f64);
        let cy = m01_six as f64 / (3.0 * m00_twice as f64);
        assert!((cx - 5.0).abs() < 1e-9);
        assert!((cy - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_min_enclosing_circle_pairs_and_triples() {
        let (_, _, r) = min_enclosing_circle(&[(0, 0)]);
        assert_eq!(r, 0.0);

        let (cx, cy, r) = min_enclosing_circle(&[(0, 0), (6, 0)]);
        assert!((cx - 3.0).abs() < 1e-9 && cy.abs() < 1e-9);
        assert!((r - 3.0).abs() < 1e-9);

        // third point inside the diameter circle of the first two
        let (_, _, r) = min_enclosing_circle(&[(0, 0), (6, 0), (3, 3)]);
        assert!((r - 3.0).abs() < 1e-7);

        // square corners need the circumcircle
        let (_, _, r) = min_enclosing_circle(&[(0, 0), (4, 0), (0, 4), (4, 4)]);
        assert!((r - 8.0_f64.sqrt()).abs() < 1e-7);
    }

    #[test]
    fn test_collinear_points_fall_back_to_widest_pair() {
        let (cx, cy, r) = min_enclosing_circle(&[(0, 0), (2, 0), (8, 0)]);
        assert!((cx - 4.0).abs() < 1e-9 && cy.abs() < 1e-9);
        assert!((r - 4.0).abs() < 1e-9);
    }
}
