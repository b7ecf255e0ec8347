//! Shared synthetic fixtures for unit tests.

use crate::model::ClipMap;
use crate::region::{ActiveRegion, ConvexHull, ExclusionZones};

/// Axis-aligned rectangular hull.
pub fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> ConvexHull {
    ConvexHull::new(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
}

/// Region covering every pixel of a `size x size` clip.
pub fn full_region(size: usize) -> ActiveRegion {
    let hull = square(-1.0, -1.0, size as f64, size as f64);
    ActiveRegion::compute(&hull, &[], &ExclusionZones::default(), size)
}

/// Uniform bright square blob of half-width `r` centered at (cx, cy).
pub fn bright_blob(size: usize, cx: usize, cy: usize, r: usize) -> ClipMap {
    let mut m = ClipMap::new(size);
    for y in cy.saturating_sub(r)..(cy + r).min(size) {
        for x in cx.saturating_sub(r)..(cx + r).min(size) {
            m.set_value(x, y, 220);
        }
    }
    m
}
