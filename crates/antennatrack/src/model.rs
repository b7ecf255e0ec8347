//! Per-pixel activation maps and their per-frame numeric updates.
//!
//! All updates run only over a region's precomputed active points, never the
//! full clip. Each update is independent per pixel; parallelism is per row,
//! so every worker writes a disjoint slice of the destination map.

use rayon::prelude::*;

use crate::config::ModelTuning;
use crate::frame::PixelFrame;
use crate::region::ActiveRegion;
use crate::space::CoordinateSpace;

/// Packed 3-channel standard-space clip (no row padding).
#[derive(Debug, Clone)]
pub struct ClipMap {
    size: usize,
    buf: Vec<u8>,
}

impl ClipMap {
    /// Zeroed `size x size` clip.
    pub fn new(size: usize) -> Self {
        Self {
            size,
            buf: vec![0; size * size * 3],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> [u8; 3] {
        let i = (y * self.size + x) * 3;
        [self.buf[i], self.buf[i + 1], self.buf[i + 2]]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, px: [u8; 3]) {
        let i = (y * self.size + x) * 3;
        self.buf[i..i + 3].copy_from_slice(&px);
    }

    /// Write one activation value into all three channels.
    #[inline]
    pub fn set_value(&mut self, x: usize, y: usize, v: u8) {
        self.set(x, y, [v, v, v]);
    }

    pub fn fill(&mut self, v: u8) {
        self.buf.fill(v);
    }
}

/// Sum of per-channel absolute distances to a reference color, 0..=765.
#[inline]
pub fn color_distance_sum(px: [u8; 3], color: [u8; 3]) -> f32 {
    (px[0] as i32 - color[0] as i32).abs() as f32
        + (px[1] as i32 - color[1] as i32).abs() as f32
        + (px[2] as i32 - color[2] as i32).abs() as f32
}

/// Mean per-channel absolute distance to a reference color, 0..=255.
#[inline]
pub fn color_distance(px: [u8; 3], color: [u8; 3]) -> f32 {
    color_distance_sum(px, color) / 3.0
}

#[inline]
fn clamp_u8(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}

/// The four running activation maps, all in standard space.
pub struct MotionModels {
    pub fast: ClipMap,
    pub slow: ClipMap,
    pub stationary: ClipMap,
    pub proboscis: ClipMap,
}

impl MotionModels {
    pub fn new(size: usize) -> Self {
        Self {
            fast: ClipMap::new(size),
            slow: ClipMap::new(size),
            stationary: ClipMap::new(size),
            proboscis: ClipMap::new(size),
        }
    }
}

/// Resample the calibrated head region of `frame` into a standard-space clip.
///
/// Nearest-neighbor; standard pixels mapping outside the frame come out
/// black.
pub fn extract_standard_clip(frame: &PixelFrame, space: &CoordinateSpace, out: &mut ClipMap) {
    let size = out.size();
    out.buf
        .par_chunks_mut(size * 3)
        .enumerate()
        .for_each(|(sy, row)| {
            for sx in 0..size {
                let fp = space.point_from_standard([sx as f64, sy as f64]).frame;
                let (fx, fy) = (fp[0].round() as i64, fp[1].round() as i64);
                let px = if frame.in_bounds(fx, fy) {
                    frame.pixel(fx as usize, fy as usize)
                } else {
                    [0, 0, 0]
                };
                row[sx * 3..sx * 3 + 3].copy_from_slice(&px);
            }
        });
}

/// Fast-motion update over a 3-frame window (current, previous, previous-2).
///
/// Second difference of the distance-to-antenna-color signal, folded into a
/// decaying activation. Responses at or below the low floor are cleared so
/// sensor noise never accumulates.
pub fn update_fast(
    fast: &mut ClipMap,
    cur: &ClipMap,
    prev: &ClipMap,
    prev2: &ClipMap,
    region: &ActiveRegion,
    color: [u8; 3],
    tuning: &ModelTuning,
) {
    let size = fast.size();
    fast.buf
        .par_chunks_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for p in region.row(y) {
                let x = p.x as usize;
                let d_cur = color_distance(cur.get(x, y), color);
                let d_prev = color_distance(prev.get(x, y), color);
                let d_prev2 = color_distance(prev2.get(x, y), color);
                let old = row[x * 3 + 1] as f32;
                let mut v = clamp_u8(tuning.fast_decay * old + (d_prev2 + d_cur - 2.0 * d_prev) / 2.0);
                if v <= tuning.low_floor {
                    v = 0;
                }
                row[x * 3..x * 3 + 3].copy_from_slice(&[v, v, v]);
            }
        });
}

/// Proboscis update: proximity to the target color with fast-moving pixels
/// subtracted out, so antennae sweeping through the zone do not register.
pub fn update_proboscis(
    proboscis: &mut ClipMap,
    fast: &ClipMap,
    cur: &ClipMap,
    region: &ActiveRegion,
    color: [u8; 3],
    tuning: &ModelTuning,
) {
    let size = proboscis.size();
    proboscis
        .buf
        .par_chunks_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for p in region.row(y) {
                let x = p.x as usize;
                let d_cur = color_distance(cur.get(x, y), color);
                let fast_g = fast.get(x, y)[1] as f32;
                let mut v = clamp_u8(255.0 - d_cur - tuning.proboscis_fast_weight * fast_g);
                if v <= tuning.low_floor {
                    v = 0;
                }
                row[x * 3..x * 3 + 3].copy_from_slice(&[v, v, v]);
            }
        });
}

/// Slow-motion update: signed divergence of the current clip from the
/// running median background, positive when a pixel darkens toward the
/// target color.
pub fn update_slow(
    slow: &mut ClipMap,
    background_plane: &[u8],
    cur: &ClipMap,
    region: &ActiveRegion,
    color: [u8; 3],
    tuning: &ModelTuning,
) {
    let size = slow.size();
    debug_assert_eq!(background_plane.len(), size * size * 3);
    slow.buf
        .par_chunks_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for p in region.row(y) {
                let x = p.x as usize;
                let i = (y * size + x) * 3;
                let bg = [
                    background_plane[i],
                    background_plane[i + 1],
                    background_plane[i + 2],
                ];
                let d_bg = color_distance_sum(bg, color);
                let d_cur = color_distance_sum(cur.get(x, y), color);
                let mut v = clamp_u8((d_bg - d_cur) / tuning.slow_divisor);
                if v <= tuning.slow_floor {
                    v = 0;
                }
                row[x * 3..x * 3 + 3].copy_from_slice(&[v, v, v]);
            }
        });
}

/// Stationary update: persistently target-colored pixels the motion models
/// miss. Responses below the closeness threshold are cleared.
pub fn update_stationary(
    stationary: &mut ClipMap,
    cur: &ClipMap,
    region: &ActiveRegion,
    color: [u8; 3],
    tuning: &ModelTuning,
) {
    let size = stationary.size();
    stationary
        .buf
        .par_chunks_mut(size * 3)
        .enumerate()
        .for_each(|(y, row)| {
            for p in region.row(y) {
                let x = p.x as usize;
                let d_cur = color_distance_sum(cur.get(x, y), color);
                let mut v = clamp_u8(255.0 - d_cur / tuning.stationary_divisor);
                if v <= tuning.stationary_floor {
                    v = 0;
                }
                row[x * 3..x * 3 + 3].copy_from_slice(&[v, v, v]);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::{ConvexHull, ExclusionZones};
    use crate::test_utils::full_region;

    #[test]
    fn identical_frames_produce_zero_fast_motion() {
        let size = 16;
        let region = full_region(size);
        let mut clip = ClipMap::new(size);
        clip.fill(90);
        let mut fast = ClipMap::new(size);
        let tuning = ModelTuning::default();
        for _ in 0..3 {
            update_fast(&mut fast, &clip, &clip, &clip, &region, [30, 30, 30], &tuning);
        }
        assert!(fast.as_bytes().iter().all(|&v| v == 0));
    }

    #[test]
    fn moving_blob_lights_up_fast_motion() {
        let size = 16;
        let region = full_region(size);
        let color = [30, 30, 30];
        let tuning = ModelTuning::default();
        let mut bg = ClipMap::new(size);
        bg.fill(220);
        // blob at the target color passes through (8, 8) on the center frame
        // of the 3-frame window
        let mut prev = bg.clone();
        prev.set(8, 8, color);
        let mut fast = ClipMap::new(size);
        update_fast(&mut fast, &bg, &prev, &bg, &region, color, &tuning);
        assert!(fast.get(8, 8)[1] > 50);
        assert_eq!(fast.get(2, 2)[1], 0);
    }

    #[test]
    fn stationary_model_fires_only_near_target_color() {
        let size = 8;
        let region = full_region(size);
        let color = [30, 30, 30];
        let tuning = ModelTuning::default();
        let mut cur = ClipMap::new(size);
        cur.fill(250); // far from target
        cur.set(3, 3, [35, 35, 35]); // close to target
        let mut stat = ClipMap::new(size);
        update_stationary(&mut stat, &cur, &region, color, &tuning);
        assert!(stat.get(3, 3)[1] > tuning.stationary_floor);
        assert_eq!(stat.get(0, 0)[1], 0);
    }

    #[test]
    fn slow_model_signed_toward_target() {
        let size = 8;
        let region = full_region(size);
        let color = [30, 30, 30];
        let tuning = ModelTuning::default();
        let bg_plane = vec![200u8; size * size * 3];
        let mut cur = ClipMap::new(size);
        cur.fill(200);
        cur.set(4, 4, [40, 40, 40]); // darkened toward target
        cur.set(5, 5, [255, 255, 255]); // moved away from target
        let mut slow = ClipMap::new(size);
        update_slow(&mut slow, &bg_plane, &cur, &region, color, &tuning);
        assert!(slow.get(4, 4)[1] > 0);
        assert_eq!(slow.get(5, 5)[1], 0);
    }

    #[test]
    fn updates_touch_only_active_points() {
        let size = 10;
        let hull = ConvexHull::new(vec![[0.0, 0.0], [4.0, 0.0], [4.0, 4.0], [0.0, 4.0]]);
        let region = ActiveRegion::compute(&hull, &[], &ExclusionZones::default(), size);
        let mut cur = ClipMap::new(size);
        cur.fill(30);
        let mut stat = ClipMap::new(size);
        update_stationary(&mut stat, &cur, &region, [30, 30, 30], &ModelTuning::default());
        assert!(stat.get(2, 2)[1] > 0);
        assert_eq!(stat.get(8, 8)[1], 0); // outside the hull, untouched
    }
}
