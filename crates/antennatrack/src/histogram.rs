//! Intensity histogram over an active-point set, with tail extraction.

use crate::model::ClipMap;
use crate::region::GridPoint;

const BINS: usize = 256;

/// One active point paired with its histogram-bin weight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    pub point: GridPoint,
    /// Bin value (model intensity) of the bucket the point came from.
    pub weight: f32,
}

/// 256-bucket histogram of active points keyed by model intensity.
///
/// Rebuilt from scratch for every query: the model it samples changes every
/// frame, so there is nothing worth carrying over. Zero-intensity points are
/// never bucketed (zero is the default/absent model response) but still count
/// toward the total, so tail fractions stay relative to the full point set.
pub struct ActivityHistogram {
    buckets: Vec<Vec<GridPoint>>,
    total: usize,
}

impl ActivityHistogram {
    pub fn new() -> Self {
        Self {
            buckets: vec![Vec::new(); BINS],
            total: 0,
        }
    }

    /// Total number of points fed to the last build, exclusions included.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Clear all buckets and re-bucket `points` by `channel` intensity of
    /// `model`.
    pub fn build_from_points(&mut self, model: &ClipMap, points: &[GridPoint], channel: usize) {
        for bucket in &mut self.buckets {
            bucket.clear();
        }
        self.total = points.len();
        for &p in points {
            let v = model.get(p.x as usize, p.y as usize)[channel];
            if v == 0 {
                continue;
            }
            self.buckets[v as usize].push(p);
        }
    }

    /// Highest-intensity points covering `top_fraction` of the total.
    ///
    /// Walks buckets from 255 downward, stopping once the accumulated count
    /// reaches `top_fraction * total` or the bucket index drops below
    /// `low_limit_bin`. The returned multiset is deterministic for a given
    /// (model, point set); order is not.
    pub fn tail(&self, top_fraction: f32, low_limit_bin: u8) -> Vec<WeightedPoint> {
        let target = (top_fraction * self.total as f32).ceil() as usize;
        let mut out = Vec::new();
        for bin in (low_limit_bin as usize..BINS).rev() {
            if out.len() >= target {
                break;
            }
            let weight = bin as f32;
            out.extend(
                self.buckets[bin]
                    .iter()
                    .map(|&point| WeightedPoint { point, weight }),
            );
        }
        out
    }
}

impl Default for ActivityHistogram {
    fn default() -> Self {
        Self::new()
    }
}
