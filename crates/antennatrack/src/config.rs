//! Tracker configuration.
//!
//! The numeric defaults below are empirically tuned against recorded
//! sessions; they are exposed as plain fields rather than rederived so a
//! calibration run can override any of them.

use serde::{Deserialize, Serialize};

/// Per-pixel model update tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelTuning {
    /// Fast-motion decay applied to the previous activation.
    pub fast_decay: f32,
    /// Activations at or below this are floored to zero.
    pub low_floor: u8,
    /// Weight of the fast-motion green channel subtracted in the proboscis
    /// update.
    pub proboscis_fast_weight: f32,
    /// Slow-motion divergence divisor.
    pub slow_divisor: f32,
    /// Slow-motion responses at or below this are zeroed.
    pub slow_floor: u8,
    /// Stationary distance divisor.
    pub stationary_divisor: f32,
    /// Stationary responses at or below this closeness threshold are zeroed.
    pub stationary_floor: u8,
}

impl Default for ModelTuning {
    fn default() -> Self {
        Self {
            fast_decay: 0.15,
            low_floor: 1,
            proboscis_fast_weight: 2.0,
            slow_divisor: 3.0,
            slow_floor: 2,
            stationary_divisor: 3.0,
            stationary_floor: 150,
        }
    }
}

/// Bounded local-search (crawl) tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlTuning {
    /// Maximum color distance from the seed pixel for a candidate to join
    /// the crawled region.
    pub color_threshold: f32,
    /// Search radius around the seed, pixels.
    pub max_radius: u32,
    /// Neighborhood hop distance per expansion step, pixels.
    pub max_hop: u32,
    /// Relative hysteresis band on best-distance updates; damps tie
    /// oscillation between equally-distant candidates.
    pub hysteresis: f64,
    /// Hard cap on frontier pops per crawl.
    pub iteration_cap: usize,
}

impl Default for CrawlTuning {
    fn default() -> Self {
        Self {
            color_threshold: 60.0,
            max_radius: 40,
            max_hop: 2,
            hysteresis: 0.025,
            iteration_cap: 500,
        }
    }
}

/// Tail extraction and fallback tuning for the detection step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectTuning {
    /// Fraction of active points kept when extracting the activity tail.
    pub tail_fraction: f32,
    /// Histogram bucket floor for the tail walk.
    pub tail_low_limit_bin: u8,
    /// Minimum tail points for a detection; below this the previous frame's
    /// solution (or a stationary-model estimate) is used instead.
    pub min_tail_points: usize,
    /// Number of angular sector bins per side.
    pub sectors: usize,
}

impl Default for DetectTuning {
    fn default() -> Self {
        Self {
            tail_fraction: 0.1,
            tail_low_limit_bin: 35,
            min_tail_points: 10,
            sectors: 5,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Ring-buffer capacity in frames.
    pub buffer_capacity: usize,
    /// Background median window in frames.
    pub background_window: usize,
    /// Calibrated antenna reference color (BGR).
    pub antenna_color: [u8; 3],
    /// Histogram channel the activity models are bucketed on.
    pub model_channel: usize,
    pub model: ModelTuning,
    pub crawl: CrawlTuning,
    pub detect: DetectTuning,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 5,
            background_window: 9,
            antenna_color: [30, 30, 30],
            model_channel: 1,
            model: ModelTuning::default(),
            crawl: CrawlTuning::default(),
            detect: DetectTuning::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuned_defaults_are_stable() {
        let cfg = TrackerConfig::default();
        assert!((cfg.model.fast_decay - 0.15).abs() < 1e-6);
        assert_eq!(cfg.model.stationary_floor, 150);
        assert_eq!(cfg.model.slow_floor, 2);
        assert_eq!(cfg.detect.tail_low_limit_bin, 35);
        assert!((cfg.crawl.hysteresis - 0.025).abs() < 1e-9);
        assert_eq!(cfg.crawl.iteration_cap, 500);
        assert_eq!(cfg.detect.min_tail_points, 10);
        assert_eq!(cfg.detect.sectors, 5);
    }

    #[test]
    fn config_round_trips_through_serde() {
        let cfg = TrackerConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrackerConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.buffer_capacity, cfg.buffer_capacity);
        assert_eq!(back.model.stationary_floor, cfg.model.stationary_floor);
    }
}
