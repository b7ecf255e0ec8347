//! Per-frame tracking result records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::space::SpacePoint;

/// One detected anatomical part (a side's antenna, or the proboscis).
///
/// Immutable once built; every coordinate is carried in all five spaces so
/// exporters never have to re-run the transform chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionResult {
    /// Detected tip position.
    pub tip: SpacePoint,
    /// Detected base position (sides only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base: Option<SpacePoint>,
    /// Active points supporting the detection, for diagnostics and overlay.
    pub support: Vec<SpacePoint>,
    /// Accumulated activity weight per angular sector (sides only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector_weights: Option<Vec<f32>>,
    /// Index of the heaviest sector (sides only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dominant_sector: Option<usize>,
}

/// Everything tracked for one frame.
///
/// Absent parts mean "no detection this frame" and are expected by
/// consumers; they are not errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_index: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<DetectionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proboscis: Option<DetectionResult>,
    /// Mean brightness sampled at the treatment-sensor point.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treatment: Option<f32>,
    /// Set when a worker failed mid-frame; the partial result is still
    /// published rather than corrupting shared state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// Session-lifetime map of published results, keyed by frame index.
pub type ResultCache = BTreeMap<u64, Arc<FrameResult>>;
