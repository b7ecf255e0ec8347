//! Coordinate-space chain tying frame pixels to the anatomical reference
//! frame.
//!
//! Five spaces, each an affine neighbor of the next:
//!
//! ```text
//! Frame <-> Subclipped <-> Standard <-> Prior <-> Model
//! ```
//!
//! - **Frame**: raw video pixel coordinates.
//! - **Subclipped**: pixels local to the head clip cut around the calibrated
//!   head offset.
//! - **Standard**: the head clip resampled to a fixed canonical size, so all
//!   per-frame models share one resolution.
//! - **Prior**: centered at the antenna-scape midpoint and de-rotated by the
//!   head angle; hulls compare across frames here regardless of head pose.
//! - **Model**: prior coordinates normalized so the scape distance is one
//!   unit.

use nalgebra::{Point2, Rotation2, Vector2};
use serde::{Deserialize, Serialize};

use crate::error::TrackError;

/// Names for the five coordinate systems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Space {
    Frame,
    Subclipped,
    Standard,
    Prior,
    Model,
}

/// Immutable head-pose calibration record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeadCalibration {
    /// Head reference point (antenna-scape midpoint) in frame pixels.
    pub offset: [f64; 2],
    /// Head rotation in radians, frame +x toward the anatomical axis.
    pub angle: f64,
    /// Horizontal head scale relative to the calibration session.
    pub scale_x: f64,
    /// Scape distance in frame pixels at unit scale.
    pub scape_distance_unit: f64,
    /// Side length of the canonical standard-space clip, pixels.
    pub standard_size: f64,
    /// Canonical anatomical axis angle the prior space is aligned to.
    pub prior_angle: f64,
}

impl Default for HeadCalibration {
    fn default() -> Self {
        Self {
            offset: [0.0, 0.0],
            angle: -std::f64::consts::FRAC_PI_2,
            scale_x: 1.0,
            scape_distance_unit: 50.0,
            standard_size: 100.0,
            prior_angle: -std::f64::consts::FRAC_PI_2,
        }
    }
}

/// One point expressed in every space of the chain.
///
/// Constructed through [`CoordinateSpace`]; all five representations are
/// populated at construction by walking the chain outward from the input
/// space in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpacePoint {
    pub frame: [f64; 2],
    pub subclipped: [f64; 2],
    pub standard: [f64; 2],
    pub prior: [f64; 2],
    pub model: [f64; 2],
}

impl SpacePoint {
    /// Representation of this point in `space`.
    pub fn get(&self, space: Space) -> [f64; 2] {
        match space {
            Space::Frame => self.frame,
            Space::Subclipped => self.subclipped,
            Space::Standard => self.standard,
            Space::Prior => self.prior,
            Space::Model => self.model,
        }
    }
}

/// Bidirectional affine transform chain for one calibration.
///
/// All scale factors are validated at construction: a zero or non-finite
/// scale is a [`TrackError::DegenerateCalibration`], never a silent NaN
/// flowing downstream.
#[derive(Debug, Clone)]
pub struct CoordinateSpace {
    calibration: HeadCalibration,
    /// Frame-space origin of the head clip.
    clip_origin: Vector2<f64>,
    /// Head clip side length in frame pixels.
    clip_size: f64,
    /// Subclipped -> standard magnification.
    standard_scale: f64,
    /// Standard -> prior rotation (head angle relative to the canonical axis).
    rotation: Rotation2<f64>,
    /// Scape distance expressed in standard-space pixels.
    model_scale: f64,
}

impl CoordinateSpace {
    /// Validate `calibration` and precompute the chain.
    pub fn new(calibration: HeadCalibration) -> Result<Self, TrackError> {
        let clip_size = 2.0 * calibration.scale_x * calibration.scape_distance_unit;
        check_scale("head clip size", clip_size)?;
        check_scale("standard size", calibration.standard_size)?;

        let standard_scale = calibration.standard_size / clip_size;
        let model_scale = calibration.standard_size * 0.5;
        let half = clip_size * 0.5;
        Ok(Self {
            clip_origin: Vector2::new(calibration.offset[0] - half, calibration.offset[1] - half),
            clip_size,
            standard_scale,
            rotation: Rotation2::new(calibration.angle - calibration.prior_angle),
            model_scale,
            calibration,
        })
    }

    pub fn calibration(&self) -> &HeadCalibration {
        &self.calibration
    }

    /// Head clip side length in frame pixels.
    pub fn clip_size(&self) -> f64 {
        self.clip_size
    }

    /// Standard-space clip side length in pixels.
    pub fn standard_size(&self) -> f64 {
        self.calibration.standard_size
    }

    // ── adjacent-space maps ────────────────────────────────────────────────

    pub fn frame_to_subclipped(&self, p: [f64; 2]) -> [f64; 2] {
        let q = Point2::new(p[0], p[1]) - self.clip_origin;
        [q.x, q.y]
    }

    pub fn subclipped_to_frame(&self, p: [f64; 2]) -> [f64; 2] {
        [p[0] + self.clip_origin.x, p[1] + self.clip_origin.y]
    }

    pub fn subclipped_to_standard(&self, p: [f64; 2]) -> [f64; 2] {
        [p[0] * self.standard_scale, p[1] * self.standard_scale]
    }

    pub fn standard_to_subclipped(&self, p: [f64; 2]) -> [f64; 2] {
        [p[0] / self.standard_scale, p[1] / self.standard_scale]
    }

    pub fn standard_to_prior(&self, p: [f64; 2]) -> [f64; 2] {
        let c = self.calibration.standard_size * 0.5;
        let v = self.rotation.inverse() * Vector2::new(p[0] - c, p[1] - c);
        [v.x, v.y]
    }

    pub fn prior_to_standard(&self, p: [f64; 2]) -> [f64; 2] {
        let c = self.calibration.standard_size * 0.5;
        let v = self.rotation * Vector2::new(p[0], p[1]);
        [v.x + c, v.y + c]
    }

    pub fn prior_to_model(&self, p: [f64; 2]) -> [f64; 2] {
        [p[0] / self.model_scale, p[1] / self.model_scale]
    }

    pub fn model_to_prior(&self, p: [f64; 2]) -> [f64; 2] {
        [p[0] * self.model_scale, p[1] * self.model_scale]
    }

    // ── space-point constructors ───────────────────────────────────────────

    /// Populate all representations from a frame-space point.
    pub fn point_from_frame(&self, p: [f64; 2]) -> SpacePoint {
        let subclipped = self.frame_to_subclipped(p);
        let standard = self.subclipped_to_standard(subclipped);
        let prior = self.standard_to_prior(standard);
        SpacePoint {
            frame: p,
            subclipped,
            standard,
            prior,
            model: self.prior_to_model(prior),
        }
    }

    /// Populate all representations from a standard-space point.
    pub fn point_from_standard(&self, p: [f64; 2]) -> SpacePoint {
        let subclipped = self.standard_to_subclipped(p);
        let prior = self.standard_to_prior(p);
        SpacePoint {
            frame: self.subclipped_to_frame(subclipped),
            subclipped,
            standard: p,
            prior,
            model: self.prior_to_model(prior),
        }
    }

    /// Populate all representations from a prior-space point.
    pub fn point_from_prior(&self, p: [f64; 2]) -> SpacePoint {
        let standard = self.prior_to_standard(p);
        let subclipped = self.standard_to_subclipped(standard);
        SpacePoint {
            frame: self.subclipped_to_frame(subclipped),
            subclipped,
            standard,
            prior: p,
            model: self.prior_to_model(p),
        }
    }

    /// Populate all representations from a model-space point.
    pub fn point_from_model(&self, p: [f64; 2]) -> SpacePoint {
        self.point_from_prior(self.model_to_prior(p))
    }
}

fn check_scale(name: &'static str, value: f64) -> Result<(), TrackError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(TrackError::DegenerateCalibration { scale: name, value });
    }
    Ok(())
}
