//! antennatrack — per-frame tracking of insect antenna tips/bases and the
//! proboscis from calibrated head-pose video.
//!
//! Decoded frames flow through a fixed per-frame stage sequence:
//!
//! 1. **Buffer** – sliding frame window in a pre-allocated ring buffer.
//! 2. **Background** – running per-pixel median over the window, maintained
//!    incrementally (no per-frame resort).
//! 3. **Models** – fast-motion, slow-motion, stationary, and proboscis
//!    activation maps, updated only over precomputed active-point regions.
//! 4. **Tail** – intensity-histogram extraction of the highest-activity
//!    points.
//! 5. **Crawl** – bounded similarity-connected search from the denoised seed
//!    to the tip (and base) of each part.
//! 6. **Spaces** – every detected point is carried through the
//!    Frame ⇄ Subclipped ⇄ Standard ⇄ Prior ⇄ Model transform chain.
//!
//! # Public API
//! - [`TrackingPipeline`] and [`TrackingSetup`] as primary entry points
//! - [`TrackerConfig`] for tuning
//! - [`HeadCalibration`] / [`CoordinateSpace`] for the transform chain
//! - result records ([`FrameResult`], [`DetectionResult`]) for exporters
//!
//! Video decoding, UI, and report formatting are external collaborators; the
//! engine consumes [`PixelFrame`]s and produces structured results plus an
//! annotated-frame callback.

mod background;
mod config;
mod crawl;
mod error;
mod frame;
mod histogram;
mod model;
mod pipeline;
mod region;
mod ringbuf;
mod space;
#[cfg(test)]
mod test_utils;

pub use background::RunningMedianBackground;
pub use config::{CrawlTuning, DetectTuning, ModelTuning, TrackerConfig};
pub use crawl::{crawl_to_tip, CrawlDirection};
pub use error::TrackError;
pub use frame::{PixelFrame, BYTES_PER_PIXEL};
pub use histogram::{ActivityHistogram, WeightedPoint};
pub use model::{ClipMap, MotionModels};
pub use pipeline::{
    DetectionResult, FrameCallback, FrameResult, ResultCache, TrackingPipeline, TrackingSetup,
};
pub use region::{ActiveRegion, ConvexHull, ExclusionZones, GridPoint, HullTable};
pub use ringbuf::{FrameRingBuffer, SharedFrame};
pub use space::{CoordinateSpace, HeadCalibration, Space, SpacePoint};
