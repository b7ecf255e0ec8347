//! Frame-by-frame tracking orchestration.
//!
//! Per accepted frame the pipeline runs a fixed state sequence:
//!
//! 1. **Buffering** — ring-buffer maintenance; with fewer than three frames
//!    of history no detection happens.
//! 2. **ModelUpdate** — fast-motion always; proboscis and stationary once
//!    enough history exists.
//! 3. **BackgroundJoin** — join the background-append task forked on the
//!    previous frame before reading the median model.
//! 4. **SlowMotionUpdate** — divergence of the tracked frame from the
//!    background.
//! 5. **Detect** — left and right antenna on worker threads, proboscis on
//!    the calling thread; a fork/join barrier, not a queue.
//! 6. **Publish** — attach the result to the *previous* buffered frame. The
//!    pipeline is intentionally one frame behind: the fast-motion model
//!    needs a 3-frame window centered on the frame being published.
//!
//! A worker panic is caught at the barrier and recorded as a per-frame
//! failure marker; it never corrupts the shared buffers.

mod detect;
mod result;

pub use result::{DetectionResult, FrameResult, ResultCache};

use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::background::RunningMedianBackground;
use crate::config::TrackerConfig;
use crate::error::TrackError;
use crate::frame::PixelFrame;
use crate::model::{
    extract_standard_clip, update_fast, update_proboscis, update_slow, update_stationary, ClipMap,
    MotionModels,
};
use crate::region::{ActiveRegion, ConvexHull, ExclusionZones};
use crate::ringbuf::FrameRingBuffer;
use crate::space::CoordinateSpace;

use detect::{combine_activity, detect_proboscis, detect_side};

/// Callback receiving the annotated frame after each publish.
pub type FrameCallback = Box<dyn FnMut(&PixelFrame) + Send>;

/// Static session inputs: hulls and zones in standard space, the treatment
/// sensor in frame space.
#[derive(Debug, Clone, Default)]
pub struct TrackingSetup {
    pub left_hull: ConvexHull,
    pub right_hull: ConvexHull,
    pub proboscis_hull: ConvexHull,
    pub exclusion_zones: ExclusionZones,
    pub treatment_point: Option<[f64; 2]>,
}

/// The per-session tracking engine.
///
/// All lookup state (hulls, calibration, tuning) is captured at construction;
/// two pipelines never share mutable state, so tests can run them
/// side by side.
pub struct TrackingPipeline {
    config: TrackerConfig,
    space: CoordinateSpace,
    left_region: ActiveRegion,
    right_region: ActiveRegion,
    proboscis_region: ActiveRegion,
    treatment_point: Option<[f64; 2]>,

    buffer: FrameRingBuffer,
    models: MotionModels,
    activity_left: ClipMap,
    activity_right: ClipMap,
    /// Standard clips of the last frames, oldest first (at most three).
    clips: VecDeque<ClipMap>,

    background: Option<RunningMedianBackground>,
    background_task: Option<JoinHandle<RunningMedianBackground>>,

    results: ResultCache,
    prev_left: Option<DetectionResult>,
    prev_right: Option<DetectionResult>,
    prev_proboscis: Option<DetectionResult>,

    callback: Option<FrameCallback>,
    frames_accepted: u64,
    last_first_row: Vec<u8>,
    /// Failure from a background join outside the detection path, attached
    /// to the next published result.
    pending_failure: Option<String>,
}

impl TrackingPipeline {
    /// Build a pipeline for frames of `width x height` pixels.
    pub fn new(
        config: TrackerConfig,
        space: CoordinateSpace,
        setup: TrackingSetup,
        width: usize,
        height: usize,
    ) -> Result<Self, TrackError> {
        let size = space.standard_size().round() as usize;
        let zones = &setup.exclusion_zones;
        let left_region = ActiveRegion::compute(&setup.left_hull, &[&setup.proboscis_hull], zones, size);
        let right_region =
            ActiveRegion::compute(&setup.right_hull, &[&setup.proboscis_hull], zones, size);
        let proboscis_region = ActiveRegion::compute(&setup.proboscis_hull, &[], zones, size);
        tracing::info!(
            left = left_region.len(),
            right = right_region.len(),
            proboscis = proboscis_region.len(),
            "active regions computed"
        );

        Ok(Self {
            buffer: FrameRingBuffer::new(config.buffer_capacity, width, height),
            models: MotionModels::new(size),
            activity_left: ClipMap::new(size),
            activity_right: ClipMap::new(size),
            clips: VecDeque::with_capacity(3),
            background: Some(RunningMedianBackground::new(
                size,
                size,
                config.background_window,
            )),
            background_task: None,
            results: ResultCache::new(),
            prev_left: None,
            prev_right: None,
            prev_proboscis: None,
            callback: None,
            frames_accepted: 0,
            last_first_row: Vec::new(),
            pending_failure: None,
            treatment_point: setup.treatment_point,
            config,
            space,
            left_region,
            right_region,
            proboscis_region,
        })
    }

    /// Install the annotated-frame callback.
    pub fn set_frame_callback(&mut self, callback: FrameCallback) {
        self.callback = Some(callback);
    }

    /// Published results so far, keyed by frame index.
    pub fn results(&self) -> &ResultCache {
        &self.results
    }

    /// Consume the pipeline and hand the session's results to the exporter.
    pub fn into_results(mut self) -> ResultCache {
        self.finish();
        std::mem::take(&mut self.results)
    }

    /// Number of frames accepted into the window so far.
    pub fn frames_accepted(&self) -> u64 {
        self.frames_accepted
    }

    /// Feed one decoded frame. Returns the result published this step, which
    /// belongs to the *previous* frame, or `None` while buffering.
    pub fn process_frame(&mut self, frame: &PixelFrame) -> Result<Option<Arc<FrameResult>>, TrackError> {
        // Decoder stutter guard: consecutive frames with an identical first
        // pixel row would dilute the sliding window.
        let row = &frame.row(0)[..frame.width() * 3];
        if row == self.last_first_row.as_slice() {
            tracing::info!(index = frame.index, "skipping duplicate frame");
            return Ok(None);
        }
        self.last_first_row.clear();
        self.last_first_row.extend_from_slice(row);

        // ── Buffering ──────────────────────────────────────────────────────
        if self.buffer.len() == self.buffer.capacity() {
            self.buffer.remove_oldest()?;
        }
        self.buffer.enqueue(frame)?;
        self.frames_accepted += 1;

        let size = self.space.standard_size().round() as usize;
        let mut clip = if self.clips.len() == 3 {
            self.clips.pop_front().unwrap()
        } else {
            ClipMap::new(size)
        };
        extract_standard_clip(frame, &self.space, &mut clip);
        self.clips.push_back(clip);

        if self.clips.len() < 3 {
            self.fork_background_append();
            return Ok(None);
        }

        let mut failure: Option<String> = self.pending_failure.take();

        // ── ModelUpdate ────────────────────────────────────────────────────
        // The published frame sits at the center of the 3-clip window. Fast
        // motion covers all three regions: the proboscis update subtracts it
        // to reject antennae sweeping through the zone.
        let (prev2, detect_clip, cur) = (&self.clips[0], &self.clips[1], &self.clips[2]);
        let color = self.config.antenna_color;
        for region in [&self.left_region, &self.right_region, &self.proboscis_region] {
            update_fast(
                &mut self.models.fast,
                cur,
                detect_clip,
                prev2,
                region,
                color,
                &self.config.model,
            );
        }
        let history_ready = self.frames_accepted >= self.config.background_window as u64;
        if history_ready {
            update_proboscis(
                &mut self.models.proboscis,
                &self.models.fast,
                detect_clip,
                &self.proboscis_region,
                color,
                &self.config.model,
            );
            for region in [&self.left_region, &self.right_region] {
                update_stationary(
                    &mut self.models.stationary,
                    detect_clip,
                    region,
                    color,
                    &self.config.model,
                );
            }
        }

        // ── BackgroundJoin ─────────────────────────────────────────────────
        if let Some(msg) = self.join_background() {
            failure = Some(msg);
        }

        // ── SlowMotionUpdate ───────────────────────────────────────────────
        let detect_clip = &self.clips[1];
        let background = self.background.as_ref().ok_or(TrackError::WorkerFailed {
            worker: "background",
        })?;
        for region in [&self.left_region, &self.right_region] {
            update_slow(
                &mut self.models.slow,
                background.median_plane(),
                detect_clip,
                region,
                color,
                &self.config.model,
            );
        }

        // ── Detect ─────────────────────────────────────────────────────────
        combine_activity(
            &mut self.activity_left,
            &self.models.fast,
            &self.models.slow,
            &self.left_region,
        );
        combine_activity(
            &mut self.activity_right,
            &self.models.fast,
            &self.models.slow,
            &self.right_region,
        );

        let center = [self.space.standard_size() * 0.5, self.space.standard_size() * 0.5];
        let (left, right, proboscis) = {
            let config = &self.config;
            let space = &self.space;
            let models = &self.models;
            let (activity_left, activity_right) = (&self.activity_left, &self.activity_right);
            let (left_region, right_region, proboscis_region) = (
                &self.left_region,
                &self.right_region,
                &self.proboscis_region,
            );
            let (prev_left, prev_right, prev_proboscis) = (
                self.prev_left.as_ref(),
                self.prev_right.as_ref(),
                self.prev_proboscis.as_ref(),
            );
            std::thread::scope(|s| {
                let lh = s.spawn(move || {
                    catch_unwind(AssertUnwindSafe(|| {
                        detect_side(
                            activity_left,
                            &models.stationary,
                            left_region,
                            space,
                            center,
                            config,
                            prev_left,
                        )
                    }))
                });
                let rh = s.spawn(move || {
                    catch_unwind(AssertUnwindSafe(|| {
                        detect_side(
                            activity_right,
                            &models.stationary,
                            right_region,
                            space,
                            center,
                            config,
                            prev_right,
                        )
                    }))
                });
                let p = catch_unwind(AssertUnwindSafe(|| {
                    detect_proboscis(
                        &models.proboscis,
                        proboscis_region,
                        space,
                        center,
                        config,
                        prev_proboscis,
                    )
                }));
                // barrier: all three must land before the frame can finalize
                (lh.join().expect("scoped join"), rh.join().expect("scoped join"), p)
            })
        };

        let left = unwrap_worker(left, "left", &mut failure);
        let right = unwrap_worker(right, "right", &mut failure);
        let proboscis = unwrap_worker(proboscis, "proboscis", &mut failure);

        // ── Publish ────────────────────────────────────────────────────────
        let published = self.publish(left, right, proboscis, failure);
        self.fork_background_append();
        Ok(published)
    }

    /// Join any in-flight background task. Called automatically on drop;
    /// stopping never abandons a running worker.
    pub fn finish(&mut self) {
        if let Some(msg) = self.join_background() {
            self.pending_failure = Some(msg);
        }
    }

    /// Join the background-append task forked on the previous frame,
    /// returning a failure message if the worker panicked.
    fn join_background(&mut self) -> Option<String> {
        let task = self.background_task.take()?;
        match task.join() {
            Ok(bg) => {
                self.background = Some(bg);
                None
            }
            Err(_) => {
                tracing::warn!("background worker panicked; model restarted");
                let size = self.space.standard_size().round() as usize;
                self.background = Some(RunningMedianBackground::new(
                    size,
                    size,
                    self.config.background_window,
                ));
                Some("background worker failed".into())
            }
        }
    }

    fn fork_background_append(&mut self) {
        // a task forked on the previous frame may still be running
        if let Some(msg) = self.join_background() {
            self.pending_failure = Some(msg);
        }
        // The background trails detection: it consumes the oldest clip of
        // the three-frame window, so the median never contains the frame
        // under detection.
        if self.clips.len() < 3 {
            return;
        }
        let Some(bg) = self.background.take() else {
            return;
        };
        let Some(clip) = self.clips.front() else {
            self.background = Some(bg);
            return;
        };
        let bytes = clip.as_bytes().to_vec();
        self.background_task = Some(std::thread::spawn(move || {
            let mut bg = bg;
            bg.append(&bytes);
            bg
        }));
    }

    fn publish(
        &mut self,
        left: Option<DetectionResult>,
        right: Option<DetectionResult>,
        proboscis: Option<DetectionResult>,
        failure: Option<String>,
    ) -> Option<Arc<FrameResult>> {
        let prev_frame = self.buffer.nth_from_tail(1)?;
        let frame_index = prev_frame.read().unwrap().index;

        let treatment = self
            .treatment_point
            .and_then(|p| sample_treatment(&prev_frame.read().unwrap(), p));

        let result = Arc::new(FrameResult {
            frame_index,
            left: left.clone(),
            right: right.clone(),
            proboscis: proboscis.clone(),
            treatment,
            failure,
        });

        prev_frame.write().unwrap().result = Some(Arc::clone(&result));
        self.results.insert(frame_index, Arc::clone(&result));
        self.prev_left = left;
        self.prev_right = right;
        self.prev_proboscis = proboscis;

        if let Some(callback) = self.callback.as_mut() {
            let mut annotated = prev_frame.read().unwrap().clone();
            annotate(&mut annotated, &result);
            callback(&annotated);
        }
        Some(result)
    }
}

impl Drop for TrackingPipeline {
    fn drop(&mut self) {
        self.finish();
    }
}

fn unwrap_worker<T>(
    outcome: std::thread::Result<Option<T>>,
    worker: &str,
    failure: &mut Option<String>,
) -> Option<T> {
    match outcome {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(worker, "detection worker panicked");
            *failure = Some(format!("{} detection worker failed", worker));
            None
        }
    }
}

/// Mean green-channel brightness over the 3x3 neighborhood of the treatment
/// sensor point.
fn sample_treatment(frame: &PixelFrame, point: [f64; 2]) -> Option<f32> {
    let (cx, cy) = (point[0].round() as i64, point[1].round() as i64);
    let mut sum = 0.0;
    let mut n = 0;
    for dy in -1..=1 {
        for dx in -1..=1 {
            let (x, y) = (cx + dx, cy + dy);
            if frame.in_bounds(x, y) {
                sum += frame.pixel(x as usize, y as usize)[1] as f32;
                n += 1;
            }
        }
    }
    (n > 0).then(|| sum / n as f32)
}

/// Paint detection overlay into the published frame copy.
fn annotate(frame: &mut PixelFrame, result: &FrameResult) {
    let parts = [
        (result.left.as_ref(), [0, 0, 255]),
        (result.right.as_ref(), [0, 255, 0]),
        (result.proboscis.as_ref(), [255, 0, 255]),
    ];
    for (part, color) in parts {
        let Some(part) = part else { continue };
        for sp in &part.support {
            put_dot(frame, sp.frame, 0, color);
        }
        put_dot(frame, part.tip.frame, 1, [255, 255, 255]);
        if let Some(base) = &part.base {
            put_dot(frame, base.frame, 1, [128, 128, 128]);
        }
    }
}

fn put_dot(frame: &mut PixelFrame, at: [f64; 2], radius: i64, color: [u8; 3]) {
    let (cx, cy) = (at[0].round() as i64, at[1].round() as i64);
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            let (x, y) = (cx + dx, cy + dy);
            if frame.in_bounds(x, y) {
                frame.set_pixel(x as usize, y as usize, color);
            }
        }
    }
}
