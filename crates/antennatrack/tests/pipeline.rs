//! End-to-end pipeline scenarios over synthetic frames.

use antennatrack::{
    ConvexHull, CoordinateSpace, HeadCalibration, PixelFrame, TrackerConfig, TrackingPipeline,
    TrackingSetup,
};

const W: usize = 200;
const H: usize = 200;

/// Calibration mapping the head clip (frame 50..150 square) onto the
/// 100 px standard space with no rotation: standard = frame - (50, 50).
fn test_space() -> CoordinateSpace {
    CoordinateSpace::new(HeadCalibration {
        offset: [100.0, 100.0],
        angle: -std::f64::consts::FRAC_PI_2,
        scale_x: 1.0,
        scape_distance_unit: 50.0,
        standard_size: 100.0,
        prior_angle: -std::f64::consts::FRAC_PI_2,
    })
    .unwrap()
}

fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> ConvexHull {
    ConvexHull::new(vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]])
}

fn test_setup() -> TrackingSetup {
    TrackingSetup {
        left_hull: square(2.0, 2.0, 48.0, 96.0),
        right_hull: square(52.0, 2.0, 96.0, 96.0),
        proboscis_hull: ConvexHull::default(),
        exclusion_zones: Default::default(),
        treatment_point: Some([10.0, 10.0]),
    }
}

fn test_config() -> TrackerConfig {
    TrackerConfig {
        background_window: 3,
        ..TrackerConfig::default()
    }
}

/// Build a frame; `paint` returns the pixel for each (x, y). Pixel (0, 0)
/// carries the frame index so consecutive synthetic frames are never
/// mistaken for decoder stutter.
fn make_frame(index: u64, paint: impl Fn(usize, usize) -> [u8; 3]) -> PixelFrame {
    let mut f = PixelFrame::with_dims(W, H);
    for y in 0..H {
        for x in 0..W {
            f.set_pixel(x, y, paint(x, y));
        }
    }
    f.set_pixel(0, 0, [index as u8, 255, 255]);
    f.index = index;
    f.ready = true;
    f
}

fn new_pipeline() -> TrackingPipeline {
    TrackingPipeline::new(test_config(), test_space(), test_setup(), W, H).unwrap()
}

#[test]
fn static_scene_produces_no_detections() {
    let mut pipeline = new_pipeline();
    for i in 0..6 {
        let frame = make_frame(i, |_, _| [200, 200, 200]);
        pipeline.process_frame(&frame).unwrap();
    }
    pipeline.finish();

    // frames 1..=4 are published (one-frame lag, first and last never are)
    assert_eq!(pipeline.results().len(), 4);
    for (index, result) in pipeline.results() {
        assert_eq!(result.frame_index, *index);
        assert!(result.left.is_none(), "frame {}: unexpected left", index);
        assert!(result.right.is_none());
        assert!(result.proboscis.is_none());
        assert!(result.failure.is_none());
        // bright treatment sample from the static scene
        assert!(result.treatment.unwrap() > 190.0);
    }
}

#[test]
fn first_buffered_frame_never_receives_a_result() {
    let mut pipeline = new_pipeline();
    for i in 0..5 {
        let frame = make_frame(i, |_, _| [180, 180, 180]);
        pipeline.process_frame(&frame).unwrap();
    }
    assert!(!pipeline.results().contains_key(&0));
    assert!(pipeline.results().contains_key(&1));
}

#[test]
fn duplicate_frames_are_skipped() {
    let mut pipeline = new_pipeline();
    let frame = make_frame(0, |_, _| [150, 150, 150]);
    pipeline.process_frame(&frame).unwrap();
    assert_eq!(pipeline.frames_accepted(), 1);
    // identical first row: decoder stutter, must not dilute the window
    pipeline.process_frame(&frame).unwrap();
    assert_eq!(pipeline.frames_accepted(), 1);
}

#[test]
fn stationary_block_is_recovered_through_fallback() {
    // antenna-colored block fixed at standard (10..20, 20..30), no motion
    let paint = |x: usize, y: usize| -> [u8; 3] {
        if (60..70).contains(&x) && (70..80).contains(&y) {
            [30, 30, 30]
        } else {
            [200, 200, 200]
        }
    };
    let mut pipeline = new_pipeline();
    let mut last = None;
    for i in 0..8 {
        let frame = make_frame(i, paint);
        if let Some(result) = pipeline.process_frame(&frame).unwrap() {
            last = Some(result);
        }
    }
    pipeline.finish();

    let result = last.expect("results published");
    let left = result
        .left
        .as_ref()
        .expect("stationary fallback should detect the block");

    // support centroid within 3 px of the block centroid in standard space
    let n = left.support.len() as f64;
    assert!(n >= 10.0);
    let (sx, sy) = left
        .support
        .iter()
        .fold((0.0, 0.0), |(sx, sy), sp| (sx + sp.standard[0], sy + sp.standard[1]));
    let (cx, cy) = (sx / n, sy / n);
    assert!((cx - 14.5).abs() <= 3.0, "centroid x {}", cx);
    assert!((cy - 24.5).abs() <= 3.0, "centroid y {}", cy);

    // the other regions stay quiet
    assert!(result.right.is_none());
    assert!(result.proboscis.is_none());
}

#[test]
fn moving_blob_triggers_side_detection() {
    let mut pipeline = new_pipeline();
    let mut detected = false;
    for i in 0..8u64 {
        // 6 px blob sweeping right through the left region
        let bx = 55 + 3 * i as usize;
        let paint = move |x: usize, y: usize| -> [u8; 3] {
            if (bx..bx + 6).contains(&x) && (90..96).contains(&y) {
                [30, 30, 30]
            } else {
                [200, 200, 200]
            }
        };
        let frame = make_frame(i, paint);
        if let Some(result) = pipeline.process_frame(&frame).unwrap() {
            if let Some(left) = &result.left {
                detected = true;
                // tip must stay inside the left hull
                assert!(left.tip.standard[0] < 50.0, "tip {:?}", left.tip.standard);
                assert!(left.base.is_some());
                let weights = left.sector_weights.as_ref().unwrap();
                assert_eq!(weights.len(), 5);
                assert_eq!(
                    left.dominant_sector.unwrap(),
                    weights
                        .iter()
                        .enumerate()
                        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
                        .unwrap()
                        .0
                );
            }
        }
    }
    assert!(detected, "moving blob never detected");
}

#[test]
fn annotated_frame_callback_fires_per_publish() {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut pipeline = new_pipeline();
    pipeline.set_frame_callback(Box::new(move |frame| {
        assert!(frame.ready);
        seen.fetch_add(1, Ordering::SeqCst);
    }));
    for i in 0..6 {
        let frame = make_frame(i, |_, _| [170, 170, 170]);
        pipeline.process_frame(&frame).unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
