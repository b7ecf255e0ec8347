//! Per-part detection: activity tail -> seed -> crawl -> result record.

use crate::config::TrackerConfig;
use crate::crawl::{crawl_to_tip, CrawlDirection};
use crate::histogram::{ActivityHistogram, WeightedPoint};
use crate::model::ClipMap;
use crate::region::{ActiveRegion, GridPoint};
use crate::space::CoordinateSpace;

use super::result::DetectionResult;

/// Saturating sum of the fast and slow activations over one region.
///
/// Sides detect on combined motion evidence; either model alone misses slow
/// sweeps or quick flicks respectively.
pub(crate) fn combine_activity(
    out: &mut ClipMap,
    fast: &ClipMap,
    slow: &ClipMap,
    region: &ActiveRegion,
) {
    out.fill(0);
    for p in region.points() {
        let (x, y) = (p.x as usize, p.y as usize);
        let v = fast.get(x, y)[1].saturating_add(slow.get(x, y)[1]);
        out.set_value(x, y, v);
    }
}

/// Weight-averaged centroid of a tail sample.
fn weighted_centroid(tail: &[WeightedPoint]) -> Option<[f64; 2]> {
    let total: f64 = tail.iter().map(|wp| wp.weight as f64).sum();
    if total <= 0.0 {
        return None;
    }
    let (sx, sy) = tail.iter().fold((0.0, 0.0), |(sx, sy), wp| {
        let w = wp.weight as f64;
        (sx + wp.point.x as f64 * w, sy + wp.point.y as f64 * w)
    });
    Some([sx / total, sy / total])
}

/// Tail point closest to the weighted centroid; denoises the seed so the
/// crawl starts inside the supported mass rather than on an outlier.
fn seed_point(tail: &[WeightedPoint]) -> Option<GridPoint> {
    let centroid = weighted_centroid(tail)?;
    tail.iter()
        .min_by(|a, b| {
            a.point
                .distance_to(centroid)
                .partial_cmp(&b.point.distance_to(centroid))
                .unwrap()
        })
        .map(|wp| wp.point)
}

/// Accumulate tail weights into angular sectors around the prior-space
/// origin and return (weights, dominant index).
fn sector_weights(
    tail: &[WeightedPoint],
    space: &CoordinateSpace,
    sectors: usize,
) -> (Vec<f32>, usize) {
    let mut weights = vec![0.0f32; sectors];
    for wp in tail {
        let prior = space
            .point_from_standard([wp.point.x as f64, wp.point.y as f64])
            .prior;
        let angle = prior[1].atan2(prior[0]); // (-pi, pi]
        let t = (angle + std::f64::consts::PI) / (2.0 * std::f64::consts::PI);
        let bin = ((t * sectors as f64) as usize).min(sectors - 1);
        weights[bin] += wp.weight;
    }
    let dominant = weights
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap_or(0);
    (weights, dominant)
}

fn build_result(
    tail: &[WeightedPoint],
    model: &ClipMap,
    space: &CoordinateSpace,
    reference: [f64; 2],
    config: &TrackerConfig,
    with_base: bool,
) -> Option<DetectionResult> {
    let seed = seed_point(tail)?;
    let tip = crawl_to_tip(model, seed, reference, CrawlDirection::Away, &config.crawl);
    let base = with_base
        .then(|| crawl_to_tip(model, seed, reference, CrawlDirection::Toward, &config.crawl));

    let support: Vec<_> = tail
        .iter()
        .map(|wp| space.point_from_standard([wp.point.x as f64, wp.point.y as f64]))
        .collect();

    let (weights, dominant) = if with_base {
        let (w, d) = sector_weights(tail, space, config.detect.sectors);
        (Some(w), Some(d))
    } else {
        (None, None)
    };

    Some(DetectionResult {
        tip: space.point_from_standard([tip.x as f64, tip.y as f64]),
        base: base.map(|b| space.point_from_standard([b.x as f64, b.y as f64])),
        support,
        sector_weights: weights,
        dominant_sector: dominant,
    })
}

/// Detect one side's antenna tip and base.
///
/// Primary evidence is the combined motion activity. When the denoised tail
/// is too thin, the previous frame's solution is reused, displaced only by a
/// stationary-model estimate carrying more support than that solution; with
/// neither, reports no detection.
#[allow(clippy::too_many_arguments)]
pub(crate) fn detect_side(
    activity: &ClipMap,
    stationary: &ClipMap,
    region: &ActiveRegion,
    space: &CoordinateSpace,
    reference: [f64; 2],
    config: &TrackerConfig,
    previous: Option<&DetectionResult>,
) -> Option<DetectionResult> {
    let channel = config.model_channel;
    let mut hist = ActivityHistogram::new();
    hist.build_from_points(activity, region.points(), channel);
    let tail = hist.tail(config.detect.tail_fraction, config.detect.tail_low_limit_bin);

    if tail.len() >= config.detect.min_tail_points {
        return build_result(&tail, activity, space, reference, config, true);
    }

    // thin motion evidence: keep the previous solution unless the stationary
    // model supports a fresh estimate better than that solution does
    let mut stat_hist = ActivityHistogram::new();
    stat_hist.build_from_points(stationary, region.points(), channel);
    let stat_tail = stat_hist.tail(config.detect.tail_fraction, config.detect.tail_low_limit_bin);
    let prev_support = previous.map_or(0, |p| p.support.len());
    if stat_tail.len() >= config.detect.min_tail_points && stat_tail.len() > prev_support {
        tracing::info!(
            stationary_points = stat_tail.len(),
            previous_points = prev_support,
            "side detection fell back to stationary model"
        );
        return build_result(&stat_tail, stationary, space, reference, config, true);
    }

    if previous.is_some() {
        tracing::info!(points = tail.len(), "side detection reusing previous frame");
    }
    previous.cloned()
}

/// Detect the proboscis tip. No base and no sector histogram for this part.
pub(crate) fn detect_proboscis(
    proboscis: &ClipMap,
    region: &ActiveRegion,
    space: &CoordinateSpace,
    reference: [f64; 2],
    config: &TrackerConfig,
    previous: Option<&DetectionResult>,
) -> Option<DetectionResult> {
    let mut hist = ActivityHistogram::new();
    hist.build_from_points(proboscis, region.points(), config.model_channel);
    let tail = hist.tail(config.detect.tail_fraction, config.detect.tail_low_limit_bin);
    if tail.len() < config.detect.min_tail_points {
        return previous.cloned();
    }
    build_result(&tail, proboscis, space, reference, config, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::space::{CoordinateSpace, HeadCalibration};
    use crate::test_utils::{bright_blob, full_region};

    fn identity_space() -> CoordinateSpace {
        // standard size == clip size so standard coordinates equal subclipped
        CoordinateSpace::new(HeadCalibration {
            offset: [50.0, 50.0],
            angle: -std::f64::consts::FRAC_PI_2,
            scale_x: 1.0,
            scape_distance_unit: 50.0,
            standard_size: 100.0,
            prior_angle: -std::f64::consts::FRAC_PI_2,
        })
        .unwrap()
    }

    #[test]
    fn side_detects_blob_tip() {
        let size = 100;
        let region = full_region(size);
        let space = identity_space();
        let activity = bright_blob(size, 70, 30, 4);
        let empty = ClipMap::new(size);
        let out = detect_side(
            &activity,
            &empty,
            &region,
            &space,
            [50.0, 50.0],
            &TrackerConfig::default(),
            None,
        )
        .expect("blob should be detected");
        assert!(out.tip.standard[0] > 60.0);
        assert!(out.tip.standard[1] < 40.0);
        assert!(out.base.is_some());
        assert_eq!(out.sector_weights.as_ref().unwrap().len(), 5);
    }

    #[test]
    fn empty_models_reuse_previous_then_none() {
        let size = 50;
        let region = full_region(size);
        let space = identity_space();
        let empty = ClipMap::new(size);
        let cfg = TrackerConfig::default();

        assert!(detect_side(&empty, &empty, &region, &space, [25.0, 25.0], &cfg, None).is_none());

        let activity = bright_blob(size, 30, 10, 4);
        let first =
            detect_side(&activity, &empty, &region, &space, [25.0, 25.0], &cfg, None).unwrap();
        let reused = detect_side(
            &empty,
            &empty,
            &region,
            &space,
            [25.0, 25.0],
            &cfg,
            Some(&first),
        )
        .unwrap();
        assert_eq!(reused.tip.standard, first.tip.standard);
    }

    #[test]
    fn stationary_fallback_wins_with_more_support() {
        let size = 60;
        let region = full_region(size);
        let space = identity_space();
        let empty = ClipMap::new(size);
        let stationary = bright_blob(size, 20, 40, 5);
        let cfg = TrackerConfig::default();
        let out = detect_side(
            &empty,
            &stationary,
            &region,
            &space,
            [30.0, 30.0],
            &cfg,
            None,
        )
        .expect("stationary support should produce an estimate");
        assert!(out.tip.standard[0] < 30.0);
    }

    #[test]
    fn previous_solution_outranks_thinner_stationary_support() {
        let size = 60;
        let region = full_region(size);
        let space = identity_space();
        let empty = ClipMap::new(size);
        let cfg = TrackerConfig::default();

        // previous solution from a wide blob (144 support points)
        let wide = bright_blob(size, 30, 30, 6);
        let prev = detect_side(&wide, &empty, &region, &space, [30.0, 30.0], &cfg, None).unwrap();

        // a stationary blob with less support must not displace it
        let stationary = bright_blob(size, 10, 50, 3);
        let out = detect_side(
            &empty,
            &stationary,
            &region,
            &space,
            [30.0, 30.0],
            &cfg,
            Some(&prev),
        )
        .unwrap();
        assert_eq!(out.tip.standard, prev.tip.standard);

        // against a thinner previous solution the same stationary blob wins
        let thin_prev = DetectionResult {
            support: prev.support[..12].to_vec(),
            ..prev.clone()
        };
        let out = detect_side(
            &empty,
            &stationary,
            &region,
            &space,
            [30.0, 30.0],
            &cfg,
            Some(&thin_prev),
        )
        .unwrap();
        assert!(out.tip.standard != thin_prev.tip.standard);
        assert!(out.tip.standard[1] > 40.0, "tip {:?}", out.tip.standard);
    }

    #[test]
    fn combined_activity_saturates() {
        let size = 10;
        let region = full_region(size);
        let mut fast = ClipMap::new(size);
        let mut slow = ClipMap::new(size);
        fast.set_value(3, 3, 200);
        slow.set_value(3, 3, 200);
        let mut out = ClipMap::new(size);
        combine_activity(&mut out, &fast, &slow, &region);
        assert_eq!(out.get(3, 3)[1], 255);
        assert_eq!(out.get(0, 0)[1], 0);
    }
}
