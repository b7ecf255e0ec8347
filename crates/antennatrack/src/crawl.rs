//! Bounded local search ("crawl") from a seed point to the most or least
//! distant similarity-connected pixel.

use std::collections::VecDeque;

use crate::config::CrawlTuning;
use crate::model::{color_distance, ClipMap};
use crate::region::GridPoint;

/// Direction of the best-distance objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlDirection {
    /// Maximize distance to the reference origin (tip search).
    Away,
    /// Minimize distance to the reference origin (base search).
    Toward,
}

/// Breadth-first crawl over `model` from `start`.
///
/// A candidate joins the region when it lies within `max_radius` of the
/// start, has not been visited, and its color distance to the start pixel is
/// at most the color threshold. Among accepted pixels, the best-so-far only
/// moves when the candidate beats it by more than the hysteresis band, which
/// damps oscillation between near-tied candidates and keeps the crawl from
/// running away into noise.
///
/// Terminates when the frontier empties or after the iteration cap. If the
/// start pixel's own model response is exactly zero there is nothing to
/// crawl from and `start` is returned unchanged.
pub fn crawl_to_tip(
    model: &ClipMap,
    start: GridPoint,
    reference: [f64; 2],
    direction: CrawlDirection,
    tuning: &CrawlTuning,
) -> GridPoint {
    let size = model.size();
    let start_px = model.get(start.x as usize, start.y as usize);
    if start_px[1] == 0 {
        return start;
    }

    let radius = tuning.max_radius as i64;
    let hop = tuning.max_hop as i64;
    let grid = (2 * radius + 1) as usize;
    let mut visited = vec![false; grid * grid];
    let visit_index = |x: i64, y: i64| {
        let gx = (x - start.x as i64 + radius) as usize;
        let gy = (y - start.y as i64 + radius) as usize;
        gy * grid + gx
    };

    let mut frontier = VecDeque::new();
    frontier.push_back(start);
    visited[visit_index(start.x as i64, start.y as i64)] = true;

    let mut best = start;
    let mut best_dist = start.distance_to(reference);
    let mut pops = 0;

    while let Some(p) = frontier.pop_front() {
        pops += 1;
        if pops > tuning.iteration_cap {
            break;
        }
        for dy in -hop..=hop {
            for dx in -hop..=hop {
                if dx == 0 && dy == 0 {
                    continue;
                }
                let (x, y) = (p.x as i64 + dx, p.y as i64 + dy);
                if x < 0 || y < 0 || x >= size as i64 || y >= size as i64 {
                    continue;
                }
                let ddx = x - start.x as i64;
                let ddy = y - start.y as i64;
                if ddx * ddx + ddy * ddy > radius * radius {
                    continue;
                }
                let vi = visit_index(x, y);
                if visited[vi] {
                    continue;
                }
                visited[vi] = true;

                let px = model.get(x as usize, y as usize);
                if px[1] == 0 || color_distance(px, start_px) > tuning.color_threshold {
                    continue;
                }
                let candidate = GridPoint {
                    x: x as u32,
                    y: y as u32,
                };
                let dist = candidate.distance_to(reference);
                let improved = match direction {
                    CrawlDirection::Away => dist > best_dist * (1.0 + tuning.hysteresis),
                    CrawlDirection::Toward => dist < best_dist * (1.0 - tuning.hysteresis),
                };
                if improved {
                    best = candidate;
                    best_dist = dist;
                }
                frontier.push_back(candidate);
            }
        }
    }
    best
}
