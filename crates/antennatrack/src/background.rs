//! Running per-pixel median background over a sliding frame window.
//!
//! Each pixel channel keeps a 256-bin occupancy histogram, the current
//! median-bin pointer, and the count of samples strictly below that bin.
//! Appending (and evicting) a frame touches each cell's histogram once and
//! nudges the pointer at most a few bins, so maintenance is O(1) amortized per
//! pixel per frame; there is never a full re-sort or rescan.

use std::collections::VecDeque;

use rayon::prelude::*;

const BINS: usize = 256;

/// Per-cell median state: bin pointer plus below-pointer sample count.
#[derive(Clone, Copy, Default)]
struct Cell {
    median: u8,
    below: u32,
}

/// Sliding-window median model over 3-channel clips.
///
/// `append` consumes standard-space head clips (packed `3 * width * height`
/// bytes, no row padding). The maintained value for every cell is readable at
/// any time via [`RunningMedianBackground::median_plane`]; there is no
/// separate "compute median" pass.
pub struct RunningMedianBackground {
    width: usize,
    height: usize,
    window: usize,
    /// `cells * 256` occupancy counts, one 256-run per cell.
    hist: Vec<u16>,
    cells: Vec<Cell>,
    /// Continuously maintained median value per cell.
    medians: Vec<u8>,
    /// Clips currently inside the window, oldest first.
    pending: VecDeque<Vec<u8>>,
}

impl RunningMedianBackground {
    /// Zero-initialized model for `width x height` clips over `window` frames.
    pub fn new(width: usize, height: usize, window: usize) -> Self {
        assert!(window >= 1, "median window must be at least one frame");
        let n = width * height * 3;
        Self {
            width,
            height,
            window,
            hist: vec![0; n * BINS],
            cells: vec![Cell::default(); n],
            medians: vec![0; n],
            pending: VecDeque::with_capacity(window + 1),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of frames currently contributing to the model.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Packed `3 * width * height` plane of maintained median values.
    pub fn median_plane(&self) -> &[u8] {
        &self.medians
    }

    /// Maintained median for channel `c` of pixel (x, y).
    #[inline]
    pub fn median_value(&self, x: usize, y: usize, c: usize) -> u8 {
        self.medians[(y * self.width + x) * 3 + c]
    }

    /// Add one clip to the window, evicting the oldest when the window is
    /// over capacity.
    pub fn append(&mut self, clip: &[u8]) {
        let n = self.width * self.height * 3;
        assert_eq!(clip.len(), n, "clip size mismatch");
        self.pending.push_back(clip.to_vec());
        let evicted = if self.pending.len() > self.window {
            self.pending.pop_front()
        } else {
            None
        };
        let count = self.pending.len();
        let evicted = evicted.as_deref();

        self.hist
            .par_chunks_mut(BINS)
            .zip(self.cells.par_iter_mut())
            .zip(self.medians.par_iter_mut())
            .enumerate()
            .for_each(|(i, ((hist, cell), median))| {
                let added = clip[i];
                hist[added as usize] += 1;
                if added < cell.median {
                    cell.below += 1;
                }
                if let Some(old) = evicted {
                    let removed = old[i];
                    debug_assert!(hist[removed as usize] > 0);
                    hist[removed as usize] -= 1;
                    if removed < cell.median {
                        cell.below -= 1;
                    }
                }
                settle(hist, cell, count);
                *median = cell.median;
            });
    }
}

/// Re-seat the median-bin pointer after one add/remove pair.
///
/// `offset` is the half-point rank of the median within the current bin:
/// strictly negative means the pointer drifted above the true median,
/// `>= occupancy - 0.5` by more than a tie means it drifted below. Ties keep
/// the pointer where it is, so equal-offset churn never moves it. The
/// non-empty-bin scan is bounded by the bin count; it cannot loop.
fn settle(hist: &[u16], cell: &mut Cell, count: usize) {
    if count == 0 {
        return;
    }
    let rank = (count as f32 - 1.0) * 0.5;
    let mut steps = 0;
    loop {
        debug_assert!(steps <= BINS, "median scan exceeded bin range");
        let occupancy = hist[cell.median as usize] as f32;
        let offset = rank - cell.below as f32;
        if offset < -0.5 {
            // Median drifted below the pointer: step down to the next
            // occupied bin.
            let mut b = cell.median as usize;
            loop {
                b -= 1;
                if hist[b] > 0 {
                    break;
                }
            }
            cell.below -= hist[b] as u32;
            cell.median = b as u8;
        } else if offset > occupancy - 0.5 {
            // Median drifted above the current bin: step up.
            cell.below += hist[cell.median as usize] as u32;
            let mut b = cell.median as usize;
            loop {
                b += 1;
                if b >= BINS || hist[b] > 0 {
                    break;
                }
            }
            cell.median = (b.min(BINS - 1)) as u8;
        } else {
            return;
        }
        steps += 1;
    }
}
