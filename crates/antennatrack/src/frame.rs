//! Owned pixel-frame buffer with stride-aware accessors.

use std::sync::Arc;

use crate::pipeline::FrameResult;

/// Bytes per pixel. The decoder hands us packed 3-channel rows (BGR order).
pub const BYTES_PER_PIXEL: usize = 3;

/// Row stride alignment in bytes. Decoders pad rows to 4-byte boundaries.
const ROW_ALIGN: usize = 4;

/// One decoded video frame plus its per-frame metadata.
///
/// The pixel buffer is allocated once (per ring-buffer slot) and reused for
/// the life of the pipeline: [`PixelFrame::reset`] clears metadata without
/// touching the allocation. Invariant: `stride * height == buf.len()` and
/// `stride >= BYTES_PER_PIXEL * width`.
#[derive(Debug, Clone)]
pub struct PixelFrame {
    width: usize,
    height: usize,
    stride: usize,
    buf: Vec<u8>,
    /// Monotonically increasing decoder frame index.
    pub index: u64,
    /// Presentation timestamp, milliseconds.
    pub timestamp_ms: f64,
    /// Position through the source video in [0, 100].
    pub percent: f32,
    /// Set once pixel data for this slot is valid.
    pub ready: bool,
    /// Tracking result attached at publish time (one frame late).
    pub result: Option<Arc<FrameResult>>,
}

impl PixelFrame {
    /// Allocate a zeroed frame with decoder-compatible row padding.
    pub fn with_dims(width: usize, height: usize) -> Self {
        let row = BYTES_PER_PIXEL * width;
        let stride = row.div_ceil(ROW_ALIGN) * ROW_ALIGN;
        Self {
            width,
            height,
            stride,
            buf: vec![0; stride * height],
            index: 0,
            timestamp_ms: 0.0,
            percent: 0.0,
            ready: false,
            result: None,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Bytes per row, including padding.
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// One full row including padding bytes.
    #[inline]
    pub fn row(&self, y: usize) -> &[u8] {
        &self.buf[y * self.stride..y * self.stride + self.stride]
    }

    /// The three channel bytes at (x, y).
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 3] {
        let i = y * self.stride + x * BYTES_PER_PIXEL;
        [self.buf[i], self.buf[i + 1], self.buf[i + 2]]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: usize, y: usize, px: [u8; 3]) {
        let i = y * self.stride + x * BYTES_PER_PIXEL;
        self.buf[i..i + 3].copy_from_slice(&px);
    }

    /// True when (x, y) addresses a valid pixel.
    #[inline]
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height
    }

    /// Copy pixel data and metadata from `src` into this slot's buffer.
    ///
    /// Dimensions must match; the slot allocation is reused as-is.
    pub fn copy_from(&mut self, src: &PixelFrame) {
        debug_assert_eq!(self.width, src.width);
        debug_assert_eq!(self.height, src.height);
        debug_assert_eq!(self.stride, src.stride);
        self.buf.copy_from_slice(&src.buf);
        self.index = src.index;
        self.timestamp_ms = src.timestamp_ms;
        self.percent = src.percent;
        self.result = None;
        self.ready = true;
    }

    /// Clear metadata for slot reuse. The pixel allocation is kept.
    pub fn reset(&mut self) {
        self.index = 0;
        self.timestamp_ms = 0.0;
        self.percent = 0.0;
        self.ready = false;
        self.result = None;
    }
}
