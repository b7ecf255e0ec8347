//! Fixed-capacity circular buffer of pre-allocated frames.
//!
//! Slots are allocated once at construction and reused by modulo addressing.
//! Structural state (head/tail indices) lives behind one mutex; pixel payloads
//! sit behind per-slot `RwLock`s so a reader holding a frame never blocks
//! enqueue bookkeeping. The pipeline guarantees the producer and readers never
//! address the same slot simultaneously, so slot locks are uncontended in
//! practice.

use std::sync::{Arc, Mutex, RwLock};

use crate::error::TrackError;
use crate::frame::PixelFrame;

/// Shared handle to one buffered frame.
pub type SharedFrame = Arc<RwLock<PixelFrame>>;

struct Window {
    /// Logical index of the oldest live frame. Monotonic, never wraps.
    head: u64,
    /// Logical index one past the newest live frame. Monotonic.
    tail: u64,
}

/// Circular frame buffer with logical head/tail addressing.
///
/// Invariant: `0 <= tail - head <= capacity`. Positions below `head` or at or
/// above `tail` are outside the window; lookups there return `None`, meaning
/// "not enough history yet" rather than an error.
pub struct FrameRingBuffer {
    slots: Vec<SharedFrame>,
    window: Mutex<Window>,
}

impl FrameRingBuffer {
    /// Pre-allocate `capacity` frame slots of the given dimensions.
    pub fn new(capacity: usize, width: usize, height: usize) -> Self {
        assert!(capacity > 0, "ring buffer capacity must be positive");
        let slots = (0..capacity)
            .map(|_| Arc::new(RwLock::new(PixelFrame::with_dims(width, height))))
            .collect();
        Self {
            slots,
            window: Mutex::new(Window { head: 0, tail: 0 }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        let w = self.window.lock().unwrap();
        (w.tail - w.head) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Logical index of the oldest live frame.
    pub fn head(&self) -> u64 {
        self.window.lock().unwrap().head
    }

    /// Logical index one past the newest live frame.
    pub fn tail(&self) -> u64 {
        self.window.lock().unwrap().tail
    }

    #[inline]
    fn slot(&self, position: u64) -> &SharedFrame {
        &self.slots[(position % self.slots.len() as u64) as usize]
    }

    /// Copy `src` into the next reusable slot and advance the tail.
    pub fn enqueue(&self, src: &PixelFrame) -> Result<(), TrackError> {
        let mut w = self.window.lock().unwrap();
        if (w.tail - w.head) as usize == self.slots.len() {
            return Err(TrackError::CapacityExceeded {
                capacity: self.slots.len(),
            });
        }
        self.slot(w.tail).write().unwrap().copy_from(src);
        w.tail += 1;
        Ok(())
    }

    /// Reset the oldest slot and advance the head.
    pub fn remove_oldest(&self) -> Result<(), TrackError> {
        let mut w = self.window.lock().unwrap();
        if w.tail == w.head {
            return Err(TrackError::EmptyBuffer);
        }
        self.slot(w.head).write().unwrap().reset();
        w.head += 1;
        Ok(())
    }

    /// Frame at absolute logical position, or `None` outside `[head, tail)`.
    pub fn get(&self, position: u64) -> Option<SharedFrame> {
        let w = self.window.lock().unwrap();
        if position < w.head || position >= w.tail {
            return None;
        }
        Some(Arc::clone(self.slot(position)))
    }

    /// `n`-th frame counting up from the oldest (`n = 0` is the oldest).
    pub fn nth_from_head(&self, n: usize) -> Option<SharedFrame> {
        let w = self.window.lock().unwrap();
        let pos = w.head + n as u64;
        if pos >= w.tail {
            return None;
        }
        Some(Arc::clone(self.slot(pos)))
    }

    /// `n`-th frame counting back from the newest (`n = 0` is the newest).
    pub fn nth_from_tail(&self, n: usize) -> Option<SharedFrame> {
        let w = self.window.lock().unwrap();
        if (n as u64) >= w.tail - w.head {
            return None;
        }
        Some(Arc::clone(self.slot(w.tail - 1 - n as u64)))
    }

    /// Reset every slot and rewind both indices to zero.
    pub fn clear(&self) {
        let mut w = self.window.lock().unwrap();
        for slot in &self.slots {
            slot.write().unwrap().reset();
        }
        w.head = 0;
        w.tail = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(index: u64) -> PixelFrame {
        let mut f = PixelFrame::with_dims(4, 4);
        f.index = index;
        f.set_pixel(0, 0, [index as u8, 0, 0]);
        f
    }

    #[test]
    fn enqueue_until_full_then_capacity_exceeded() {
        let buf = FrameRingBuffer::new(3, 4, 4);
        for i in 0..3 {
            buf.enqueue(&frame(i)).unwrap();
        }
        assert_eq!(buf.len(), 3);
        assert!(matches!(
            buf.enqueue(&frame(3)),
            Err(TrackError::CapacityExceeded { capacity: 3 })
        ));
    }

    #[test]
    fn remove_oldest_on_empty_fails() {
        let buf = FrameRingBuffer::new(2, 4, 4);
        assert_eq!(buf.remove_oldest(), Err(TrackError::EmptyBuffer));
    }

    #[test]
    fn window_discipline_over_mixed_ops() {
        let buf = FrameRingBuffer::new(4, 4, 4);
        let mut next = 0u64;
        // enqueue 4, drop 2, enqueue 2, drop 3, enqueue 1
        for _ in 0..4 {
            buf.enqueue(&frame(next)).unwrap();
            next += 1;
        }
        buf.remove_oldest().unwrap();
        buf.remove_oldest().unwrap();
        for _ in 0..2 {
            buf.enqueue(&frame(next)).unwrap();
            next += 1;
        }
        for _ in 0..3 {
            buf.remove_oldest().unwrap();
        }
        buf.enqueue(&frame(next)).unwrap();

        let (head, tail) = (buf.head(), buf.tail());
        assert_eq!(buf.len() as u64, tail - head);
        assert!(buf.len() <= buf.capacity());
        assert!(buf.get(head.wrapping_sub(1)).is_none());
        assert!(buf.get(tail).is_none());
        for pos in head..tail {
            assert!(buf.get(pos).is_some());
        }
    }

    #[test]
    fn positional_lookups_agree() {
        let buf = FrameRingBuffer::new(3, 4, 4);
        for i in 0..3 {
            buf.enqueue(&frame(i)).unwrap();
        }
        buf.remove_oldest().unwrap();
        buf.enqueue(&frame(3)).unwrap();

        let oldest = buf.nth_from_head(0).unwrap();
        let newest = buf.nth_from_tail(0).unwrap();
        assert_eq!(oldest.read().unwrap().index, 1);
        assert_eq!(newest.read().unwrap().index, 3);
        assert!(buf.nth_from_head(3).is_none());
        assert!(buf.nth_from_tail(3).is_none());
    }

    #[test]
    fn clear_rewinds_indices() {
        let buf = FrameRingBuffer::new(2, 4, 4);
        buf.enqueue(&frame(0)).unwrap();
        buf.clear();
        assert_eq!(buf.len(), 0);
        assert_eq!(buf.head(), 0);
        assert_eq!(buf.tail(), 0);
        buf.enqueue(&frame(9)).unwrap();
        assert_eq!(buf.nth_from_tail(0).unwrap().read().unwrap().index, 9);
    }
}
