//! Per-scan frame accumulation.

use super::{normalize, NormalizedFrame, RawFrame};

/// Ordered, append-only collection of the raw frames captured during one
/// scan. Drained once the frames have been assembled.
#[derive(Debug, Default)]
pub struct FrameStore {
    frames: Vec<RawFrame>,
    /// Frames ever pushed, for metrics.
    total_captured: u64,
}

impl FrameStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a decoded frame.
    pub fn push(&mut self, frame: RawFrame) {
        self.frames.push(frame);
        self.total_captured += 1;

        tracing::trace!(stored = self.frames.len(), "Frame stored");
    }

    /// Number of frames currently held.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the store holds no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Total frames ever pushed into this store.
    pub fn total_captured(&self) -> u64 {
        self.total_captured
    }

    /// Empties the store, normalizing every frame after the first `skip`.
    ///
    /// Raw frames are released as they are consumed; the store is empty
    /// afterwards whether or not any frames survived the skip.
    pub fn drain_normalized(&mut self, skip: usize) -> Vec<NormalizedFrame> {
        self.frames
            .drain(..)
            .skip(skip)
            .map(|raw| normalize(&raw))
            .collect()
    }

    /// Discards every held frame.
    pub fn clear(&mut self) {
        if !self.frames.is_empty() {
            tracing::debug!(discarded = self.frames.len(), "Frame store cleared");
        }
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::FRAME_SIZE;

    fn ramp(offset: u16) -> RawFrame {
        let mut pixels = Box::new([0u16; FRAME_SIZE]);
        for (i, p) in pixels.iter_mut().enumerate() {
            *p = offset + (i % 256) as u16;
        }
        RawFrame::from_pixels(pixels)
    }

    #[test]
    fn test_store_starts_empty() {
        let store = FrameStore::new();
        assert!(store.is_empty());
        assert_eq!(store.total_captured(), 0);
    }

    #[test]
    fn test_drain_skips_leading_frames() {
        let mut store = FrameStore::new();
        store.push(ramp(0));
        store.push(ramp(10));
        store.push(ramp(20));

        let frames = store.drain_normalized(1);
        assert_eq!(frames.len(), 2);
        assert!(store.is_empty());
        assert_eq!(store.total_captured(), 3);
    }

    #[test]
    fn test_drain_with_too_few_frames_still_empties() {
        let mut store = FrameStore::new();
        store.push(ramp(0));

        assert!(store.drain_normalized(1).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut store = FrameStore::new();
        store.push(ramp(0));
        store.clear();
        assert_eq!(store.len(), 0);
    }
}
