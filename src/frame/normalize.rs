//! Linear squashing of 12-bit samples into 8-bit intensities.

use super::{RawFrame, FRAME_SIZE, WIDTH};

/// A frame rescaled to the 0-255 range, ready for assembly.
#[derive(Clone, PartialEq, Eq)]
pub struct NormalizedFrame {
    pixels: Box<[u8; FRAME_SIZE]>,
}

impl NormalizedFrame {
    /// Wraps already-normalized samples.
    pub fn from_pixels(pixels: Box<[u8; FRAME_SIZE]>) -> Self {
        Self { pixels }
    }

    /// Returns the samples in row-major order.
    #[inline]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels[..]
    }

    /// Returns the intensity at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.pixels[x + y * WIDTH]
    }
}

impl std::fmt::Debug for NormalizedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mean = self.pixels.iter().map(|&p| p as u64).sum::<u64>() / FRAME_SIZE as u64;
        f.debug_struct("NormalizedFrame")
            .field("mean", &mean)
            .finish_non_exhaustive()
    }
}

/// Rescales a frame by its own minimum and maximum.
///
/// Each sample maps to `(s - min) * 255 / (max - min)` with integer
/// truncation, so the maximum lands on 255. A sample equal to the minimum,
/// and every sample of a uniform frame, maps to 0.
pub fn normalize(frame: &RawFrame) -> NormalizedFrame {
    let (min, max) = frame.min_max();
    let span = u32::from(max) - u32::from(min);

    let mut pixels = Box::new([0u8; FRAME_SIZE]);
    for (out, &pix) in pixels.iter_mut().zip(frame.pixels()) {
        let offset = u32::from(pix) - u32::from(min);
        *out = if offset == 0 || span == 0 {
            0
        } else {
            (offset * 0xff / span) as u8
        };
    }

    NormalizedFrame { pixels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn frame_from(f: impl Fn(usize) -> u16) -> RawFrame {
        let mut pixels = Box::new([0u16; FRAME_SIZE]);
        for (i, p) in pixels.iter_mut().enumerate() {
            *p = f(i);
        }
        RawFrame::from_pixels(pixels)
    }

    #[test]
    fn test_uniform_frame_is_black() {
        let out = normalize(&frame_from(|_| 1234));
        assert!(out.pixels().iter().all(|&p| p == 0));
    }

    #[test]
    fn test_extremes_map_to_full_range() {
        let out = normalize(&frame_from(|i| if i % 2 == 0 { 100 } else { 4095 }));
        assert_eq!(out.pixels()[0], 0);
        assert_eq!(out.pixels()[1], 255);
    }

    #[test]
    fn test_midpoint_truncates() {
        // (50 * 255) / 100 = 127.5, truncated to 127
        let out = normalize(&frame_from(|i| match i {
            0 => 0,
            1 => 100,
            _ => 50,
        }));
        assert_eq!(out.get(2, 0), 127);
    }

    proptest! {
        #[test]
        fn prop_max_maps_to_255(
            samples in proptest::collection::vec(0u16..0x1000, FRAME_SIZE)
        ) {
            let frame = frame_from(|i| samples[i]);
            let (min, max) = frame.min_max();
            let out = normalize(&frame);

            for (&raw, &norm) in frame.pixels().iter().zip(out.pixels()) {
                if raw == min {
                    prop_assert_eq!(norm, 0);
                }
                if raw == max && max != min {
                    prop_assert_eq!(norm, 255);
                }
            }
        }

        #[test]
        fn prop_uniform_is_zero(value in any::<u16>()) {
            let out = normalize(&frame_from(|_| value));
            prop_assert!(out.pixels().iter().all(|&p| p == 0));
        }
    }
}
