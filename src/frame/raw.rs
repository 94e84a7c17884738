//! Packed 12-bit frame decoding.

use super::{FRAME_SIZE, HEIGHT, RAW_FRAME_SIZE, SCAN_WIDTH, WIDTH};
use thiserror::Error;

/// Errors raised while decoding sensor frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Fewer bytes than one packed frame.
    #[error("raw frame too short: got {got} bytes, need {need}")]
    Truncated {
        /// Bytes received.
        got: usize,
        /// Bytes one frame needs.
        need: usize,
    },
}

/// One decoded capture: [`WIDTH`] x [`HEIGHT`] samples of 12 significant bits.
#[derive(Clone, PartialEq, Eq)]
pub struct RawFrame {
    pixels: Box<[u16; FRAME_SIZE]>,
}

impl RawFrame {
    /// Wraps already-decoded samples.
    pub fn from_pixels(pixels: Box<[u16; FRAME_SIZE]>) -> Self {
        Self { pixels }
    }

    /// Returns the samples in row-major order.
    #[inline]
    pub fn pixels(&self) -> &[u16] {
        &self.pixels[..]
    }

    /// Returns the sample at column `x`, row `y`.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> u16 {
        self.pixels[x + y * WIDTH]
    }

    /// Smallest and largest sample in the frame.
    pub fn min_max(&self) -> (u16, u16) {
        self.pixels
            .iter()
            .fold((u16::MAX, 0), |(lo, hi), &p| (lo.min(p), hi.max(p)))
    }
}

impl std::fmt::Debug for RawFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (min, max) = self.min_max();
        f.debug_struct("RawFrame")
            .field("width", &WIDTH)
            .field("height", &HEIGHT)
            .field("min", &min)
            .field("max", &max)
            .finish()
    }
}

/// Unpacks one 6-byte chunk into 4 samples.
#[inline]
fn unpack_chunk(c: &[u8]) -> [u16; 4] {
    let c: [u16; 6] = [
        c[0] as u16,
        c[1] as u16,
        c[2] as u16,
        c[3] as u16,
        c[4] as u16,
        c[5] as u16,
    ];
    [
        ((c[0] & 0x0f) << 8) + c[1],
        (c[3] << 4) + (c[0] >> 4),
        ((c[5] & 0x0f) << 8) + c[2],
        (c[4] << 4) + (c[5] >> 4),
    ]
}

/// Decodes a packed sensor buffer into a frame.
///
/// Only the first [`RAW_FRAME_SIZE`] bytes are read; anything after them is
/// ignored. Samples are unpacked in scan-line order and then cropped row by
/// row to [`WIDTH`].
pub fn decode_frame(raw: &[u8]) -> Result<RawFrame, FrameError> {
    if raw.len() < RAW_FRAME_SIZE {
        return Err(FrameError::Truncated {
            got: raw.len(),
            need: RAW_FRAME_SIZE,
        });
    }

    let mut uncropped = vec![0u16; SCAN_WIDTH * HEIGHT];
    for (out, chunk) in uncropped
        .chunks_exact_mut(4)
        .zip(raw[..RAW_FRAME_SIZE].chunks_exact(6))
    {
        out.copy_from_slice(&unpack_chunk(chunk));
    }

    let mut pixels = Box::new([0u16; FRAME_SIZE]);
    for (row, line) in pixels
        .chunks_exact_mut(WIDTH)
        .zip(uncropped.chunks_exact(SCAN_WIDTH))
    {
        row.copy_from_slice(&line[..WIDTH]);
    }

    Ok(RawFrame { pixels })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_unpack_reference_chunk() {
        assert_eq!(
            unpack_chunk(&[0x0A, 0xBC, 0x00, 0x00, 0x00, 0x00]),
            [2748, 0, 0, 0]
        );
    }

    #[test]
    fn test_unpack_uses_every_nibble() {
        // p1 takes c3 as its high byte and the high nibble of c0,
        // p3 takes c4 and the high nibble of c5.
        assert_eq!(
            unpack_chunk(&[0x21, 0x43, 0x65, 0x87, 0xa9, 0xcb]),
            [0x143, 0x872, 0xb65, 0xa9c]
        );
    }

    #[test]
    fn test_decode_first_chunk_lands_in_first_row() {
        let mut raw = vec![0u8; RAW_FRAME_SIZE];
        raw[..6].copy_from_slice(&[0x0A, 0xBC, 0x00, 0x00, 0x00, 0x00]);

        let frame = decode_frame(&raw).unwrap();
        assert_eq!(&frame.pixels()[..4], &[2748, 0, 0, 0]);
        assert!(frame.pixels()[4..].iter().all(|&p| p == 0));
    }

    #[test]
    fn test_decode_rejects_short_buffer() {
        let raw = vec![0u8; RAW_FRAME_SIZE - 1];
        assert_eq!(
            decode_frame(&raw),
            Err(FrameError::Truncated {
                got: RAW_FRAME_SIZE - 1,
                need: RAW_FRAME_SIZE
            })
        );
    }

    #[test]
    fn test_decode_ignores_trailing_bytes() {
        let mut raw = vec![0x11u8; RAW_FRAME_SIZE];
        let exact = decode_frame(&raw).unwrap();
        raw.extend_from_slice(&[0xff; 13]);
        assert_eq!(decode_frame(&raw).unwrap(), exact);
    }

    #[test]
    fn test_row_access() {
        let mut raw = vec![0u8; RAW_FRAME_SIZE];
        // Second scan line starts at sample 64, i.e. chunk 16.
        let offset = (SCAN_WIDTH / 4) * 6;
        raw[offset] = 0x0f;
        raw[offset + 1] = 0xff;

        let frame = decode_frame(&raw).unwrap();
        assert_eq!(frame.get(0, 1), 0xfff);
        assert_eq!(frame.get(0, 0), 0);
    }

    proptest! {
        #[test]
        fn prop_decode_is_total(raw in proptest::collection::vec(any::<u8>(), RAW_FRAME_SIZE..RAW_FRAME_SIZE + 16)) {
            let frame = decode_frame(&raw).unwrap();
            prop_assert_eq!(frame.pixels().len(), FRAME_SIZE);
            prop_assert!(frame.pixels().iter().all(|&p| p <= 0x0fff));
        }

        #[test]
        fn prop_decode_is_deterministic(raw in proptest::collection::vec(any::<u8>(), RAW_FRAME_SIZE)) {
            prop_assert_eq!(decode_frame(&raw).unwrap(), decode_frame(&raw).unwrap());
        }
    }
}
