//! Sensor frames: decoding, normalization and per-scan storage.
//!
//! The sensor delivers each capture as a packed buffer of 12-bit samples.
//! Frames move through this module in one direction:
//!
//! ```text
//! packed bytes → RawFrame (u16) → FrameStore → NormalizedFrame (u8)
//! ```

mod normalize;
mod raw;
mod store;

pub use normalize::{normalize, NormalizedFrame};
pub use raw::{decode_frame, FrameError, RawFrame};
pub use store::FrameStore;

/// Output frame width in pixels.
pub const WIDTH: usize = 64;
/// Output frame height in pixels.
pub const HEIGHT: usize = 80;
/// Width of one sensor scan line. Wider than [`WIDTH`] when the sensor
/// reports columns that are cropped away.
pub const SCAN_WIDTH: usize = 64;
/// Samples in one output frame.
pub const FRAME_SIZE: usize = WIDTH * HEIGHT;
/// Bytes in one packed frame: every 4 pixels occupy 6 bytes.
pub const RAW_FRAME_SIZE: usize = SCAN_WIDTH * HEIGHT / 4 * 6;
