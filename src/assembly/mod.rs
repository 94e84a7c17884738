//! Frame assembly.
//!
//! The scan machine hands the assembler a sequence of normalized frames
//! together with an [`AssemblyContext`] describing their geometry. The
//! assembler estimates how the finger moved between frames and stitches
//! them into one [`Image`].

mod image;
mod overlap;

pub use image::Image;
pub use overlap::OverlapAssembler;

use crate::frame::{NormalizedFrame, HEIGHT, WIDTH};

/// Reads the pixel at column `x`, row `y` of a frame.
pub type PixelAccessor = fn(&AssemblyContext, &NormalizedFrame, usize, usize) -> u8;

/// Geometry handed to the assembler.
#[derive(Clone, Copy)]
pub struct AssemblyContext {
    /// Width of one input frame in pixels.
    pub frame_width: usize,
    /// Height of one input frame in pixels.
    pub frame_height: usize,
    /// Width of the assembled output image.
    pub image_width: usize,
    /// Pixel lookup used by the assembler.
    pub get_pixel: PixelAccessor,
}

impl AssemblyContext {
    /// Context for 53xd frames stitched into an image `image_width` wide.
    pub fn for_sensor(image_width: usize) -> Self {
        Self {
            frame_width: WIDTH,
            frame_height: HEIGHT,
            image_width,
            get_pixel: frame_pixel,
        }
    }

    /// Reads a frame pixel through [`AssemblyContext::get_pixel`].
    #[inline]
    pub fn pixel(&self, frame: &NormalizedFrame, x: usize, y: usize) -> u8 {
        (self.get_pixel)(self, frame, x, y)
    }
}

impl std::fmt::Debug for AssemblyContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssemblyContext")
            .field("frame_width", &self.frame_width)
            .field("frame_height", &self.frame_height)
            .field("image_width", &self.image_width)
            .finish_non_exhaustive()
    }
}

/// Row-major pixel lookup for 53xd frames.
pub fn frame_pixel(ctx: &AssemblyContext, frame: &NormalizedFrame, x: usize, y: usize) -> u8 {
    frame.pixels()[x + y * ctx.frame_width]
}

/// A frame plus its estimated offset from the previous frame.
#[derive(Debug, Clone)]
pub struct AssemblyFrame {
    /// The normalized frame.
    pub frame: NormalizedFrame,
    /// Horizontal offset from the previous frame.
    pub delta_x: i32,
    /// Vertical offset from the previous frame.
    pub delta_y: i32,
}

impl AssemblyFrame {
    /// Wraps a frame with zero offsets.
    pub fn new(frame: NormalizedFrame) -> Self {
        Self {
            frame,
            delta_x: 0,
            delta_y: 0,
        }
    }
}

/// Trait for frame stitching implementations.
pub trait Assembler {
    /// Fills in `delta_x`/`delta_y` of every frame after the first.
    fn estimate_movement(&self, ctx: &AssemblyContext, frames: &mut [AssemblyFrame]);

    /// Stitches the frames into one image using their deltas.
    fn assemble(&self, ctx: &AssemblyContext, frames: &[AssemblyFrame]) -> Image;
}
