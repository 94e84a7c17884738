//! Block-matching assembler.
//!
//! Movement between consecutive frames is the shift that minimizes the
//! mean absolute difference over their overlap. Frames are then placed at
//! their accumulated offsets and averaged where they overlap.

use super::{Assembler, AssemblyContext, AssemblyFrame, Image};
use crate::frame::NormalizedFrame;

/// Value of image pixels no frame covers.
const BACKGROUND: u8 = 0xff;

/// Stitches frames by exhaustive search over a small shift window.
#[derive(Debug, Clone)]
pub struct OverlapAssembler {
    /// Largest shift tried in each direction, in pixels.
    max_shift: i32,
}

impl OverlapAssembler {
    /// Creates an assembler searching shifts up to 8 pixels.
    pub fn new() -> Self {
        Self { max_shift: 8 }
    }

    /// Creates an assembler searching shifts up to `max_shift` pixels.
    pub fn with_max_shift(max_shift: i32) -> Self {
        Self {
            max_shift: max_shift.max(0),
        }
    }

    /// Mean absolute difference between `prev` and `cur` shifted by (dx, dy),
    /// or `None` if they do not overlap.
    fn difference(
        ctx: &AssemblyContext,
        prev: &NormalizedFrame,
        cur: &NormalizedFrame,
        dx: i32,
        dy: i32,
    ) -> Option<u64> {
        let (w, h) = (ctx.frame_width as i32, ctx.frame_height as i32);
        let (x0, x1) = (dx.max(0), (w + dx).min(w));
        let (y0, y1) = (dy.max(0), (h + dy).min(h));
        if x0 >= x1 || y0 >= y1 {
            return None;
        }

        let mut total = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                let a = ctx.pixel(prev, x as usize, y as usize);
                let b = ctx.pixel(cur, (x - dx) as usize, (y - dy) as usize);
                total += u64::from(a.abs_diff(b));
            }
        }
        let area = ((x1 - x0) * (y1 - y0)) as u64;
        Some(total * 1024 / area)
    }
}

impl Default for OverlapAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Assembler for OverlapAssembler {
    fn estimate_movement(&self, ctx: &AssemblyContext, frames: &mut [AssemblyFrame]) {
        if let Some(first) = frames.first_mut() {
            first.delta_x = 0;
            first.delta_y = 0;
        }

        for i in 1..frames.len() {
            let (done, rest) = frames.split_at_mut(i);
            let prev = &done[i - 1].frame;
            let cur = &mut rest[0];

            let mut best: (u64, i32, i32) = (u64::MAX, 0, 0);
            for dy in -self.max_shift..=self.max_shift {
                for dx in -self.max_shift..=self.max_shift {
                    if let Some(score) = Self::difference(ctx, prev, &cur.frame, dx, dy) {
                        // Prefer the smaller shift on ties.
                        let closer = dx.abs() + dy.abs() < best.1.abs() + best.2.abs();
                        if score < best.0 || (score == best.0 && closer) {
                            best = (score, dx, dy);
                        }
                    }
                }
            }
            cur.delta_x = best.1;
            cur.delta_y = best.2;

            tracing::trace!(frame = i, dx = best.1, dy = best.2, "Movement estimated");
        }
    }

    fn assemble(&self, ctx: &AssemblyContext, frames: &[AssemblyFrame]) -> Image {
        let mut positions = Vec::with_capacity(frames.len());
        let (mut x, mut y) = (0i32, 0i32);
        for frame in frames {
            x += frame.delta_x;
            y += frame.delta_y;
            positions.push((x, y));
        }

        let min_x = positions.iter().map(|p| p.0).min().unwrap_or(0);
        let max_x = positions.iter().map(|p| p.0).max().unwrap_or(0);
        let min_y = positions.iter().map(|p| p.1).min().unwrap_or(0);
        let max_y = positions.iter().map(|p| p.1).max().unwrap_or(0);

        let width = ctx.image_width;
        let height = ctx.frame_height + (max_y - min_y) as usize;
        let span = ctx.frame_width as i32 + (max_x - min_x);
        let margin = ((width as i32 - span) / 2).max(0);

        let mut sum = vec![0u32; width * height];
        let mut count = vec![0u32; width * height];
        for (frame, &(px, py)) in frames.iter().zip(&positions) {
            let left = margin + px - min_x;
            let top = (py - min_y) as usize;
            for fy in 0..ctx.frame_height {
                for fx in 0..ctx.frame_width {
                    let ix = left + fx as i32;
                    if ix < 0 || ix >= width as i32 {
                        continue;
                    }
                    let idx = ix as usize + (top + fy) * width;
                    sum[idx] += u32::from(ctx.pixel(&frame.frame, fx, fy));
                    count[idx] += 1;
                }
            }
        }

        let pixels = sum
            .iter()
            .zip(&count)
            .map(|(&s, &n)| if n == 0 { BACKGROUND } else { (s / n) as u8 })
            .collect();

        Image::new(width, height, pixels)
    }
}
