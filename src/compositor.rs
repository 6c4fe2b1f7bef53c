//! Span compositing.
//!
//! Converts accumulated coverage into alpha under a fill rule and blends a
//! constant premultiplied color onto the destination with source-over:
//!
//! ```text
//!   c'  = apply_alpha(color, alpha)
//!   dst = c' + dst * (255 - c'.a) / 255
//! ```
//!
//! Blending goes through a [`SpanKernel`]. [`ScalarKernel`] is the reference;
//! [`PackedKernel`] processes all four channels of a pixel at once in 16-bit
//! lanes of a `u64` and must stay byte-identical to it.

use core::ops::Range;

use crate::basics::{FillRule, TILE_HEIGHT};
use crate::color::Rgba8;
use crate::coverage::CoverageAccumulator;

// ============================================================================
// Alpha
// ============================================================================

pub const AA_SHIFT: u32 = 8;
pub const AA_SCALE: i64 = 1 << AA_SHIFT;
pub const AA_MASK: i64 = AA_SCALE - 1;
pub const AA_SCALE2: i64 = AA_SCALE * 2;
pub const AA_MASK2: i64 = AA_SCALE2 - 1;

/// Shift taking `cover * 512 + area` to 8-bit alpha.
const AREA_SHIFT: u32 = 9;

/// Alpha for an accumulated `cover * 512 + area` value.
///
/// The magnitude is taken before shifting so both winding directions round
/// the same way.
#[inline]
pub fn coverage_alpha(value: i64, fill_rule: FillRule) -> u8 {
    let mut cover = value.abs() >> AREA_SHIFT;
    if fill_rule == FillRule::EvenOdd {
        cover &= AA_MASK2;
        if cover > AA_SCALE {
            cover = AA_SCALE2 - cover;
        }
    }
    cover.min(AA_MASK) as u8
}

// ============================================================================
// Kernels
// ============================================================================

/// Source-over blending of a constant color across a run of RGBA8 pixels.
pub trait SpanKernel: Sync {
    /// Blend `color` scaled by `alpha` onto every pixel of `dst`
    /// (4 bytes per pixel, premultiplied RGBA).
    fn blend_span(&self, dst: &mut [u8], color: Rgba8, alpha: u8);
}

/// Per-channel reference implementation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScalarKernel;

impl SpanKernel for ScalarKernel {
    fn blend_span(&self, dst: &mut [u8], color: Rgba8, alpha: u8) {
        let src = color.apply_alpha(alpha);
        if src.is_transparent() {
            return;
        }
        for px in dst.chunks_exact_mut(4) {
            let d = Rgba8::from_bytes([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&src.over(d).to_bytes());
        }
    }
}

const LANE_LO: u64 = 0x00FF_00FF_00FF_00FF;
const LANE_ONE: u64 = 0x0001_0001_0001_0001;
const LANE_HALF: u64 = 0x0080_0080_0080_0080;

#[inline]
fn unpack_lanes(p: [u8; 4]) -> u64 {
    p[0] as u64 | (p[1] as u64) << 16 | (p[2] as u64) << 32 | (p[3] as u64) << 48
}

#[inline]
fn pack_lanes(v: u64) -> [u8; 4] {
    [v as u8, (v >> 16) as u8, (v >> 32) as u8, (v >> 48) as u8]
}

/// Lane-wise `round(v * s / 255)` for lanes and `s` in `0..=255`.
#[inline]
fn multiply_lanes(v: u64, s: u8) -> u64 {
    let t = v * s as u64 + LANE_HALF;
    ((((t >> 8) & LANE_LO) + t) >> 8) & LANE_LO
}

/// Lane-wise saturating add for lanes in `0..=255`.
#[inline]
fn saturating_add_lanes(a: u64, b: u64) -> u64 {
    let sum = a + b;
    let overflow = (sum >> 8) & LANE_ONE;
    (sum | overflow * 0xFF) & LANE_LO
}

/// SWAR implementation: one pixel per `u64`, one channel per 16-bit lane.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackedKernel;

impl SpanKernel for PackedKernel {
    fn blend_span(&self, dst: &mut [u8], color: Rgba8, alpha: u8) {
        let src = if alpha == u8::MAX {
            unpack_lanes(color.to_bytes())
        } else {
            multiply_lanes(unpack_lanes(color.to_bytes()), alpha)
        };
        if src == 0 {
            return;
        }
        let inv = u8::MAX - (src >> 48) as u8;
        for px in dst.chunks_exact_mut(4) {
            let d = unpack_lanes([px[0], px[1], px[2], px[3]]);
            px.copy_from_slice(&pack_lanes(saturating_add_lanes(src, multiply_lanes(d, inv))));
        }
    }
}

/// Composite one run, taking the opaque fast path when possible.
#[inline]
pub fn composite_span<K: SpanKernel + ?Sized>(kernel: &K, dst: &mut [u8], color: Rgba8, alpha: u8) {
    if alpha == 0 {
        return;
    }
    if alpha == u8::MAX && color.is_opaque() {
        let bytes = color.to_bytes();
        for px in dst.chunks_exact_mut(4) {
            px.copy_from_slice(&bytes);
        }
        return;
    }
    kernel.blend_span(dst, color, alpha);
}

// ============================================================================
// Row compositing
// ============================================================================

/// Destination pixels of one tile row, seen from one geometry's window.
pub struct RowTarget<'a> {
    pixels: &'a mut [u8],
    stride: usize,
    x_offset: usize,
    width: usize,
    lines: usize,
}

impl<'a> RowTarget<'a> {
    /// `pixels` starts at the first byte of the tile row's top scanline.
    /// `x_offset` is the window's left edge and `width` the number of
    /// window pixels inside the image; `lines` is the number of the row's
    /// scanlines inside the image.
    pub fn new(pixels: &'a mut [u8], stride: usize, x_offset: usize, width: usize, lines: usize) -> Self {
        debug_assert!(lines <= TILE_HEIGHT as usize);
        Self {
            pixels,
            stride,
            x_offset,
            width,
            lines,
        }
    }

    #[inline]
    fn scanline(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.stride + self.x_offset * 4;
        &mut self.pixels[start..start + self.width * 4]
    }
}

#[inline]
fn fill_run<K: SpanKernel + ?Sized>(
    kernel: &K,
    row: &mut [u8],
    start: usize,
    end: usize,
    color: Rgba8,
    alpha: u8,
) {
    let end = end.min(row.len() / 4);
    if start < end {
        composite_span(kernel, &mut row[start * 4..end * 4], color, alpha);
    }
}

/// Composite one geometry's coverage for one tile row.
///
/// Every scanline starts from its start cover, walks the marked cells left
/// to right, fills the gaps between them with the running cover and extends
/// any residual cover to the right edge. All marks in `cells` are cleared,
/// including those on scanlines outside the image.
pub fn composite_row<K: SpanKernel + ?Sized>(
    kernel: &K,
    coverage: &mut CoverageAccumulator<'_>,
    start_cover: &[i32],
    cells: Range<usize>,
    target: &mut RowTarget<'_>,
    color: Rgba8,
    fill_rule: FillRule,
) {
    for y in 0..TILE_HEIGHT as usize {
        let row: &mut [u8] = if y < target.lines {
            target.scanline(y)
        } else {
            &mut []
        };
        let mut cover = start_cover[y] as i64;
        let mut cursor = 0usize;
        coverage.drain_scanline(y, cells.start, cells.end, |x, cell_cover, area| {
            if x > cursor && cover != 0 {
                let alpha = coverage_alpha(cover << AREA_SHIFT, fill_rule);
                fill_run(kernel, row, cursor, x, color, alpha);
            }
            let alpha = coverage_alpha((cover << AREA_SHIFT) + area as i64, fill_rule);
            fill_run(kernel, row, x, x + 1, color, alpha);
            cover += cell_cover as i64;
            cursor = x + 1;
        });
        if cover != 0 {
            let alpha = coverage_alpha(cover << AREA_SHIFT, fill_rule);
            fill_run(kernel, row, cursor, usize::MAX, color, alpha);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile_lines::LineSegment;

    const FULL: i64 = 256 * 512;

    #[test]
    fn test_alpha_nonzero() {
        assert_eq!(coverage_alpha(FULL, FillRule::NonZero), 255);
        assert_eq!(coverage_alpha(-FULL, FillRule::NonZero), 255);
        assert_eq!(coverage_alpha(2 * FULL, FillRule::NonZero), 255);
        assert_eq!(coverage_alpha(FULL / 2, FillRule::NonZero), 128);
        assert_eq!(coverage_alpha(-FULL / 2, FillRule::NonZero), 128);
        assert_eq!(coverage_alpha(0, FillRule::NonZero), 0);
    }

    #[test]
    fn test_alpha_even_odd() {
        assert_eq!(coverage_alpha(FULL, FillRule::EvenOdd), 255);
        assert_eq!(coverage_alpha(2 * FULL, FillRule::EvenOdd), 0);
        assert_eq!(coverage_alpha(3 * FULL / 2, FillRule::EvenOdd), 128);
        assert_eq!(coverage_alpha(-3 * FULL, FillRule::EvenOdd), 255);
    }

    #[test]
    fn test_rules_agree_up_to_full() {
        for v in (0..=FULL).step_by(97) {
            assert_eq!(
                coverage_alpha(v, FillRule::NonZero),
                coverage_alpha(v, FillRule::EvenOdd)
            );
        }
    }

    #[test]
    fn test_multiply_lanes_exact() {
        for v in 0..=255u8 {
            for s in 0..=255u8 {
                let lanes = unpack_lanes([v, 255 - v, v / 2, 255]);
                let got = pack_lanes(multiply_lanes(lanes, s));
                let expected = [
                    Rgba8::multiply(v, s),
                    Rgba8::multiply(255 - v, s),
                    Rgba8::multiply(v / 2, s),
                    Rgba8::multiply(255, s),
                ];
                assert_eq!(got, expected);
            }
        }
    }

    #[test]
    fn test_packed_matches_scalar() {
        let dsts: Vec<[u8; 4]> = vec![
            [0, 0, 0, 0],
            [255, 255, 255, 255],
            [10, 200, 30, 220],
            [128, 0, 255, 255],
            [1, 2, 3, 4],
            [90, 90, 90, 90],
        ];
        for a in (0..=255u32).step_by(15) {
            for r in (0..=a).step_by(17) {
                for g in [0, a / 3, a] {
                    let color = Rgba8::new(r as u8, g as u8, (a - r) as u8, a as u8);
                    for alpha in (0..=255u32).step_by(5) {
                        let mut scalar: Vec<u8> = dsts.iter().flatten().copied().collect();
                        let mut packed = scalar.clone();
                        ScalarKernel.blend_span(&mut scalar, color, alpha as u8);
                        PackedKernel.blend_span(&mut packed, color, alpha as u8);
                        assert_eq!(scalar, packed, "color {color:?} alpha {alpha}");
                    }
                }
            }
        }
    }

    #[test]
    fn test_saturating_lanes() {
        // Malformed (non-premultiplied) input saturates instead of wrapping.
        let color = Rgba8::new(255, 255, 255, 10);
        let mut scalar = vec![250u8; 8];
        let mut packed = scalar.clone();
        ScalarKernel.blend_span(&mut scalar, color, 255);
        PackedKernel.blend_span(&mut packed, color, 255);
        assert_eq!(scalar, packed);
        assert_eq!(scalar[0], 255);
    }

    #[test]
    fn test_opaque_fast_path() {
        let mut dst = vec![7u8; 12];
        composite_span(&ScalarKernel, &mut dst, Rgba8::new(1, 2, 3, 255), 255);
        assert_eq!(dst, vec![1, 2, 3, 255, 1, 2, 3, 255, 1, 2, 3, 255]);
        composite_span(&ScalarKernel, &mut dst, Rgba8::new(9, 9, 9, 255), 0);
        assert_eq!(&dst[..4], &[1, 2, 3, 255]);
    }

    fn composite_lines(lines: &[LineSegment], start_cover: &[i32; 16], width: usize) -> Vec<u8> {
        let mut bits = vec![0u64; CoverageAccumulator::bit_len(width)];
        let mut cells = vec![0i32; CoverageAccumulator::cell_len(width)];
        let mut acc = CoverageAccumulator::new(width, &mut bits, &mut cells);
        for l in lines {
            acc.add_line(l);
        }
        let stride = width * 4;
        let mut pixels = vec![0u8; stride * 16];
        let mut target = RowTarget::new(&mut pixels, stride, 0, width, 16);
        composite_row(
            &PackedKernel,
            &mut acc,
            start_cover,
            0..width + 1,
            &mut target,
            Rgba8::new(255, 0, 0, 255),
            FillRule::NonZero,
        );
        assert!(acc.is_clear());
        pixels
    }

    fn alpha_at(pixels: &[u8], width: usize, x: usize, y: usize) -> u8 {
        pixels[(y * width + x) * 4 + 3]
    }

    #[test]
    fn test_composite_square() {
        // Square [2, 6) x [0, 16), clockwise.
        let lines = [
            LineSegment::new(6 * 256, 0, 6 * 256, 4096),
            LineSegment::new(2 * 256, 4096, 2 * 256, 0),
        ];
        let px = composite_lines(&lines, &[0; 16], 16);
        for y in 0..16 {
            for x in 0..16 {
                let expected = if (2..6).contains(&x) { 255 } else { 0 };
                assert_eq!(alpha_at(&px, 16, x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_composite_half_pixel_edges() {
        let lines = [
            LineSegment::new(4 * 256 + 128, 0, 4 * 256 + 128, 4096),
            LineSegment::new(1 * 256 + 128, 4096, 1 * 256 + 128, 0),
        ];
        let px = composite_lines(&lines, &[0; 16], 16);
        assert_eq!(alpha_at(&px, 16, 0, 3), 0);
        assert_eq!(alpha_at(&px, 16, 1, 3), 128);
        assert_eq!(alpha_at(&px, 16, 2, 3), 255);
        assert_eq!(alpha_at(&px, 16, 4, 3), 128);
        assert_eq!(alpha_at(&px, 16, 5, 3), 0);
    }

    #[test]
    fn test_residual_cover_fills_right() {
        // A lone downward edge leaves cover open to the right.
        let lines = [LineSegment::new(10 * 256, 0, 10 * 256, 4096)];
        let px = composite_lines(&lines, &[0; 16], 16);
        assert_eq!(alpha_at(&px, 16, 9, 0), 0);
        assert_eq!(alpha_at(&px, 16, 10, 0), 255);
        assert_eq!(alpha_at(&px, 16, 15, 15), 255);
    }

    #[test]
    fn test_start_cover_leading_run() {
        // Content left of the window, closed by an edge at x = 5.
        let lines = [LineSegment::new(5 * 256, 0, 5 * 256, 4096)];
        let px = composite_lines(&lines, &[256; 16], 16);
        assert_eq!(alpha_at(&px, 16, 0, 7), 255);
        assert_eq!(alpha_at(&px, 16, 4, 7), 255);
        assert_eq!(alpha_at(&px, 16, 5, 7), 0);
    }

    #[test]
    fn test_invisible_scanlines_still_drained() {
        let width = 16;
        let mut bits = vec![0u64; CoverageAccumulator::bit_len(width)];
        let mut cells = vec![0i32; CoverageAccumulator::cell_len(width)];
        let mut acc = CoverageAccumulator::new(width, &mut bits, &mut cells);
        acc.add_line(&LineSegment::new(256, 0, 256, 4096));
        let stride = width * 4;
        let mut pixels = vec![0u8; stride * 4];
        let mut target = RowTarget::new(&mut pixels, stride, 0, width, 4);
        composite_row(
            &ScalarKernel,
            &mut acc,
            &[0; 16],
            0..width + 1,
            &mut target,
            Rgba8::new(0, 0, 255, 255),
            FillRule::NonZero,
        );
        assert!(acc.is_clear());
        assert_eq!(pixels[(3 * width + 1) * 4 + 2], 255);
    }
}
