//! Per-tile-row coverage accumulation.
//!
//! A [`CoverageAccumulator`] receives the row-local line segments of one
//! geometry in one tile row and accumulates, for every pixel cell they
//! touch, a signed `cover` and `area`:
//!
//! ```text
//!   cover += y0 - y1
//!   area  += (y0 - y1) * (2 * 256 - fx0 - fx1)
//! ```
//!
//! where `fx0, fx1` are the sub-pixel x positions where the edge enters and
//! leaves the cell. Touched cells are marked in one bit vector per
//! scanline; the first touch of a cell assigns, later touches add, so the
//! cell storage never needs clearing. The compositor drains the marks.
//!
//! Each scanline holds `width + 1` cells: the extra column absorbs edges
//! lying exactly on the window's right border.

use crate::basics::{SUBPIXEL_MASK, SUBPIXEL_SCALE, SUBPIXEL_SHIFT, TILE_HEIGHT};
use crate::tile_lines::LineSegment;

const TILE_LINES: usize = TILE_HEIGHT as usize;

/// Coverage cells of one tile row, borrowed from task scratch memory.
pub struct CoverageAccumulator<'a> {
    width: usize,
    stride: usize,
    words: usize,
    bits: &'a mut [u64],
    cover: &'a mut [i32],
    area: &'a mut [i32],
}

impl<'a> CoverageAccumulator<'a> {
    /// Bit words per scanline for a window `width` pixels wide.
    #[inline]
    pub fn words_per_line(width: usize) -> usize {
        (width + 1).div_ceil(64)
    }

    /// Bit words needed for a whole tile row.
    #[inline]
    pub fn bit_len(width: usize) -> usize {
        Self::words_per_line(width) * TILE_LINES
    }

    /// Cell values needed for a whole tile row (cover and area halves).
    #[inline]
    pub fn cell_len(width: usize) -> usize {
        2 * (width + 1) * TILE_LINES
    }

    /// Wrap scratch buffers. `bits` must be all zero; `cells` may hold
    /// anything.
    pub fn new(width: usize, bits: &'a mut [u64], cells: &'a mut [i32]) -> Self {
        let stride = width + 1;
        let words = Self::words_per_line(width);
        debug_assert!(bits.len() >= words * TILE_LINES);
        debug_assert!(cells.len() >= 2 * stride * TILE_LINES);
        debug_assert!(bits[..words * TILE_LINES].iter().all(|&w| w == 0));
        let (cover, rest) = cells.split_at_mut(stride * TILE_LINES);
        Self {
            width,
            stride,
            words,
            bits: &mut bits[..words * TILE_LINES],
            cover,
            area: &mut rest[..stride * TILE_LINES],
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    fn add_cell(&mut self, x: i32, y: i32, delta: i32, fx_sum: i32) {
        if delta == 0 {
            return;
        }
        debug_assert!((0..TILE_HEIGHT).contains(&y));
        debug_assert!(x >= 0 && (x as usize) < self.stride);
        let (x, y) = (x as usize, y as usize);
        let cover = -delta;
        let area = delta * (fx_sum - 2 * SUBPIXEL_SCALE);
        let word = y * self.words + (x >> 6);
        let bit = 1u64 << (x & 63);
        let idx = y * self.stride + x;
        if self.bits[word] & bit == 0 {
            self.bits[word] |= bit;
            self.cover[idx] = cover;
            self.area[idx] = area;
        } else {
            self.cover[idx] += cover;
            self.area[idx] += area;
        }
    }

    /// Walk an edge within scanline `ey` from `(x1, fy1)` to `(x2, fy2)`,
    /// `fy` being the sub-pixel y inside the scanline.
    fn render_hline(&mut self, ey: i32, x1: i32, fy1: i32, x2: i32, fy2: i32) {
        if fy1 == fy2 {
            return;
        }
        let ex1 = x1 >> SUBPIXEL_SHIFT;
        let ex2 = x2 >> SUBPIXEL_SHIFT;
        let fx1 = x1 & SUBPIXEL_MASK;
        let fx2 = x2 & SUBPIXEL_MASK;

        if ex1 == ex2 {
            self.add_cell(ex1, ey, fy2 - fy1, fx1 + fx2);
            return;
        }

        // Run of adjacent cells on the same scanline.
        let dy = (fy2 - fy1) as i64;
        let mut dx = x2 as i64 - x1 as i64;
        let (mut p, first, incr) = if dx < 0 {
            dx = -dx;
            (fx1 as i64 * dy, 0, -1)
        } else {
            ((SUBPIXEL_SCALE - fx1) as i64 * dy, SUBPIXEL_SCALE, 1)
        };

        let mut delta = p.div_euclid(dx) as i32;
        let mut modulo = p.rem_euclid(dx);
        self.add_cell(ex1, ey, delta, fx1 + first);

        let mut ex = ex1 + incr;
        let mut y = fy1 + delta;
        if ex != ex2 {
            p = SUBPIXEL_SCALE as i64 * dy;
            let lift = p.div_euclid(dx) as i32;
            let rem = p.rem_euclid(dx);
            modulo -= dx;
            while ex != ex2 {
                delta = lift;
                modulo += rem;
                if modulo >= 0 {
                    modulo -= dx;
                    delta += 1;
                }
                self.add_cell(ex, ey, delta, SUBPIXEL_SCALE);
                y += delta;
                ex += incr;
            }
        }
        self.add_cell(ex2, ey, fy2 - y, fx2 + SUBPIXEL_SCALE - first);
    }

    /// Accumulate one row-local line segment.
    pub fn add_line(&mut self, line: &LineSegment) {
        let LineSegment { x0: x1, y0: y1, x1: x2, y1: y2 } = *line;
        if y1 == y2 {
            return;
        }
        let ey1 = y1 >> SUBPIXEL_SHIFT;
        let ey2 = y2 >> SUBPIXEL_SHIFT;
        let fy1 = y1 & SUBPIXEL_MASK;
        let fy2 = y2 & SUBPIXEL_MASK;

        if ey1 == ey2 {
            self.render_hline(ey1, x1, fy1, x2, fy2);
            return;
        }

        let dx = x2 as i64 - x1 as i64;
        let dy = y2 as i64 - y1 as i64;
        let (first, incr) = if dy < 0 { (0, -1) } else { (SUBPIXEL_SCALE, 1) };

        if dx == 0 {
            let ex = x1 >> SUBPIXEL_SHIFT;
            let two_fx = (x1 - (ex << SUBPIXEL_SHIFT)) << 1;
            let mut ey = ey1;
            self.add_cell(ex, ey, first - fy1, two_fx);
            ey += incr;
            let full = first + first - SUBPIXEL_SCALE;
            while ey != ey2 {
                self.add_cell(ex, ey, full, two_fx);
                ey += incr;
            }
            self.add_cell(ex, ey, fy2 - SUBPIXEL_SCALE + first, two_fx);
            return;
        }

        // Several scanlines.
        let dy_abs = dy.abs();
        let p = if dy < 0 {
            fy1 as i64 * dx
        } else {
            (SUBPIXEL_SCALE - fy1) as i64 * dx
        };
        let mut delta = p.div_euclid(dy_abs) as i32;
        let mut modulo = p.rem_euclid(dy_abs);

        let mut x_from = x1 + delta;
        self.render_hline(ey1, x1, fy1, x_from, first);
        let mut ey = ey1 + incr;

        if ey != ey2 {
            let p = SUBPIXEL_SCALE as i64 * dx;
            let lift = p.div_euclid(dy_abs) as i32;
            let rem = p.rem_euclid(dy_abs);
            modulo -= dy_abs;
            while ey != ey2 {
                delta = lift;
                modulo += rem;
                if modulo >= 0 {
                    modulo -= dy_abs;
                    delta += 1;
                }
                let x_to = x_from + delta;
                self.render_hline(ey, x_from, SUBPIXEL_SCALE - first, x_to, first);
                x_from = x_to;
                ey += incr;
            }
        }
        self.render_hline(ey, x_from, SUBPIXEL_SCALE - first, x2, fy2);
    }

    /// Visit the marked cells of scanline `y` in increasing x, clearing
    /// their marks. Only bit words overlapping `[x_begin, x_end)` are
    /// scanned; callers pass a range covering every cell they touched.
    pub fn drain_scanline<F>(&mut self, y: usize, x_begin: usize, x_end: usize, mut visit: F)
    where
        F: FnMut(usize, i32, i32),
    {
        let x_end = x_end.min(self.stride);
        if x_begin >= x_end {
            return;
        }
        let row_words = y * self.words;
        let row_cells = y * self.stride;
        for w in (x_begin >> 6)..=((x_end - 1) >> 6) {
            let mut word = core::mem::take(&mut self.bits[row_words + w]);
            while word != 0 {
                let x = (w << 6) + word.trailing_zeros() as usize;
                word &= word - 1;
                visit(x, self.cover[row_cells + x], self.area[row_cells + x]);
            }
        }
    }

    /// Whether any mark is still set.
    pub fn is_clear(&self) -> bool {
        self.bits.iter().all(|&w| w == 0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Scratch {
        bits: Vec<u64>,
        cells: Vec<i32>,
    }

    impl Scratch {
        fn new(width: usize) -> Self {
            Self {
                bits: vec![0; CoverageAccumulator::bit_len(width)],
                cells: vec![12345; CoverageAccumulator::cell_len(width)],
            }
        }
    }

    /// (x, cover, area) triples of scanline `y`.
    fn drain(acc: &mut CoverageAccumulator<'_>, y: usize) -> Vec<(usize, i32, i32)> {
        let mut out = Vec::new();
        let end = acc.width() + 1;
        acc.drain_scanline(y, 0, end, |x, c, a| out.push((x, c, a)));
        out
    }

    #[test]
    fn test_sizes() {
        assert_eq!(CoverageAccumulator::words_per_line(16), 1);
        assert_eq!(CoverageAccumulator::words_per_line(63), 1);
        assert_eq!(CoverageAccumulator::words_per_line(64), 2);
        assert_eq!(CoverageAccumulator::cell_len(16), 2 * 17 * 16);
    }

    #[test]
    fn test_vertical_edge_full_pixel() {
        let mut s = Scratch::new(16);
        let mut acc = CoverageAccumulator::new(16, &mut s.bits, &mut s.cells);
        // Downward edge at x = 3.0 covering scanline 2 entirely.
        acc.add_line(&LineSegment::new(3 * 256, 2 * 256, 3 * 256, 3 * 256));
        assert_eq!(drain(&mut acc, 2), vec![(3, -256, -256 * 512)]);
        assert!(drain(&mut acc, 1).is_empty());
        assert!(acc.is_clear());
    }

    #[test]
    fn test_half_pixel_edge() {
        let mut s = Scratch::new(16);
        let mut acc = CoverageAccumulator::new(16, &mut s.bits, &mut s.cells);
        // Upward edge at x = 5.5.
        acc.add_line(&LineSegment::new(5 * 256 + 128, 256, 5 * 256 + 128, 0));
        let cells = drain(&mut acc, 0);
        assert_eq!(cells, vec![(5, 256, 256 * (512 - 256))]);
    }

    #[test]
    fn test_accumulates_repeat_visits() {
        let mut s = Scratch::new(16);
        let mut acc = CoverageAccumulator::new(16, &mut s.bits, &mut s.cells);
        let line = LineSegment::new(256, 0, 256, 256);
        acc.add_line(&line);
        acc.add_line(&line);
        assert_eq!(drain(&mut acc, 0), vec![(1, -512, -512 * 512)]);
    }

    #[test]
    fn test_cover_sums_per_scanline() {
        let mut s = Scratch::new(32);
        let mut acc = CoverageAccumulator::new(32, &mut s.bits, &mut s.cells);
        // Diagonal edge across several pixels and scanlines.
        acc.add_line(&LineSegment::new(10, 30, 7000, 3000));
        let mut total = 0;
        for y in 0..16 {
            let cells = drain(&mut acc, y);
            let cover: i32 = cells.iter().map(|c| c.1).sum();
            let lo = (y as i32 * 256).max(30);
            let hi = ((y as i32 + 1) * 256).min(3000);
            let expected = if hi > lo { -(hi - lo) } else { 0 };
            assert_eq!(cover, expected, "scanline {y}");
            total += cover;
        }
        assert_eq!(total, -(3000 - 30));
        assert!(acc.is_clear());
    }

    #[test]
    fn test_bottom_edge_untouched() {
        let mut s = Scratch::new(16);
        let mut acc = CoverageAccumulator::new(16, &mut s.bits, &mut s.cells);
        acc.add_line(&LineSegment::new(0, 0, 4096, 4096));
        acc.add_line(&LineSegment::new(100, 4096, 300, 3000));
        for y in 0..16 {
            drain(&mut acc, y);
        }
        assert!(acc.is_clear());
    }

    #[test]
    fn test_right_border_uses_sentinel_column() {
        let mut s = Scratch::new(16);
        let mut acc = CoverageAccumulator::new(16, &mut s.bits, &mut s.cells);
        acc.add_line(&LineSegment::new(16 * 256, 0, 16 * 256, 256));
        assert_eq!(drain(&mut acc, 0), vec![(16, -256, -256 * 512)]);
    }

    #[test]
    fn test_drain_range_skips_other_words() {
        let mut s = Scratch::new(200);
        let mut acc = CoverageAccumulator::new(200, &mut s.bits, &mut s.cells);
        acc.add_line(&LineSegment::new(150 * 256, 0, 150 * 256, 256));
        let mut seen = Vec::new();
        acc.drain_scanline(0, 0, 64, |x, _, _| seen.push(x));
        assert!(seen.is_empty());
        acc.drain_scanline(0, 128, 192, |x, _, _| seen.push(x));
        assert_eq!(seen, vec![150]);
    }
}
