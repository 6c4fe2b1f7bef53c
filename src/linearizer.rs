//! Geometry linearization.
//!
//! Turns one [`Geometry`] into per-tile-row line segments stored in a
//! worker's [`FrameArena`]:
//!
//! 1. Points are transformed by `geometry.transform` followed by the global
//!    matrix, using the kernel matching the combined matrix's complexity.
//! 2. The window is the tile-aligned cover of the transformed bounding box
//!    clipped to the destination.
//! 3. Contained geometry (bounding box inside the destination) is converted
//!    straight to window-local 24.8 and flattened. Uncontained geometry is
//!    first split into monotonic pieces and clipped against the destination:
//!    pieces above, below or right of it are dropped, pieces left of it turn
//!    into start cover.
//! 4. Every chord is bisected until short enough, then walked across tile
//!    rows and tile columns with an exact integer DDA and appended to the
//!    row it falls in.

use crate::arena::{Span, TaskArena};
use crate::basics::{
    IntRect, TileBounds, SUBPIXEL_SCALE, SUBPIXEL_SHIFT, TILE_HEIGHT, TILE_HEIGHT_FIXED,
    TILE_HEIGHT_FIXED_SHIFT, TILE_HEIGHT_SHIFT, TILE_WIDTH, TILE_WIDTH_FIXED_SHIFT,
};
use crate::curves::{Cubic, CurveSegment, Line, Point, Quad, MAX_FLATTEN_DEPTH};
use crate::fixed::FixedPoint;
use crate::geometry::{Geometry, PathTag};
use crate::matrix::Matrix;
use crate::tile_lines::{FrameArena, LineEncoding, LineSegment, RowLines};

/// Chords longer than this on either axis, in 24.8 units, are bisected
/// before bucketing.
pub const MAX_SEGMENT_EXTENT: i32 = 2048 << SUBPIXEL_SHIFT;

const AXIS_X: usize = 0;
const AXIS_Y: usize = 1;

// ============================================================================
// Output
// ============================================================================

/// Result of linearizing one geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearizedGeometry {
    /// Window in destination tile coordinates.
    pub window: TileBounds,
    pub encoding: LineEncoding,
    /// One entry per window tile row, in the frame arena.
    pub rows: Span<RowLines>,
    /// Whether the geometry went through the clipping path.
    pub clipped: bool,
}

// ============================================================================
// Path walking
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum PathSegment {
    Line(Line),
    Quad(Quad),
    Cubic(Cubic),
}

impl PathSegment {
    fn from_tag(tag: PathTag, from: Point, pts: &[Point]) -> Option<Self> {
        match tag {
            PathTag::Line => Some(PathSegment::Line(Line::new(from, pts[0]))),
            PathTag::Quadratic => Some(PathSegment::Quad(Quad::new(from, pts[0], pts[1]))),
            PathTag::Cubic => Some(PathSegment::Cubic(Cubic::new(from, pts[0], pts[1], pts[2]))),
            PathTag::Move | PathTag::Close => None,
        }
    }
}

/// Device-space point to window-local 24.8, clamped to the window.
#[derive(Debug, Clone, Copy)]
struct FixedMapper {
    origin_x: f64,
    origin_y: f64,
    max_x: i32,
    max_y: i32,
}

impl FixedMapper {
    #[inline]
    fn map(&self, p: Point) -> FixedPoint {
        FixedPoint::from_f64(p[0], p[1], self.origin_x, self.origin_y)
            .clamped(self.max_x, self.max_y)
    }

    /// Whether `p` maps inside the window without clamping.
    #[inline]
    fn contains(&self, p: Point) -> bool {
        let f = FixedPoint::from_f64(p[0], p[1], self.origin_x, self.origin_y);
        (0..=self.max_x).contains(&f.x) && (0..=self.max_y).contains(&f.y)
    }
}

/// Clip box in device pixels.
#[derive(Debug, Clone, Copy)]
struct ClipBox {
    left: f64,
    top: f64,
    right: f64,
    bottom: f64,
}

// ============================================================================
// Linearizer
// ============================================================================

/// Linearizes one geometry into a frame arena. Single use, single thread.
pub struct Linearizer<'a> {
    frame: &'a mut FrameArena,
    rows: Span<RowLines>,
    encoding: LineEncoding,
    columns: i32,
    mapper: FixedMapper,
    clip: ClipBox,
}

impl<'a> Linearizer<'a> {
    /// Linearize `geometry` for the `destination` pixel box.
    ///
    /// Returns `None` when the geometry cannot cover any destination pixel.
    /// `task` only provides scratch memory; clearing it is up to the caller.
    pub fn linearize(
        geometry: &Geometry,
        matrix: &Matrix,
        destination: &IntRect,
        frame: &'a mut FrameArena,
        task: &mut TaskArena,
    ) -> Option<LinearizedGeometry> {
        if geometry.points.len() < 2 {
            return None;
        }
        let combined = geometry.transform.then(matrix);
        let span = task.points.alloc(geometry.points.len(), [0.0; 2]);
        let bbox = combined.transform_points(&geometry.points, task.points.get_mut(span));
        if !(bbox.x1 < bbox.x2 && bbox.y1 < bbox.y2) {
            return None;
        }
        let clip = IntRect::enclosing(&bbox).intersect(destination);
        let window = TileBounds::covering(&clip)?;
        let contained = bbox.x1 >= destination.x1 as f64
            && bbox.y1 >= destination.y1 as f64
            && bbox.x2 <= destination.x2 as f64
            && bbox.y2 <= destination.y2 as f64;

        let pixel_left = window.pixel_left();
        let pixel_top = window.pixel_top();
        let pixel_right = pixel_left + window.columns * TILE_WIDTH;
        let pixel_bottom = pixel_top + window.rows * TILE_HEIGHT;
        let encoding = LineEncoding::for_width(window.columns * TILE_WIDTH);
        let rows = frame.alloc_rows(window.rows as usize);

        let mut linearizer = Linearizer {
            frame,
            rows,
            encoding,
            columns: window.columns,
            mapper: FixedMapper {
                origin_x: pixel_left as f64,
                origin_y: pixel_top as f64,
                max_x: window.columns * TILE_WIDTH * SUBPIXEL_SCALE,
                max_y: window.rows * TILE_HEIGHT_FIXED,
            },
            clip: ClipBox {
                left: pixel_left.max(destination.x1) as f64,
                top: pixel_top.max(destination.y1) as f64,
                right: pixel_right.min(destination.x2) as f64,
                bottom: pixel_bottom.min(destination.y2) as f64,
            },
        };
        let points = task.points.get(span);
        if contained {
            linearizer.walk_path(&geometry.tags, points, Self::contained_segment);
        } else {
            linearizer.walk_path(&geometry.tags, points, Self::uncontained_segment);
        }

        tracing::trace!(
            contained,
            ?encoding,
            columns = window.columns,
            rows = window.rows,
            "linearized geometry"
        );
        Some(LinearizedGeometry {
            window,
            encoding,
            rows,
            clipped: !contained,
        })
    }

    /// Feed every segment of the path to `handle`, closing each contour.
    fn walk_path<F>(&mut self, tags: &[PathTag], points: &[Point], mut handle: F)
    where
        F: FnMut(&mut Self, PathSegment),
    {
        let mut cursor = 0usize;
        let mut start: Option<Point> = None;
        let mut current: Option<Point> = None;
        for &tag in tags {
            let n = tag.point_count();
            let Some(pts) = points.get(cursor..cursor + n) else {
                break;
            };
            cursor += n;
            match tag {
                PathTag::Move => {
                    Self::close_contour(self, &mut handle, start, current);
                    start = Some(pts[0]);
                    current = start;
                }
                PathTag::Close => {
                    Self::close_contour(self, &mut handle, start, current);
                    current = start;
                }
                _ => match current.and_then(|from| PathSegment::from_tag(tag, from, pts)) {
                    Some(segment) => {
                        handle(self, segment);
                        current = Some(pts[n - 1]);
                    }
                    None => {
                        start = Some(pts[n - 1]);
                        current = start;
                    }
                },
            }
        }
        Self::close_contour(self, &mut handle, start, current);
    }

    fn close_contour<F>(&mut self, handle: &mut F, start: Option<Point>, current: Option<Point>)
    where
        F: FnMut(&mut Self, PathSegment),
    {
        if let (Some(s), Some(c)) = (start, current) {
            if s != c {
                handle(self, PathSegment::Line(Line::new(c, s)));
            }
        }
    }

    // ------------------------------------------------------------------------
    // Contained path
    // ------------------------------------------------------------------------

    fn contained_segment(&mut self, segment: PathSegment) {
        let mapper = self.mapper;
        let map = move |p: Point| mapper.map(p);
        let mut emit = |a: FixedPoint, b: FixedPoint| self.bucket_line(a, b);
        match segment {
            PathSegment::Line(l) => l.flatten(map, &mut emit),
            PathSegment::Quad(q) => q.flatten(map, &mut emit),
            PathSegment::Cubic(c) => c.flatten(map, &mut emit),
        }
    }

    // ------------------------------------------------------------------------
    // Uncontained path
    // ------------------------------------------------------------------------

    fn uncontained_segment(&mut self, segment: PathSegment) {
        match segment {
            PathSegment::Line(l) => self.clip_monotonic(l),
            PathSegment::Quad(q) => q.monotonic_pieces(&mut |piece| self.clip_monotonic(piece)),
            PathSegment::Cubic(c) => c.monotonic_pieces(&mut |piece| self.clip_monotonic(piece)),
        }
    }

    /// Split a monotonic segment at its clip box crossings and route each
    /// piece.
    fn clip_monotonic<S: CurveSegment>(&mut self, segment: S) {
        let clip = self.clip;
        let (s, e) = (segment.start(), segment.end());
        let (min_x, max_x) = (s[0].min(e[0]), s[0].max(e[0]));
        let (min_y, max_y) = (s[1].min(e[1]), s[1].max(e[1]));
        if max_y <= clip.top || min_y >= clip.bottom || min_x >= clip.right {
            return;
        }
        if min_x >= clip.left && max_x <= clip.right && min_y >= clip.top && max_y <= clip.bottom
        {
            self.emit_inside(&segment);
            return;
        }

        let mut cuts = [(0.0f64, 0usize, 0.0f64); 4];
        let mut count = 0;
        for (axis, v) in [
            (AXIS_X, clip.left),
            (AXIS_X, clip.right),
            (AXIS_Y, clip.top),
            (AXIS_Y, clip.bottom),
        ] {
            let (a, b) = (s[axis], e[axis]);
            if (a < v && v < b) || (b < v && v < a) {
                cuts[count] = (segment.crossing(axis, v), axis, v);
                count += 1;
            }
        }
        let cuts = &mut cuts[..count];
        cuts.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut rest = segment;
        let mut prev = 0.0;
        for &(t, axis, v) in cuts.iter() {
            let local = ((t - prev) / (1.0 - prev)).clamp(0.0, 1.0);
            let (mut head, mut tail) = rest.split(local);
            head.set_end(axis, v);
            tail.set_start(axis, v);
            self.route_piece(head);
            rest = tail;
            prev = t;
        }
        self.route_piece(rest);
    }

    /// Classify a clipped piece by its midpoint.
    fn route_piece<S: CurveSegment>(&mut self, piece: S) {
        let clip = self.clip;
        let mid = piece.eval(0.5);
        if mid[1] < clip.top || mid[1] > clip.bottom || mid[0] > clip.right {
            return;
        }
        if mid[0] < clip.left {
            let y0 = self.mapper.map(piece.start()).y;
            let y1 = self.mapper.map(piece.end()).y;
            self.add_left_cover(y0, y1);
            return;
        }
        self.emit_inside(&piece);
    }

    fn emit_inside<S: CurveSegment>(&mut self, piece: &S) {
        self.emit_within_window(*piece, 0);
    }

    /// Flatten a piece whose curve lies inside the window. Control points
    /// outside the window would be distorted by the mapper's clamp, so such
    /// pieces are bisected until their control polygon fits.
    fn emit_within_window<S: CurveSegment>(&mut self, piece: S, depth: u32) {
        let mapper = self.mapper;
        if depth < MAX_FLATTEN_DEPTH && !piece.all_points(|p| mapper.contains(p)) {
            let (head, tail) = piece.split(0.5);
            self.emit_within_window(head, depth + 1);
            self.emit_within_window(tail, depth + 1);
            return;
        }
        piece.flatten(move |p| mapper.map(p), &mut |a, b| self.bucket_line(a, b));
    }

    /// Record content left of the window as start cover, scanline by
    /// scanline, for window-local 24.8 y values.
    fn add_left_cover(&mut self, y0: i32, y1: i32) {
        let (lo, hi, sign) = if y0 < y1 { (y0, y1, -1) } else { (y1, y0, 1) };
        let mut y = lo;
        while y < hi {
            let line = y >> SUBPIXEL_SHIFT;
            let next = ((line + 1) << SUBPIXEL_SHIFT).min(hi);
            self.frame.add_start_cover(
                self.rows,
                (line >> TILE_HEIGHT_SHIFT) as usize,
                (line & (TILE_HEIGHT - 1)) as usize,
                sign * (next - y),
            );
            y = next;
        }
    }

    // ------------------------------------------------------------------------
    // Bucketing
    // ------------------------------------------------------------------------

    /// Append a window-local chord to the rows and columns it crosses.
    fn bucket_line(&mut self, a: FixedPoint, b: FixedPoint) {
        if a.y == b.y {
            return;
        }
        if (b.x - a.x).abs() > MAX_SEGMENT_EXTENT || (b.y - a.y).abs() > MAX_SEGMENT_EXTENT {
            let m = a.midpoint(b);
            self.bucket_line(a, m);
            self.bucket_line(m, b);
            return;
        }

        let frame = &mut *self.frame;
        let rows = self.rows;
        let encoding = self.encoding;
        let last_column = self.columns - 1;
        split_axis(
            a.y,
            a.x,
            b.y,
            b.x,
            TILE_HEIGHT_FIXED_SHIFT,
            &mut |row, ya, xa, yb, xb| {
                if ya == yb {
                    return;
                }
                let base = row << TILE_HEIGHT_FIXED_SHIFT;
                let (ya, yb) = (ya - base, yb - base);
                if xa == xb {
                    let column = (xa >> TILE_WIDTH_FIXED_SHIFT).clamp(0, last_column);
                    let line = LineSegment::new(xa, ya, xb, yb);
                    frame.push_line(rows, row as usize, column as u16, encoding, line);
                    return;
                }
                split_axis(
                    xa,
                    ya,
                    xb,
                    yb,
                    TILE_WIDTH_FIXED_SHIFT,
                    &mut |column, x0, y0, x1, y1| {
                        if y0 == y1 {
                            return;
                        }
                        let column = column.clamp(0, last_column);
                        let line = LineSegment::new(x0, y0, x1, y1);
                        frame.push_line(rows, row as usize, column as u16, encoding, line);
                    },
                );
            },
        );
    }
}

// ============================================================================
// DDA
// ============================================================================

/// Exact running value of `floor((d0 + k * step) * db / da)` for k = 0, 1, ..
/// using one division up front and a carried remainder per step.
struct DdaStepper {
    value: i64,
    modulo: i64,
    lift: i64,
    rem: i64,
    den: i64,
}

impl DdaStepper {
    fn new(first: i64, step: i64, den: i64) -> Self {
        debug_assert!(den > 0);
        Self {
            value: first.div_euclid(den),
            modulo: first.rem_euclid(den),
            lift: step.div_euclid(den),
            rem: step.rem_euclid(den),
            den,
        }
    }

    #[inline]
    fn advance(&mut self) {
        self.value += self.lift;
        self.modulo += self.rem;
        if self.modulo >= self.den {
            self.modulo -= self.den;
            self.value += 1;
        }
    }
}

/// Split the segment `(a0, b0) -> (a1, b1)` at every multiple of
/// `1 << shift` on the `a` axis.
///
/// `emit(cell, a_start, b_start, a_end, b_end)` receives the pieces in walk
/// order. A range `[lo, hi]` on the `a` axis touches cells
/// `lo >> shift ..= (hi - 1) >> shift`, so a coordinate lying exactly on a
/// boundary belongs to the cell whose far edge it is. A zero-length range
/// touches the single cell `a0 >> shift`.
pub fn split_axis<F>(a0: i32, b0: i32, a1: i32, b1: i32, shift: i32, emit: &mut F)
where
    F: FnMut(i32, i32, i32, i32, i32),
{
    if a0 == a1 {
        emit(a0 >> shift, a0, b0, a1, b1);
        return;
    }
    let ascending = a0 < a1;
    let (first, last) = if ascending {
        (a0 >> shift, (a1 - 1) >> shift)
    } else {
        ((a0 - 1) >> shift, a1 >> shift)
    };
    if first == last {
        emit(first, a0, b0, a1, b1);
        return;
    }

    let step: i32 = if ascending { 1 } else { -1 };
    // Boundary leaving the first cell, in walk direction.
    let boundary_of = |cell: i32| if ascending { (cell + 1) << shift } else { cell << shift };

    let (mut pa, mut pb) = (a0, b0);
    let mut cell = first;
    if b0 == b1 {
        while cell != last {
            let ba = boundary_of(cell);
            emit(cell, pa, pb, ba, b0);
            pa = ba;
            cell += step;
        }
        emit(last, pa, pb, a1, b1);
        return;
    }

    let da = (a1 as i64 - a0 as i64).abs();
    let db = b1 as i64 - b0 as i64;
    let first_distance = (boundary_of(first) as i64 - a0 as i64).abs();
    let mut dda = DdaStepper::new(first_distance * db, (1i64 << shift) * db, da);
    while cell != last {
        let ba = boundary_of(cell);
        let bb = (b0 as i64 + dda.value) as i32;
        emit(cell, pa, pb, ba, bb);
        dda.advance();
        pa = ba;
        pb = bb;
        cell += step;
    }
    emit(last, pa, pb, a1, b1);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::basics::FillRule;
    use crate::color::Rgba8;

    fn pieces(a0: i32, b0: i32, a1: i32, b1: i32, shift: i32) -> Vec<(i32, i32, i32, i32, i32)> {
        let mut out = Vec::new();
        split_axis(a0, b0, a1, b1, shift, &mut |c, pa, pb, qa, qb| out.push((c, pa, pb, qa, qb)));
        out
    }

    fn dest(w: i32, h: i32) -> IntRect {
        IntRect::new(0, 0, w, h)
    }

    fn run(geometry: &Geometry, destination: &IntRect) -> (FrameArena, Option<LinearizedGeometry>) {
        let mut frame = FrameArena::new();
        let mut task = TaskArena::new();
        let out = Linearizer::linearize(geometry, &Matrix::IDENTITY, destination, &mut frame, &mut task);
        (frame, out)
    }

    fn row_lines(frame: &FrameArena, lin: &LinearizedGeometry, row: usize) -> Vec<LineSegment> {
        let rows = frame.rows(lin.rows);
        frame.lines(lin.encoding, &rows[row]).collect()
    }

    #[test]
    fn test_split_axis_single_cell() {
        assert_eq!(pieces(0, 5, 4096, 9, 12), vec![(0, 0, 5, 4096, 9)]);
        assert_eq!(pieces(8192, 5, 4096, 9, 12), vec![(1, 8192, 5, 4096, 9)]);
        assert_eq!(pieces(4096, 1, 4096, 3, 12), vec![(1, 4096, 1, 4096, 3)]);
    }

    #[test]
    fn test_split_axis_exact_crossing() {
        // Slope 1: the crossing of a = 4096 happens at b = 4096 - 100 + 0.
        let p = pieces(100, 0, 5000, 4900, 12);
        assert_eq!(p, vec![(0, 100, 0, 4096, 3996), (1, 4096, 3996, 5000, 4900)]);
        let back = pieces(5000, 4900, 100, 0, 12);
        assert_eq!(back, vec![(1, 5000, 4900, 4096, 3996), (0, 4096, 3996, 100, 0)]);
    }

    #[test]
    fn test_split_axis_vertical_many_cells() {
        let p = pieces(0, 77, 3 * 4096 + 10, 77, 12);
        assert_eq!(p.len(), 4);
        assert!(p.iter().all(|x| x.2 == 77 && x.4 == 77));
        assert_eq!(p[3], (3, 3 * 4096, 77, 3 * 4096 + 10, 77));
    }

    #[test]
    fn test_split_axis_no_drift() {
        // Long shallow segment; every crossing must equal the exact floor.
        let (a0, b0, a1, b1) = (3, -1000, 40 * 4096 + 17, 12345);
        let p = pieces(a0, b0, a1, b1, 12);
        for piece in &p[..p.len() - 1] {
            let exact = b0 as i64
                + ((piece.3 - a0) as i64 * (b1 - b0) as i64).div_euclid((a1 - a0) as i64);
            assert_eq!(piece.4 as i64, exact);
        }
        for w in p.windows(2) {
            assert_eq!((w[0].3, w[0].4), (w[1].1, w[1].2));
        }
    }

    #[test]
    fn test_contained_rect_rows() {
        let g = Geometry::rect(2.0, 2.0, 30.0, 20.0, Rgba8::new(255, 0, 0, 255));
        let (frame, lin) = run(&g, &dest(64, 64));
        let lin = lin.unwrap();
        assert!(!lin.clipped);
        assert_eq!(lin.window, TileBounds { x: 0, y: 0, columns: 2, rows: 2 });
        assert_eq!(lin.encoding, LineEncoding::Narrow);
        for row in 0..2 {
            let lines = row_lines(&frame, &lin, row);
            assert_eq!(lines.len(), 2, "row {row}");
            let net: i32 = lines.iter().map(|l| l.y0 - l.y1).sum();
            assert_eq!(net, 0);
            for l in &lines {
                assert!((0..=TILE_HEIGHT_FIXED).contains(&l.y0));
                assert!((0..=TILE_HEIGHT_FIXED).contains(&l.y1));
            }
        }
        let rows = frame.rows(lin.rows);
        assert_eq!((rows[0].first_column, rows[0].last_column), (0, 1));
    }

    #[test]
    fn test_outside_destination_is_dropped() {
        let g = Geometry::rect(100.0, 100.0, 120.0, 120.0, Rgba8::new(0, 0, 0, 255));
        let (_, lin) = run(&g, &dest(64, 64));
        assert!(lin.is_none());
    }

    #[test]
    fn test_degenerate_is_dropped() {
        let g = Geometry::rect(10.0, 10.0, 10.0, 40.0, Rgba8::new(0, 0, 0, 255));
        let (_, lin) = run(&g, &dest(64, 64));
        assert!(lin.is_none());
    }

    #[test]
    fn test_left_content_becomes_start_cover() {
        let g = Geometry::rect(-10.0, 0.0, 10.0, 16.0, Rgba8::new(0, 0, 0, 255));
        let (frame, lin) = run(&g, &dest(32, 32));
        let lin = lin.unwrap();
        assert!(lin.clipped);
        let row = frame.rows(lin.rows)[0];
        // The left edge runs upwards: +256 per scanline.
        assert_eq!(frame.start_cover(&row), &[256; 16]);
        let lines = row_lines(&frame, &lin, 0);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], LineSegment::new(10 * 256, 0, 10 * 256, 4096));
    }

    #[test]
    fn test_right_and_below_content_dropped() {
        let g = Geometry::rect(8.0, 8.0, 100.0, 100.0, Rgba8::new(0, 0, 0, 255));
        let (frame, lin) = run(&g, &dest(20, 20));
        let lin = lin.unwrap();
        assert_eq!(lin.window, TileBounds { x: 0, y: 0, columns: 2, rows: 2 });
        let mut total = 0;
        for row in 0..2 {
            for l in row_lines(&frame, &lin, row) {
                // Only the left edge at x = 8 survives.
                assert_eq!(l.x0, 8 * 256);
                assert_eq!(l.x1, 8 * 256);
                total += l.y1 - l.y0;
            }
        }
        // Upward left edge from y = 20 to y = 8.
        assert_eq!(total, -12 * 256);
    }

    #[test]
    fn test_wide_encoding_for_large_window() {
        let g = Geometry::rect(0.0, 0.0, 300.0, 10.0, Rgba8::new(0, 0, 0, 255));
        let (_, lin) = run(&g, &dest(400, 400));
        assert_eq!(lin.unwrap().encoding, LineEncoding::Wide);
    }

    #[test]
    fn test_long_segment_bisected() {
        let g = Geometry::rect(1.0, 1.0, 3.0, 3000.0, Rgba8::new(0, 0, 0, 255));
        let (frame, lin) = run(&g, &dest(16, 4096));
        let lin = lin.unwrap();
        let mut net = 0;
        for row in 0..lin.window.rows as usize {
            for l in row_lines(&frame, &lin, row) {
                net += l.y0 - l.y1;
            }
        }
        assert_eq!(net, 0);
    }

    #[test]
    fn test_closed_curves_balance_per_row() {
        let k = 0.552_284_749_8 * 40.0;
        let (cx, cy) = (50.0, 50.0);
        let tags = vec![
            PathTag::Move,
            PathTag::Cubic,
            PathTag::Cubic,
            PathTag::Cubic,
            PathTag::Cubic,
            PathTag::Close,
        ];
        let points = vec![
            [cx + 40.0, cy],
            [cx + 40.0, cy + k],
            [cx + k, cy + 40.0],
            [cx, cy + 40.0],
            [cx - k, cy + 40.0],
            [cx - 40.0, cy + k],
            [cx - 40.0, cy],
            [cx - 40.0, cy - k],
            [cx - k, cy - 40.0],
            [cx, cy - 40.0],
            [cx + k, cy - 40.0],
            [cx + 40.0, cy - k],
            [cx + 40.0, cy],
        ];
        let g = Geometry::with_computed_bounds(
            tags,
            points,
            Matrix::IDENTITY,
            Rgba8::new(0, 0, 0, 255),
            FillRule::NonZero,
        )
        .unwrap();
        for d in [dest(100, 100), dest(70, 70)] {
            let (frame, lin) = run(&g, &d);
            let lin = lin.unwrap();
            for row in 0..lin.window.rows as usize {
                let rows = frame.rows(lin.rows);
                let start: i32 = frame.start_cover(&rows[row]).iter().sum();
                let net: i32 = row_lines(&frame, &lin, row).iter().map(|l| l.y0 - l.y1).sum();
                if !lin.clipped {
                    assert_eq!(start + net, 0, "row {row}");
                }
            }
        }
    }
}
