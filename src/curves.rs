//! Bezier segments: monotonic splitting, axis crossings and flattening.
//!
//! Segments are kept in `f64` device space while they are split and clipped,
//! then converted to window-local 24.8 fixed point and flattened by
//! recursive de Casteljau bisection:
//!
//! - a quadratic is flat when its control point lies within
//!   [`FLATNESS_TOLERANCE`] of the chord midpoint on both axes;
//! - a cubic is flat when all four second differences (x and y of
//!   `p0 - 2p1 + p2` and `p1 - 2p2 + p3`) are within the same tolerance.
//!
//! Recursion stops at [`MAX_FLATTEN_DEPTH`] regardless.

use crate::fixed::FixedPoint;

// ============================================================================
// Constants
// ============================================================================

/// Flatness tolerance in 24.8 units (0.125 px).
pub const FLATNESS_TOLERANCE: i32 = 32;
/// Hard cap on de Casteljau subdivision depth.
pub const MAX_FLATTEN_DEPTH: u32 = 16;
/// Parameters closer than this to 0 or 1 are not worth splitting at.
pub const PARAM_EPSILON: f64 = 1e-9;
/// Coefficients below this magnitude are treated as zero.
const COEFF_EPSILON: f64 = 1e-12;
/// Bisection steps for cubic axis crossings.
const CROSSING_STEPS: u32 = 32;
/// Bisection stops once the bracket is narrower than this.
const CROSSING_TOLERANCE: f64 = 1e-7;

pub type Point = [f64; 2];

#[inline]
fn lerp(a: Point, b: Point, t: f64) -> Point {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

// ============================================================================
// Roots
// ============================================================================

/// Up to four curve parameters, kept sorted.
#[derive(Debug, Clone, Copy, Default)]
pub struct Roots {
    values: [f64; 4],
    len: usize,
}

impl Roots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `t` if it lies strictly inside `(0, 1)`.
    pub fn push_interior(&mut self, t: f64) {
        if t.is_finite() && t > PARAM_EPSILON && t < 1.0 - PARAM_EPSILON && self.len < 4 {
            self.values[self.len] = t;
            self.len += 1;
        }
    }

    /// Sort and drop near-duplicates.
    pub fn sort_dedup(&mut self) {
        let values = &mut self.values[..self.len];
        values.sort_by(f64::total_cmp);
        let mut kept = 0;
        for i in 0..self.len {
            if kept == 0 || self.values[i] - self.values[kept - 1] > PARAM_EPSILON {
                self.values[kept] = self.values[i];
                kept += 1;
            }
        }
        self.len = kept;
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values[..self.len]
    }
}

/// Add the interior roots of `a t^2 + b t + c = 0` to `roots`.
///
/// Uses the cancellation-free form of the quadratic formula and falls back
/// to the linear solution when `a` vanishes.
pub fn solve_quadratic(a: f64, b: f64, c: f64, roots: &mut Roots) {
    if a.abs() < COEFF_EPSILON {
        if b.abs() >= COEFF_EPSILON {
            roots.push_interior(-c / b);
        }
        return;
    }
    let disc = b * b - 4.0 * a * c;
    if disc < 0.0 {
        return;
    }
    let s = disc.sqrt();
    let q = if b < 0.0 { -0.5 * (b - s) } else { -0.5 * (b + s) };
    roots.push_interior(q / a);
    if q != 0.0 {
        roots.push_interior(c / q);
    }
}

// ============================================================================
// CurveSegment
// ============================================================================

/// Operations the clipper needs from lines, quadratics and cubics.
pub trait CurveSegment: Copy {
    fn start(&self) -> Point;
    fn end(&self) -> Point;
    fn eval(&self, t: f64) -> Point;
    fn split(&self, t: f64) -> (Self, Self);

    /// Parameter at which a segment monotonic on `axis` reaches `v`.
    /// `v` must lie between the end point coordinates.
    fn crossing(&self, axis: usize, v: f64) -> f64;

    fn set_start(&mut self, axis: usize, v: f64);
    fn set_end(&mut self, axis: usize, v: f64);

    /// Whether `pred` holds for every control point, end points included.
    fn all_points<P: Fn(Point) -> bool>(&self, pred: P) -> bool;

    /// Flatten into 24.8 chords after mapping every control point.
    fn flatten<M, E>(&self, map: M, emit: &mut E)
    where
        M: Fn(Point) -> FixedPoint,
        E: FnMut(FixedPoint, FixedPoint);
}

/// Straight segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub p0: Point,
    pub p1: Point,
}

impl Line {
    pub fn new(p0: Point, p1: Point) -> Self {
        Self { p0, p1 }
    }
}

impl CurveSegment for Line {
    fn start(&self) -> Point {
        self.p0
    }

    fn end(&self) -> Point {
        self.p1
    }

    fn eval(&self, t: f64) -> Point {
        lerp(self.p0, self.p1, t)
    }

    fn split(&self, t: f64) -> (Self, Self) {
        let m = self.eval(t);
        (Line::new(self.p0, m), Line::new(m, self.p1))
    }

    fn crossing(&self, axis: usize, v: f64) -> f64 {
        let d = self.p1[axis] - self.p0[axis];
        if d == 0.0 {
            0.0
        } else {
            ((v - self.p0[axis]) / d).clamp(0.0, 1.0)
        }
    }

    fn set_start(&mut self, axis: usize, v: f64) {
        self.p0[axis] = v;
    }

    fn set_end(&mut self, axis: usize, v: f64) {
        self.p1[axis] = v;
    }

    fn all_points<P: Fn(Point) -> bool>(&self, pred: P) -> bool {
        pred(self.p0) && pred(self.p1)
    }

    fn flatten<M, E>(&self, map: M, emit: &mut E)
    where
        M: Fn(Point) -> FixedPoint,
        E: FnMut(FixedPoint, FixedPoint),
    {
        emit(map(self.p0), map(self.p1));
    }
}

// ============================================================================
// Quad
// ============================================================================

/// Quadratic Bezier segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
}

impl Quad {
    pub fn new(p0: Point, p1: Point, p2: Point) -> Self {
        Self { p0, p1, p2 }
    }

    /// Parameters of the axis extrema inside `(0, 1)`.
    pub fn extrema(&self) -> Roots {
        let mut roots = Roots::new();
        for axis in 0..2 {
            let (a0, a1, a2) = (self.p0[axis], self.p1[axis], self.p2[axis]);
            let denom = a0 - 2.0 * a1 + a2;
            if denom.abs() >= COEFF_EPSILON {
                roots.push_interior((a0 - a1) / denom);
            }
        }
        roots.sort_dedup();
        roots
    }

    /// Split into pieces monotonic in both x and y.
    pub fn monotonic_pieces<F: FnMut(Quad)>(&self, emit: &mut F) {
        split_at_params(*self, self.extrema().as_slice(), emit);
    }
}

impl CurveSegment for Quad {
    fn start(&self) -> Point {
        self.p0
    }

    fn end(&self) -> Point {
        self.p2
    }

    fn eval(&self, t: f64) -> Point {
        let a = lerp(self.p0, self.p1, t);
        let b = lerp(self.p1, self.p2, t);
        lerp(a, b, t)
    }

    fn split(&self, t: f64) -> (Self, Self) {
        let a = lerp(self.p0, self.p1, t);
        let b = lerp(self.p1, self.p2, t);
        let m = lerp(a, b, t);
        (Quad::new(self.p0, a, m), Quad::new(m, b, self.p2))
    }

    fn crossing(&self, axis: usize, v: f64) -> f64 {
        let (a0, a1, a2) = (self.p0[axis], self.p1[axis], self.p2[axis]);
        let mut roots = Roots::new();
        solve_quadratic(a0 - 2.0 * a1 + a2, 2.0 * (a1 - a0), a0 - v, &mut roots);
        match roots.as_slice().first() {
            Some(&t) => t,
            None => bisect_crossing(self, axis, v),
        }
    }

    fn set_start(&mut self, axis: usize, v: f64) {
        self.p0[axis] = v;
    }

    fn set_end(&mut self, axis: usize, v: f64) {
        self.p2[axis] = v;
    }

    fn all_points<P: Fn(Point) -> bool>(&self, pred: P) -> bool {
        pred(self.p0) && pred(self.p1) && pred(self.p2)
    }

    fn flatten<M, E>(&self, map: M, emit: &mut E)
    where
        M: Fn(Point) -> FixedPoint,
        E: FnMut(FixedPoint, FixedPoint),
    {
        flatten_quad(map(self.p0), map(self.p1), map(self.p2), 0, emit);
    }
}

// ============================================================================
// Cubic
// ============================================================================

/// Cubic Bezier segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cubic {
    pub p0: Point,
    pub p1: Point,
    pub p2: Point,
    pub p3: Point,
}

impl Cubic {
    pub fn new(p0: Point, p1: Point, p2: Point, p3: Point) -> Self {
        Self { p0, p1, p2, p3 }
    }

    /// Parameters of the axis extrema inside `(0, 1)`: the roots of the
    /// derivative on each axis.
    pub fn extrema(&self) -> Roots {
        let mut roots = Roots::new();
        for axis in 0..2 {
            let (a0, a1, a2, a3) = (self.p0[axis], self.p1[axis], self.p2[axis], self.p3[axis]);
            let a = -a0 + 3.0 * a1 - 3.0 * a2 + a3;
            let b = 2.0 * (a0 - 2.0 * a1 + a2);
            let c = a1 - a0;
            solve_quadratic(a, b, c, &mut roots);
        }
        roots.sort_dedup();
        roots
    }

    pub fn monotonic_pieces<F: FnMut(Cubic)>(&self, emit: &mut F) {
        split_at_params(*self, self.extrema().as_slice(), emit);
    }
}

impl CurveSegment for Cubic {
    fn start(&self) -> Point {
        self.p0
    }

    fn end(&self) -> Point {
        self.p3
    }

    fn eval(&self, t: f64) -> Point {
        let a = lerp(self.p0, self.p1, t);
        let b = lerp(self.p1, self.p2, t);
        let c = lerp(self.p2, self.p3, t);
        let ab = lerp(a, b, t);
        let bc = lerp(b, c, t);
        lerp(ab, bc, t)
    }

    fn split(&self, t: f64) -> (Self, Self) {
        let a = lerp(self.p0, self.p1, t);
        let b = lerp(self.p1, self.p2, t);
        let c = lerp(self.p2, self.p3, t);
        let ab = lerp(a, b, t);
        let bc = lerp(b, c, t);
        let m = lerp(ab, bc, t);
        (Cubic::new(self.p0, a, ab, m), Cubic::new(m, bc, c, self.p3))
    }

    fn crossing(&self, axis: usize, v: f64) -> f64 {
        bisect_crossing(self, axis, v)
    }

    fn set_start(&mut self, axis: usize, v: f64) {
        self.p0[axis] = v;
    }

    fn set_end(&mut self, axis: usize, v: f64) {
        self.p3[axis] = v;
    }

    fn all_points<P: Fn(Point) -> bool>(&self, pred: P) -> bool {
        pred(self.p0) && pred(self.p1) && pred(self.p2) && pred(self.p3)
    }

    fn flatten<M, E>(&self, map: M, emit: &mut E)
    where
        M: Fn(Point) -> FixedPoint,
        E: FnMut(FixedPoint, FixedPoint),
    {
        flatten_cubic(map(self.p0), map(self.p1), map(self.p2), map(self.p3), 0, emit);
    }
}

// ============================================================================
// Splitting helpers
// ============================================================================

/// Split `seg` at the sorted parameters `ts`, emitting every piece in order.
///
/// Pieces keep their exact control points. A cubic piece between two
/// extrema is monotonic even when its controls overshoot the end points.
pub fn split_at_params<S: CurveSegment, F: FnMut(S)>(seg: S, ts: &[f64], emit: &mut F) {
    let mut rest = seg;
    let mut prev = 0.0;
    for &t in ts {
        let local = (t - prev) / (1.0 - prev);
        let (head, tail) = rest.split(local);
        emit(head);
        rest = tail;
        prev = t;
    }
    emit(rest);
}

/// Binary search for the parameter where a monotonic segment reaches `v`.
fn bisect_crossing<S: CurveSegment>(seg: &S, axis: usize, v: f64) -> f64 {
    let increasing = seg.end()[axis] >= seg.start()[axis];
    let (mut lo, mut hi) = (0.0f64, 1.0f64);
    for _ in 0..CROSSING_STEPS {
        if hi - lo < CROSSING_TOLERANCE {
            break;
        }
        let mid = 0.5 * (lo + hi);
        if (seg.eval(mid)[axis] < v) == increasing {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

// ============================================================================
// Fixed-point flattening
// ============================================================================

/// Flatten a quadratic, emitting chords from `p0` to `p2`.
pub fn flatten_quad<E: FnMut(FixedPoint, FixedPoint)>(
    p0: FixedPoint,
    p1: FixedPoint,
    p2: FixedPoint,
    depth: u32,
    emit: &mut E,
) {
    let mid = p0.midpoint(p2);
    let flat = (p1.x - mid.x).abs() <= FLATNESS_TOLERANCE
        && (p1.y - mid.y).abs() <= FLATNESS_TOLERANCE;
    if flat || depth >= MAX_FLATTEN_DEPTH {
        emit(p0, p2);
        return;
    }
    let p01 = p0.midpoint(p1);
    let p12 = p1.midpoint(p2);
    let m = p01.midpoint(p12);
    flatten_quad(p0, p01, m, depth + 1, emit);
    flatten_quad(m, p12, p2, depth + 1, emit);
}

/// Flatten a cubic, emitting chords from `p0` to `p3`.
pub fn flatten_cubic<E: FnMut(FixedPoint, FixedPoint)>(
    p0: FixedPoint,
    p1: FixedPoint,
    p2: FixedPoint,
    p3: FixedPoint,
    depth: u32,
    emit: &mut E,
) {
    let flat = [
        p0.x - 2 * p1.x + p2.x,
        p0.y - 2 * p1.y + p2.y,
        p1.x - 2 * p2.x + p3.x,
        p1.y - 2 * p2.y + p3.y,
    ]
    .iter()
    .all(|d| d.abs() <= FLATNESS_TOLERANCE);
    if flat || depth >= MAX_FLATTEN_DEPTH {
        emit(p0, p3);
        return;
    }
    let p01 = p0.midpoint(p1);
    let p12 = p1.midpoint(p2);
    let p23 = p2.midpoint(p3);
    let p012 = p01.midpoint(p12);
    let p123 = p12.midpoint(p23);
    let m = p012.midpoint(p123);
    flatten_cubic(p0, p01, p012, m, depth + 1, emit);
    flatten_cubic(m, p123, p23, p3, depth + 1, emit);
}

// ============================================================================
// Tests
// ============================================================================
