//! Affine transformation matrix.
//!
//! 2D affine transforms with a cheap complexity classification used to pick
//! a specialised point-transform kernel.

use crate::basics::{IntRect, Rect};

/// Epsilon for affine matrix comparisons.
pub const AFFINE_EPSILON: f64 = 1e-14;

#[inline]
fn is_equal_eps(a: f64, b: f64) -> bool {
    (a - b).abs() <= AFFINE_EPSILON
}

/// Structural class of a matrix, from cheapest to most general.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixComplexity {
    Identity,
    TranslationOnly,
    ScaleOnly,
    TranslationScale,
    Complex,
}

/// 2D affine transformation matrix.
///
/// Stores six components `[sx, shy, shx, sy, tx, ty]`:
///
/// ```text
///   | sx  shx tx |
///   | shy  sy ty |
///   |  0    0  1 |
/// ```
///
/// Transform: `x' = x*sx + y*shx + tx`, `y' = x*shy + y*sy + ty`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub sx: f64,
    pub shy: f64,
    pub shx: f64,
    pub sy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        sx: 1.0,
        shy: 0.0,
        shx: 0.0,
        sy: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    /// Identity matrix.
    pub fn new() -> Self {
        Self::IDENTITY
    }

    /// Custom matrix from six components.
    pub fn new_custom(sx: f64, shy: f64, shx: f64, sy: f64, tx: f64, ty: f64) -> Self {
        Self {
            sx,
            shy,
            shx,
            sy,
            tx,
            ty,
        }
    }

    pub fn new_translation(x: f64, y: f64) -> Self {
        Self::new_custom(1.0, 0.0, 0.0, 1.0, x, y)
    }

    pub fn new_scaling(x: f64, y: f64) -> Self {
        Self::new_custom(x, 0.0, 0.0, y, 0.0, 0.0)
    }

    /// Rotation by `a` radians.
    pub fn new_rotation(a: f64) -> Self {
        let (sa, ca) = a.sin_cos();
        Self::new_custom(ca, sa, -sa, ca, 0.0, 0.0)
    }

    /// Post-multiply: `self = self * m` (apply `self`, then `m`).
    pub fn multiply(&mut self, m: &Matrix) -> &mut Self {
        let t0 = self.sx * m.sx + self.shy * m.shx;
        let t2 = self.shx * m.sx + self.sy * m.shx;
        let t4 = self.tx * m.sx + self.ty * m.shx + m.tx;
        self.shy = self.sx * m.shy + self.shy * m.sy;
        self.sy = self.shx * m.shy + self.sy * m.sy;
        self.ty = self.tx * m.shy + self.ty * m.sy + m.ty;
        self.sx = t0;
        self.shx = t2;
        self.tx = t4;
        self
    }

    /// `self` followed by `m`, as a new matrix.
    pub fn then(&self, m: &Matrix) -> Matrix {
        let mut r = *self;
        r.multiply(m);
        r
    }

    /// Classify against the identity under [`AFFINE_EPSILON`].
    pub fn determine_complexity(&self) -> MatrixComplexity {
        if !is_equal_eps(self.shx, 0.0) || !is_equal_eps(self.shy, 0.0) {
            return MatrixComplexity::Complex;
        }
        let scaled = !is_equal_eps(self.sx, 1.0) || !is_equal_eps(self.sy, 1.0);
        let translated = !is_equal_eps(self.tx, 0.0) || !is_equal_eps(self.ty, 0.0);
        match (translated, scaled) {
            (false, false) => MatrixComplexity::Identity,
            (true, false) => MatrixComplexity::TranslationOnly,
            (false, true) => MatrixComplexity::ScaleOnly,
            (true, true) => MatrixComplexity::TranslationScale,
        }
    }

    /// Transform a single point.
    #[inline]
    pub fn transform(&self, x: f64, y: f64) -> (f64, f64) {
        (
            x * self.sx + y * self.shx + self.tx,
            x * self.shy + y * self.sy + self.ty,
        )
    }

    /// Transform `src` into `dst` with the kernel matching the matrix class.
    ///
    /// Returns the bounding box of the transformed points.
    pub fn transform_points(&self, src: &[[f64; 2]], dst: &mut [[f64; 2]]) -> Rect<f64> {
        debug_assert_eq!(src.len(), dst.len());
        let mut bbox = Rect::empty_bounds();
        let pairs = src.iter().zip(dst.iter_mut());
        match self.determine_complexity() {
            MatrixComplexity::Identity => {
                for (s, d) in pairs {
                    *d = *s;
                    bbox.include(d[0], d[1]);
                }
            }
            MatrixComplexity::TranslationOnly => {
                for (s, d) in pairs {
                    *d = [s[0] + self.tx, s[1] + self.ty];
                    bbox.include(d[0], d[1]);
                }
            }
            MatrixComplexity::ScaleOnly => {
                for (s, d) in pairs {
                    *d = [s[0] * self.sx, s[1] * self.sy];
                    bbox.include(d[0], d[1]);
                }
            }
            MatrixComplexity::TranslationScale => {
                for (s, d) in pairs {
                    *d = [s[0] * self.sx + self.tx, s[1] * self.sy + self.ty];
                    bbox.include(d[0], d[1]);
                }
            }
            MatrixComplexity::Complex => {
                for (s, d) in pairs {
                    let (x, y) = self.transform(s[0], s[1]);
                    *d = [x, y];
                    bbox.include(x, y);
                }
            }
        }
        bbox
    }

    /// Map an integer rectangle and return the integer box enclosing the
    /// four transformed corners.
    pub fn transform_rect(&self, r: &IntRect) -> IntRect {
        if self.determine_complexity() == MatrixComplexity::Identity {
            return *r;
        }
        let mut bbox = Rect::empty_bounds();
        for (x, y) in [(r.x1, r.y1), (r.x2, r.y1), (r.x2, r.y2), (r.x1, r.y2)] {
            let (tx, ty) = self.transform(x as f64, y as f64);
            bbox.include(tx, ty);
        }
        IntRect::enclosing(&bbox)
    }

    /// Determinant of the 2x2 part.
    pub fn determinant(&self) -> f64 {
        self.sx * self.sy - self.shy * self.shx
    }

    /// Whether every component is finite and the matrix is not degenerate.
    pub fn is_valid(&self) -> bool {
        let parts = [self.sx, self.shy, self.shx, self.sy, self.tx, self.ty];
        parts.iter().all(|v| v.is_finite()) && self.determinant().abs() > AFFINE_EPSILON
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Tests
// ============================================================================
