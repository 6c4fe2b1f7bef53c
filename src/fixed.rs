//! 24.8 fixed-point scalars and points.
//!
//! A [`Fixed`] value stores `real * 256` in an `i32`. Arithmetic wraps on
//! overflow; keeping operands small enough is the caller's job (the
//! linearizer bisects long segments and works in window-local coordinates).

use core::ops::{Add, Div, Mul, Neg, Rem, Sub};

use crate::basics::{iround, SUBPIXEL_SCALE, SUBPIXEL_SHIFT};

/// 24.8 fixed-point scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Fixed(pub i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(SUBPIXEL_SCALE);

    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Self(iround(v * SUBPIXEL_SCALE as f64))
    }

    #[inline]
    pub fn from_int(v: i32) -> Self {
        Self(v.wrapping_shl(SUBPIXEL_SHIFT as u32))
    }

    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SUBPIXEL_SCALE as f64
    }

    /// Integer part, rounded toward negative infinity.
    #[inline]
    pub fn floor(self) -> i32 {
        self.0 >> SUBPIXEL_SHIFT
    }

    #[inline]
    pub fn abs(self) -> Self {
        Self(self.0.wrapping_abs())
    }

    /// Wrapping division, `None` for a zero divisor.
    #[inline]
    pub fn checked_div(self, rhs: Fixed) -> Option<Fixed> {
        (rhs.0 != 0).then(|| self / rhs)
    }

    /// Wrapping remainder, `None` for a zero divisor.
    #[inline]
    pub fn checked_rem(self, rhs: Fixed) -> Option<Fixed> {
        (rhs.0 != 0).then(|| self % rhs)
    }
}

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_add(rhs.0))
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_sub(rhs.0))
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    #[inline]
    fn mul(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_mul(rhs.0) >> SUBPIXEL_SHIFT)
    }
}

/// # Panics
///
/// Panics if `rhs` is zero, like integer division. See [`Fixed::checked_div`].
impl Div for Fixed {
    type Output = Fixed;
    #[inline]
    fn div(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_shl(SUBPIXEL_SHIFT as u32).wrapping_div(rhs.0))
    }
}

/// # Panics
///
/// Panics if `rhs` is zero. See [`Fixed::checked_rem`].
impl Rem for Fixed {
    type Output = Fixed;
    #[inline]
    fn rem(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.wrapping_rem(rhs.0))
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline]
    fn neg(self) -> Fixed {
        Fixed(self.0.wrapping_neg())
    }
}

// ============================================================================
// FixedPoint
// ============================================================================

/// Point with raw 24.8 coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FixedPoint {
    pub x: i32,
    pub y: i32,
}

impl FixedPoint {
    #[inline]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Convert a real-valued point relative to `(origin_x, origin_y)`.
    #[inline]
    pub fn from_f64(x: f64, y: f64, origin_x: f64, origin_y: f64) -> Self {
        Self {
            x: iround((x - origin_x) * SUBPIXEL_SCALE as f64),
            y: iround((y - origin_y) * SUBPIXEL_SCALE as f64),
        }
    }

    /// Midpoint, rounding toward negative infinity.
    #[inline]
    pub fn midpoint(self, other: FixedPoint) -> FixedPoint {
        FixedPoint {
            x: (self.x + other.x) >> 1,
            y: (self.y + other.y) >> 1,
        }
    }

    /// Clamp both coordinates into `[0, max_x] x [0, max_y]`.
    #[inline]
    pub fn clamped(self, max_x: i32, max_y: i32) -> FixedPoint {
        FixedPoint {
            x: self.x.clamp(0, max_x),
            y: self.y.clamp(0, max_y),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(Fixed::from_f64(1.5).0, 384);
        assert_eq!(Fixed::from_int(3).0, 768);
        assert_eq!(Fixed(640).to_f64(), 2.5);
        assert_eq!(Fixed(-1).floor(), -1);
    }

    #[test]
    fn test_arithmetic() {
        let a = Fixed::from_f64(2.5);
        let b = Fixed::from_f64(1.25);
        assert_eq!((a + b).to_f64(), 3.75);
        assert_eq!((a - b).to_f64(), 1.25);
        assert_eq!((a * b).to_f64(), 3.125);
        assert_eq!((a / b).to_f64(), 2.0);
        assert_eq!((a % b).0, 0);
        assert_eq!((-a).to_f64(), -2.5);
    }

    #[test]
    fn test_checked_division() {
        let a = Fixed::from_f64(2.5);
        assert_eq!(a.checked_div(Fixed::from_f64(1.25)), Some(Fixed::from_int(2)));
        assert_eq!(a.checked_rem(Fixed::from_f64(1.0)), Some(Fixed::from_f64(0.5)));
        assert_eq!(a.checked_div(Fixed::ZERO), None);
        assert_eq!(a.checked_rem(Fixed::ZERO), None);
    }

    #[test]
    #[should_panic]
    fn test_div_by_zero_panics() {
        let _ = Fixed::ONE / Fixed::ZERO;
    }

    #[test]
    fn test_add_wraps() {
        let a = Fixed(i32::MAX);
        assert_eq!((a + Fixed(1)).0, i32::MIN);
    }

    #[test]
    fn test_point_from_f64_relative() {
        let p = FixedPoint::from_f64(17.5, 33.25, 16.0, 32.0);
        assert_eq!(p, FixedPoint::new(384, 320));
    }

    #[test]
    fn test_point_clamped() {
        let p = FixedPoint::new(-5, 9000).clamped(4096, 4096);
        assert_eq!(p, FixedPoint::new(0, 4096));
    }
}
