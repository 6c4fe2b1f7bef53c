//! Premultiplied RGBA8 color.
//!
//! All colors in the crate are premultiplied: `r, g, b <= a` for well-formed
//! values. The packed `u32` form is `0xAABBGGRR`, so its little-endian bytes
//! match the in-memory pixel layout `[r, g, b, a]`.

/// Premultiplied RGBA color with u8 components.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BASE_SHIFT: u32 = 8;
    pub const BASE_SCALE: u32 = 1 << Self::BASE_SHIFT;
    pub const BASE_MASK: u32 = Self::BASE_SCALE - 1;
    pub const BASE_MSB: u32 = 1 << (Self::BASE_SHIFT - 1);

    pub const TRANSPARENT: Rgba8 = Rgba8::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Premultiply a straight-alpha color.
    pub fn from_straight(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: Self::multiply(r, a),
            g: Self::multiply(g, a),
            b: Self::multiply(b, a),
            a,
        }
    }

    /// Unpack `0xAABBGGRR`.
    #[inline]
    pub const fn from_u32(v: u32) -> Self {
        let [r, g, b, a] = v.to_le_bytes();
        Self { r, g, b, a }
    }

    /// Pack to `0xAABBGGRR`.
    #[inline]
    pub const fn to_u32(self) -> u32 {
        u32::from_le_bytes([self.r, self.g, self.b, self.a])
    }

    #[inline]
    pub const fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub const fn from_bytes(p: [u8; 4]) -> Self {
        Self {
            r: p[0],
            g: p[1],
            b: p[2],
            a: p[3],
        }
    }

    pub fn is_transparent(&self) -> bool {
        self.a == 0 && self.r == 0 && self.g == 0 && self.b == 0
    }

    pub fn is_opaque(&self) -> bool {
        self.a == Self::BASE_MASK as u8
    }

    /// Fixed-point multiply, exact over u8: `round(a * b / 255)`.
    #[inline]
    pub fn multiply(a: u8, b: u8) -> u8 {
        let t: u32 = a as u32 * b as u32 + Self::BASE_MSB;
        (((t >> Self::BASE_SHIFT) + t) >> Self::BASE_SHIFT) as u8
    }

    /// Scale every channel by `alpha / 255`.
    #[inline]
    pub fn apply_alpha(self, alpha: u8) -> Self {
        if alpha == Self::BASE_MASK as u8 {
            return self;
        }
        Self {
            r: Self::multiply(self.r, alpha),
            g: Self::multiply(self.g, alpha),
            b: Self::multiply(self.b, alpha),
            a: Self::multiply(self.a, alpha),
        }
    }

    /// Porter-Duff source-over of `self` onto `dst`:
    /// `self + dst * (255 - self.a) / 255`.
    #[inline]
    pub fn over(self, dst: Rgba8) -> Self {
        let inv = Self::BASE_MASK as u8 - self.a;
        Self {
            r: self.r.saturating_add(Self::multiply(dst.r, inv)),
            g: self.g.saturating_add(Self::multiply(dst.g, inv)),
            b: self.b.saturating_add(Self::multiply(dst.b, inv)),
            a: self.a.saturating_add(Self::multiply(dst.a, inv)),
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
    fn test_multiply_exact() {
        for a in 0..=255u32 {
            for b in 0..=255u32 {
                let expected = ((a * b) as f64 / 255.0).round() as u8;
                assert_eq!(Rgba8::multiply(a as u8, b as u8), expected, "{a} * {b}");
            }
        }
    }

    #[test]
    fn test_packing() {
        let c = Rgba8::new(1, 2, 3, 4);
        assert_eq!(c.to_u32(), 0x0403_0201);
        assert_eq!(Rgba8::from_u32(0x0403_0201), c);
        assert_eq!(c.to_bytes(), [1, 2, 3, 4]);
    }

    #[test]
    fn test_apply_alpha() {
        let c = Rgba8::new(200, 100, 0, 255);
        assert_eq!(c.apply_alpha(255), c);
        assert_eq!(c.apply_alpha(0), Rgba8::TRANSPARENT);
        assert_eq!(c.apply_alpha(128), Rgba8::new(100, 50, 0, 128));
    }

    #[test]
    fn test_over_opaque_replaces() {
        let src = Rgba8::new(255, 0, 0, 255);
        let dst = Rgba8::new(0, 0, 255, 255);
        assert_eq!(src.over(dst), src);
    }

    #[test]
    fn test_over_transparent_keeps_dst() {
        let dst = Rgba8::new(10, 20, 30, 40);
        assert_eq!(Rgba8::TRANSPARENT.over(dst), dst);
    }

    #[test]
    fn test_over_half() {
        let src = Rgba8::new(128, 0, 0, 128);
        let dst = Rgba8::new(0, 0, 255, 255);
        assert_eq!(src.over(dst), Rgba8::new(128, 0, 127, 255));
    }

    #[test]
    fn test_from_straight() {
        assert_eq!(
            Rgba8::from_straight(255, 255, 255, 128),
            Rgba8::new(128, 128, 128, 128)
        );
    }
}
