//! Foundation types and constants.
//!
//! Subpixel and tile geometry constants, rounding helpers, the fill rule,
//! rectangles and tile-space bounds. Everything else in the crate depends on
//! this module.

// ============================================================================
// Rounding and conversion functions
// ============================================================================

/// Round a double to the nearest integer (round half away from zero).
#[inline]
pub fn iround(v: f64) -> i32 {
    if v < 0.0 {
        (v - 0.5) as i32
    } else {
        (v + 0.5) as i32
    }
}

/// Floor a double to the nearest integer toward negative infinity.
#[inline]
pub fn ifloor(v: f64) -> i32 {
    let i = v as i32;
    i - (i as f64 > v) as i32
}

/// Ceiling of a double as a signed integer.
#[inline]
pub fn iceil(v: f64) -> i32 {
    v.ceil() as i32
}

// ============================================================================
// Subpixel constants
// ============================================================================

/// Number of fractional bits in device coordinates (24.8 fixed point).
pub const SUBPIXEL_SHIFT: i32 = 8;
pub const SUBPIXEL_SCALE: i32 = 1 << SUBPIXEL_SHIFT;
pub const SUBPIXEL_MASK: i32 = SUBPIXEL_SCALE - 1;

// ============================================================================
// Tile constants
// ============================================================================

pub const TILE_WIDTH_SHIFT: i32 = 4;
pub const TILE_HEIGHT_SHIFT: i32 = 4;
pub const TILE_WIDTH: i32 = 1 << TILE_WIDTH_SHIFT;
pub const TILE_HEIGHT: i32 = 1 << TILE_HEIGHT_SHIFT;

/// Tile extents in 24.8 units.
pub const TILE_WIDTH_FIXED_SHIFT: i32 = TILE_WIDTH_SHIFT + SUBPIXEL_SHIFT;
pub const TILE_HEIGHT_FIXED_SHIFT: i32 = TILE_HEIGHT_SHIFT + SUBPIXEL_SHIFT;
pub const TILE_WIDTH_FIXED: i32 = 1 << TILE_WIDTH_FIXED_SHIFT;
pub const TILE_HEIGHT_FIXED: i32 = 1 << TILE_HEIGHT_FIXED_SHIFT;

/// Largest accepted image width or height, in pixels. Keeps every 24.8
/// window-local coordinate below 2^23.
pub const MAX_IMAGE_DIMENSION: u32 = 1 << 15;

// ============================================================================
// Filling rule
// ============================================================================

/// Filling rule for polygon rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

impl FillRule {
    /// Decode the container representation (`0` = non-zero, `1` = even-odd).
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::NonZero),
            1 => Some(Self::EvenOdd),
            _ => None,
        }
    }

    pub fn to_u32(self) -> u32 {
        match self {
            Self::NonZero => 0,
            Self::EvenOdd => 1,
        }
    }
}

// ============================================================================
// Rect
// ============================================================================

/// Axis-aligned rectangle `[x1, x2) x [y1, y2)`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect<T: Copy> {
    pub x1: T,
    pub y1: T,
    pub x2: T,
    pub y2: T,
}

/// Integer rectangle used for path bounds and device-space boxes.
pub type IntRect = Rect<i32>;

impl<T: Copy + PartialOrd> Rect<T> {
    pub fn new(x1: T, y1: T, x2: T, y2: T) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Normalize so that x1 <= x2 and y1 <= y2, swapping if needed.
    pub fn normalize(&mut self) -> &Self {
        if self.x1 > self.x2 {
            core::mem::swap(&mut self.x1, &mut self.x2);
        }
        if self.y1 > self.y2 {
            core::mem::swap(&mut self.y1, &mut self.y2);
        }
        self
    }

    /// Returns `true` if the rectangle encloses no area.
    pub fn is_empty(&self) -> bool {
        !(self.x1 < self.x2 && self.y1 < self.y2)
    }

    /// Intersection of `self` and `r`. May be empty.
    pub fn intersect(&self, r: &Self) -> Self {
        let pick_max = |a: T, b: T| if a > b { a } else { b };
        let pick_min = |a: T, b: T| if a < b { a } else { b };
        Self {
            x1: pick_max(self.x1, r.x1),
            y1: pick_max(self.y1, r.y1),
            x2: pick_min(self.x2, r.x2),
            y2: pick_min(self.y2, r.y2),
        }
    }

    /// Returns `true` if `r` lies entirely inside `self` (edges inclusive).
    pub fn contains(&self, r: &Self) -> bool {
        r.x1 >= self.x1 && r.y1 >= self.y1 && r.x2 <= self.x2 && r.y2 <= self.y2
    }

    /// Returns `true` if the two rectangles share any area.
    pub fn overlaps(&self, r: &Self) -> bool {
        !self.intersect(r).is_empty()
    }
}

impl IntRect {
    pub fn width(&self) -> i32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> i32 {
        self.y2 - self.y1
    }

    /// Smallest integer rectangle enclosing the float rectangle `r`.
    pub fn enclosing(r: &Rect<f64>) -> Self {
        Self::new(ifloor(r.x1), ifloor(r.y1), iceil(r.x2), iceil(r.y2))
    }
}

impl Rect<f64> {
    /// An inverted rectangle that any `include` call replaces.
    pub fn empty_bounds() -> Self {
        Self::new(f64::MAX, f64::MAX, f64::MIN, f64::MIN)
    }

    /// Grow the rectangle to include `(x, y)`.
    #[inline]
    pub fn include(&mut self, x: f64, y: f64) {
        self.x1 = self.x1.min(x);
        self.y1 = self.y1.min(y);
        self.x2 = self.x2.max(x);
        self.y2 = self.y2.max(y);
    }
}

// ============================================================================
// TileBounds
// ============================================================================

/// Rectangle in tile units. `columns` and `rows` are always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub x: i32,
    pub y: i32,
    pub columns: i32,
    pub rows: i32,
}

impl TileBounds {
    /// Tile-aligned cover of a non-empty pixel rectangle.
    pub fn covering(r: &IntRect) -> Option<Self> {
        if r.is_empty() {
            return None;
        }
        let x = r.x1 >> TILE_WIDTH_SHIFT;
        let y = r.y1 >> TILE_HEIGHT_SHIFT;
        let x2 = (r.x2 + TILE_WIDTH - 1) >> TILE_WIDTH_SHIFT;
        let y2 = (r.y2 + TILE_HEIGHT - 1) >> TILE_HEIGHT_SHIFT;
        Some(Self {
            x,
            y,
            columns: x2 - x,
            rows: y2 - y,
        })
    }

    /// Tile count needed to cover `pixels` horizontally.
    pub fn columns_for_width(pixels: u32) -> i32 {
        (pixels as i32 + TILE_WIDTH - 1) >> TILE_WIDTH_SHIFT
    }

    /// Tile count needed to cover `pixels` vertically.
    pub fn rows_for_height(pixels: u32) -> i32 {
        (pixels as i32 + TILE_HEIGHT - 1) >> TILE_HEIGHT_SHIFT
    }

    pub fn pixel_left(&self) -> i32 {
        self.x << TILE_WIDTH_SHIFT
    }

    pub fn pixel_top(&self) -> i32 {
        self.y << TILE_HEIGHT_SHIFT
    }

    /// Row index one past the last covered tile row.
    pub fn end_row(&self) -> i32 {
        self.y + self.rows
    }

    /// Whether the global tile row `row` falls inside these bounds.
    pub fn contains_row(&self, row: i32) -> bool {
        row >= self.y && row < self.end_row()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rounding() {
        assert_eq!(iround(1.5), 2);
        assert_eq!(iround(-1.5), -2);
        assert_eq!(ifloor(-0.25), -1);
        assert_eq!(ifloor(3.99), 3);
        assert_eq!(iceil(3.01), 4);
    }

    #[test]
    fn test_fill_rule_codes() {
        assert_eq!(FillRule::from_u32(0), Some(FillRule::NonZero));
        assert_eq!(FillRule::from_u32(1), Some(FillRule::EvenOdd));
        assert_eq!(FillRule::from_u32(2), None);
        assert_eq!(FillRule::EvenOdd.to_u32(), 1);
    }

    #[test]
    fn test_rect_intersect() {
        let a = IntRect::new(0, 0, 10, 10);
        let b = IntRect::new(5, -5, 20, 7);
        let c = a.intersect(&b);
        assert_eq!(c, IntRect::new(5, 0, 10, 7));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&IntRect::new(10, 0, 12, 5)));
    }

    #[test]
    fn test_rect_contains() {
        let a = IntRect::new(0, 0, 10, 10);
        assert!(a.contains(&IntRect::new(0, 0, 10, 10)));
        assert!(!a.contains(&IntRect::new(-1, 0, 10, 10)));
    }

    #[test]
    fn test_rect_enclosing() {
        let r = Rect::new(0.5, -1.25, 9.01, 3.0);
        assert_eq!(IntRect::enclosing(&r), IntRect::new(0, -2, 10, 3));
    }

    #[test]
    fn test_tile_bounds_covering() {
        let t = TileBounds::covering(&IntRect::new(3, 17, 33, 32)).unwrap();
        assert_eq!(t, TileBounds { x: 0, y: 1, columns: 3, rows: 1 });
        assert!(TileBounds::covering(&IntRect::new(3, 3, 3, 9)).is_none());
        assert_eq!(t.pixel_top(), 16);
        assert!(t.contains_row(1));
        assert!(!t.contains_row(2));
    }

    #[test]
    fn test_tile_counts() {
        assert_eq!(TileBounds::columns_for_width(1), 1);
        assert_eq!(TileBounds::columns_for_width(16), 1);
        assert_eq!(TileBounds::columns_for_width(17), 2);
        assert_eq!(TileBounds::rows_for_height(100), 7);
    }
}
