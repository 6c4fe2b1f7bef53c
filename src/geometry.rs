//! Fillable geometry records.
//!
//! A [`Geometry`] is one filled shape: a tag stream, its points, a transform,
//! a premultiplied color and a fill rule. The rasterizer only ever reads it.

use crate::basics::{FillRule, IntRect};
use crate::color::Rgba8;
use crate::error::{RasterError, RasterResult};
use crate::matrix::Matrix;

/// Path command. Each tag consumes a fixed number of points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PathTag {
    Move = 0,
    Line = 1,
    Quadratic = 2,
    Cubic = 3,
    Close = 4,
}

impl PathTag {
    /// Number of points the tag consumes from the point stream.
    #[inline]
    pub fn point_count(self) -> usize {
        match self {
            PathTag::Move | PathTag::Line => 1,
            PathTag::Quadratic => 2,
            PathTag::Cubic => 3,
            PathTag::Close => 0,
        }
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(PathTag::Move),
            1 => Some(PathTag::Line),
            2 => Some(PathTag::Quadratic),
            3 => Some(PathTag::Cubic),
            4 => Some(PathTag::Close),
            _ => None,
        }
    }
}

/// One fillable path with its paint.
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    /// Bounds of the path after `transform`, before the global matrix.
    pub bounds: IntRect,
    pub tags: Vec<PathTag>,
    pub points: Vec<[f64; 2]>,
    pub transform: Matrix,
    pub color: Rgba8,
    pub fill_rule: FillRule,
}

impl Geometry {
    /// Build a geometry, validating that tags and points agree.
    pub fn new(
        bounds: IntRect,
        tags: Vec<PathTag>,
        points: Vec<[f64; 2]>,
        transform: Matrix,
        color: Rgba8,
        fill_rule: FillRule,
    ) -> RasterResult<Self> {
        validate_path(&tags, &points)?;
        Ok(Self {
            bounds,
            tags,
            points,
            transform,
            color,
            fill_rule,
        })
    }

    /// Build a geometry whose bounds are computed from its transformed points.
    pub fn with_computed_bounds(
        tags: Vec<PathTag>,
        points: Vec<[f64; 2]>,
        transform: Matrix,
        color: Rgba8,
        fill_rule: FillRule,
    ) -> RasterResult<Self> {
        let bounds = transformed_bounds(&points, &transform);
        Self::new(bounds, tags, points, transform, color, fill_rule)
    }

    /// Axis-aligned rectangle, wound clockwise in y-down space.
    pub fn rect(x1: f64, y1: f64, x2: f64, y2: f64, color: Rgba8) -> Self {
        let tags = vec![
            PathTag::Move,
            PathTag::Line,
            PathTag::Line,
            PathTag::Line,
            PathTag::Close,
        ];
        let points = vec![[x1, y1], [x2, y1], [x2, y2], [x1, y2]];
        let bbox = crate::basics::Rect::new(x1.min(x2), y1.min(y2), x1.max(x2), y1.max(y2));
        Self {
            bounds: IntRect::enclosing(&bbox),
            tags,
            points,
            transform: Matrix::IDENTITY,
            color,
            fill_rule: FillRule::NonZero,
        }
    }

    pub fn with_fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = fill_rule;
        self
    }

    /// Replace the path transform and recompute the bounds to match.
    pub fn with_transform(mut self, transform: Matrix) -> Self {
        self.bounds = transformed_bounds(&self.points, &transform);
        self.transform = transform;
        self
    }

    /// Returns `true` if the path holds nothing that could cover a pixel.
    pub fn is_degenerate(&self) -> bool {
        self.points.len() < 2 || self.bounds.is_empty()
    }
}

fn transformed_bounds(points: &[[f64; 2]], transform: &Matrix) -> IntRect {
    if points.is_empty() {
        return IntRect::default();
    }
    let mut transformed = vec![[0.0; 2]; points.len()];
    let bbox = transform.transform_points(points, &mut transformed);
    IntRect::enclosing(&bbox)
}

/// Check that the point stream matches what the tags consume and that every
/// drawing tag follows a `Move`.
pub fn validate_path(tags: &[PathTag], points: &[[f64; 2]]) -> RasterResult<()> {
    let mut expected = 0usize;
    let mut open = false;
    for (i, tag) in tags.iter().enumerate() {
        match tag {
            PathTag::Move => open = true,
            PathTag::Close => open = false,
            _ if !open && expected == 0 => {
                return Err(RasterError::malformed_path(format!(
                    "tag {i} ({tag:?}) is not preceded by a move"
                )));
            }
            _ => {}
        }
        expected += tag.point_count();
    }
    if expected != points.len() {
        return Err(RasterError::malformed_path(format!(
            "tags consume {expected} points but {} were supplied",
            points.len()
        )));
    }
    if let Some(i) = points.iter().position(|p| !p[0].is_finite() || !p[1].is_finite()) {
        return Err(RasterError::malformed_path(format!(
            "point {i} is not finite"
        )));
    }
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
