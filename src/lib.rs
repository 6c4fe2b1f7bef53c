//! # tileraster
//!
//! Tile-based parallel software rasterizer. Fills paths made of lines,
//! quadratic and cubic Béziers into a premultiplied RGBA8 image with
//! analytic anti-aliasing, non-zero or even-odd fill rules and source-over
//! compositing in submission order.
//!
//! ## Architecture
//!
//! A [`rasterize`] call runs a four-stage pipeline on a [`TaskExecutor`]:
//!
//! 1. **Transform** bounds to device space and cull invisible geometry
//! 2. **Linearize**: clip, split at extrema, flatten in 24.8 fixed point and
//!    bucket line segments into 16x16 pixel tiles
//! 3. **Bucket** geometry rows into per-tile-row worklists
//! 4. **Rasterize rows**: accumulate cell cover and area per scanline and
//!    composite spans
//!
//! Per-worker arenas make stages allocation-free once warmed up, and tile
//! rows never share image bytes, so output is identical whatever the thread
//! count.
//!
//! ```
//! use tileraster::{rasterize, Geometry, ImageBuffer, Matrix, Rgba8, TaskExecutor};
//!
//! let mut image = ImageBuffer::new(20, 20).unwrap();
//! let mut executor = TaskExecutor::serial();
//! let shapes = [
//!     Geometry::rect(0.0, 0.0, 10.0, 10.0, Rgba8::new(255, 0, 0, 255)),
//!     Geometry::rect(5.0, 5.0, 15.0, 15.0, Rgba8::new(0, 0, 255, 255)),
//! ];
//! rasterize(&shapes, &Matrix::IDENTITY, &mut executor, &mut image);
//! assert_eq!(image.pixel(7, 7), Rgba8::new(0, 0, 255, 255));
//! ```

// Foundation
pub mod basics;
pub mod color;
pub mod error;
pub mod fixed;
pub mod matrix;

// Input
pub mod bvec;
pub mod geometry;
pub mod image;

// Memory
pub mod arena;
pub mod tile_lines;

// Linearization
pub mod curves;
pub mod linearizer;

// Coverage and compositing
pub mod compositor;
pub mod coverage;

// Execution
pub mod executor;
pub mod rasterizer;

pub use basics::{FillRule, IntRect, Rect, TileBounds};
pub use bvec::{BvecDecoder, DecodeStatus, VectorImage};
pub use color::Rgba8;
pub use compositor::{PackedKernel, ScalarKernel, SpanKernel};
pub use error::{RasterError, RasterResult};
pub use executor::{ExecutorConfig, TaskExecutor};
pub use geometry::{Geometry, PathTag};
pub use image::ImageBuffer;
pub use matrix::Matrix;
pub use rasterizer::{rasterize, rasterize_with_kernel, RasterizableGeometry};
