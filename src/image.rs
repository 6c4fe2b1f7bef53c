//! Destination image.
//!
//! An [`ImageBuffer`] owns premultiplied RGBA8 pixels laid out top-down,
//! `stride` bytes per row, 4 bytes per pixel in `[r, g, b, a]` order. Rows
//! may carry padding beyond `width * 4` bytes; the rasterizer never touches
//! it.

use crate::basics::{MAX_IMAGE_DIMENSION, TILE_HEIGHT};
use crate::color::Rgba8;
use crate::error::{RasterError, RasterResult};

/// Bytes per pixel.
pub const PIXEL_BYTES: usize = 4;

/// Owned premultiplied RGBA8 raster.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageBuffer {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl core::fmt::Debug for ImageBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImageBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("stride", &self.stride)
            .finish_non_exhaustive()
    }
}

fn check_dimensions(width: u32, height: u32, stride: usize) -> RasterResult<()> {
    if width == 0 || height == 0 {
        return Err(RasterError::invalid_image(format!(
            "image must be at least 1x1, got {width}x{height}"
        )));
    }
    if width > MAX_IMAGE_DIMENSION || height > MAX_IMAGE_DIMENSION {
        return Err(RasterError::invalid_image(format!(
            "image {width}x{height} exceeds the {MAX_IMAGE_DIMENSION} px limit"
        )));
    }
    let min_stride = width as usize * PIXEL_BYTES;
    if stride < min_stride {
        return Err(RasterError::invalid_image(format!(
            "stride {stride} is smaller than width * 4 = {min_stride}"
        )));
    }
    Ok(())
}

impl ImageBuffer {
    /// Transparent image with a tight stride.
    pub fn new(width: u32, height: u32) -> RasterResult<Self> {
        Self::with_stride(width, height, width as usize * PIXEL_BYTES)
    }

    /// Transparent image with an explicit row stride in bytes.
    pub fn with_stride(width: u32, height: u32, stride: usize) -> RasterResult<Self> {
        check_dimensions(width, height, stride)?;
        Ok(Self {
            width,
            height,
            stride,
            data: vec![0; stride * height as usize],
        })
    }

    /// Wrap existing pixel bytes. `data` must hold `height` full rows.
    pub fn from_vec(width: u32, height: u32, stride: usize, data: Vec<u8>) -> RasterResult<Self> {
        check_dimensions(width, height, stride)?;
        let needed = stride * height as usize;
        if data.len() < needed {
            return Err(RasterError::invalid_image(format!(
                "buffer holds {} bytes, {needed} needed",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    /// Pixel bytes of row `y`, without padding.
    pub fn row(&self, y: u32) -> &[u8] {
        assert!(y < self.height, "row {y} out of bounds (height={})", self.height);
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * PIXEL_BYTES]
    }

    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        assert!(y < self.height, "row {y} out of bounds (height={})", self.height);
        let start = y as usize * self.stride;
        &mut self.data[start..start + self.width as usize * PIXEL_BYTES]
    }

    pub fn pixel(&self, x: u32, y: u32) -> Rgba8 {
        let i = x as usize * PIXEL_BYTES;
        let p = &self.row(y)[i..i + PIXEL_BYTES];
        Rgba8::from_bytes([p[0], p[1], p[2], p[3]])
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, color: Rgba8) {
        let i = x as usize * PIXEL_BYTES;
        self.row_mut(y)[i..i + PIXEL_BYTES].copy_from_slice(&color.to_bytes());
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: Rgba8) {
        let bytes = color.to_bytes();
        for y in 0..self.height {
            for px in self.row_mut(y).chunks_exact_mut(PIXEL_BYTES) {
                px.copy_from_slice(&bytes);
            }
        }
    }

    /// Copy the `width x height` region at `(x, y)` into a new tight image.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> RasterResult<Self> {
        if x.saturating_add(width) > self.width || y.saturating_add(height) > self.height {
            return Err(RasterError::invalid_image(format!(
                "crop {width}x{height} at ({x}, {y}) exceeds {}x{}",
                self.width, self.height
            )));
        }
        let mut out = Self::new(width, height)?;
        let start = x as usize * PIXEL_BYTES;
        let len = width as usize * PIXEL_BYTES;
        for row in 0..height {
            let src = &self.row(y + row)[start..start + len];
            out.row_mut(row).copy_from_slice(src);
        }
        Ok(out)
    }

    /// Number of pixels that differ from `other`, or `None` when the sizes
    /// disagree. Padding is ignored.
    pub fn count_differences(&self, other: &Self) -> Option<usize> {
        if self.width != other.width || self.height != other.height {
            return None;
        }
        let mut diff = 0;
        for y in 0..self.height {
            diff += self
                .row(y)
                .chunks_exact(PIXEL_BYTES)
                .zip(other.row(y).chunks_exact(PIXEL_BYTES))
                .filter(|(a, b)| a != b)
                .count();
        }
        Some(diff)
    }

    /// Split the pixel bytes into disjoint tile-row bands of
    /// `TILE_HEIGHT` rows each (the last one may be shorter).
    pub(crate) fn tile_row_bands(&mut self) -> Vec<&mut [u8]> {
        let band = self.stride * TILE_HEIGHT as usize;
        let used = self.stride * self.height as usize;
        self.data[..used].chunks_mut(band).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
