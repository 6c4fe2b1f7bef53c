//! Bvec vector-image container.
//!
//! Little-endian layout:
//!
//! ```text
//! "Bvec" u32 version(=1) u32 path_count i32 x1 i32 y1 i32 x2 i32 y2
//! per path:
//!   u32 color(0xAABBGGRR, premultiplied) i32 x1 i32 y1 i32 x2 i32 y2
//!   u32 fill_rule(0 non-zero, 1 even-odd) u32 tag_count u32 point_count
//!   tag_count x u8 tag
//!   point_count x (f64 x, f64 y)
//! ```
//!
//! Paths carry no transform; decoded geometries use the identity matrix and
//! encoding ignores each geometry's transform.

use crate::basics::{FillRule, IntRect};
use crate::color::Rgba8;
use crate::error::{RasterError, RasterResult};
use crate::geometry::{Geometry, PathTag};
use crate::matrix::Matrix;

pub const BVEC_MAGIC: [u8; 4] = *b"Bvec";
pub const BVEC_VERSION: u32 = 1;

const HEADER_BYTES: usize = 4 + 4 + 4 + 16;
const PATH_HEADER_BYTES: usize = 4 + 16 + 4 + 4 + 4;
const POINT_BYTES: usize = 16;

/// Decoded container contents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VectorImage {
    pub bounds: IntRect,
    pub geometries: Vec<Geometry>,
}

impl VectorImage {
    pub fn new(bounds: IntRect, geometries: Vec<Geometry>) -> Self {
        Self { bounds, geometries }
    }

    /// Serialize to the container format.
    pub fn encode(&self) -> Vec<u8> {
        let payload: usize = self
            .geometries
            .iter()
            .map(|g| PATH_HEADER_BYTES + g.tags.len() + g.points.len() * POINT_BYTES)
            .sum();
        let mut out = Vec::with_capacity(HEADER_BYTES + payload);
        out.extend_from_slice(&BVEC_MAGIC);
        put_u32(&mut out, BVEC_VERSION);
        put_u32(&mut out, self.geometries.len() as u32);
        put_rect(&mut out, &self.bounds);
        for g in &self.geometries {
            put_u32(&mut out, g.color.to_u32());
            put_rect(&mut out, &g.bounds);
            put_u32(&mut out, g.fill_rule.to_u32());
            put_u32(&mut out, g.tags.len() as u32);
            put_u32(&mut out, g.points.len() as u32);
            out.extend(g.tags.iter().map(|&t| t as u8));
            for p in &g.points {
                out.extend_from_slice(&p[0].to_le_bytes());
                out.extend_from_slice(&p[1].to_le_bytes());
            }
        }
        out
    }

    /// Decode a complete container. Truncated input is invalid.
    pub fn decode(data: &[u8]) -> RasterResult<Self> {
        let mut decoder = BvecDecoder::new();
        match decoder.push(data)? {
            DecodeStatus::Done => decoder
                .take_image()
                .ok_or_else(|| RasterError::invalid_data("decoder finished without an image")),
            DecodeStatus::NeedMoreData => Err(RasterError::invalid_data(format!(
                "truncated container ({} bytes)",
                data.len()
            ))),
        }
    }
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_rect(out: &mut Vec<u8>, r: &IntRect) {
    for v in [r.x1, r.y1, r.x2, r.y2] {
        out.extend_from_slice(&v.to_le_bytes());
    }
}

// ============================================================================
// Incremental decoder
// ============================================================================

/// Progress of a [`BvecDecoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    NeedMoreData,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Paths { remaining: u32 },
    Done,
    Failed,
}

/// Little-endian cursor over a byte slice. Reads return `None` when the
/// slice is exhausted.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn bytes(&mut self, n: usize) -> Option<&'a [u8]> {
        let out = self.data.get(self.pos..self.pos.checked_add(n)?)?;
        self.pos += n;
        Some(out)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.bytes(N)?);
        Some(out)
    }

    fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    fn i32(&mut self) -> Option<i32> {
        self.array().map(i32::from_le_bytes)
    }

    fn f64(&mut self) -> Option<f64> {
        self.array().map(f64::from_le_bytes)
    }

    fn rect(&mut self) -> Option<IntRect> {
        Some(IntRect::new(self.i32()?, self.i32()?, self.i32()?, self.i32()?))
    }
}

/// Streaming decoder: feed bytes as they arrive until [`DecodeStatus::Done`].
#[derive(Debug)]
pub struct BvecDecoder {
    buffer: Vec<u8>,
    consumed: usize,
    stage: Stage,
    bounds: IntRect,
    geometries: Vec<Geometry>,
}

impl Default for BvecDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BvecDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            consumed: 0,
            stage: Stage::Header,
            bounds: IntRect::default(),
            geometries: Vec::new(),
        }
    }

    /// Append `data` and decode as far as possible.
    pub fn push(&mut self, data: &[u8]) -> RasterResult<DecodeStatus> {
        match self.stage {
            Stage::Done => return Ok(DecodeStatus::Done),
            Stage::Failed => return Err(RasterError::invalid_data("decoder already failed")),
            _ => {}
        }
        self.buffer.extend_from_slice(data);
        let status = self.advance();
        if status.is_err() {
            self.stage = Stage::Failed;
        }
        status
    }

    /// Number of paths decoded so far.
    pub fn decoded_paths(&self) -> usize {
        self.geometries.len()
    }

    pub fn is_done(&self) -> bool {
        self.stage == Stage::Done
    }

    /// Take the decoded image once decoding is done.
    pub fn take_image(&mut self) -> Option<VectorImage> {
        if self.stage != Stage::Done {
            return None;
        }
        Some(VectorImage {
            bounds: self.bounds,
            geometries: std::mem::take(&mut self.geometries),
        })
    }

    fn advance(&mut self) -> RasterResult<DecodeStatus> {
        loop {
            match self.stage {
                Stage::Header => {
                    let Some(remaining) = self.read_header()? else {
                        return Ok(DecodeStatus::NeedMoreData);
                    };
                    self.stage = Stage::Paths { remaining };
                }
                Stage::Paths { remaining: 0 } => {
                    self.stage = Stage::Done;
                    self.buffer = Vec::new();
                    self.consumed = 0;
                    tracing::debug!(paths = self.geometries.len(), "bvec decoded");
                    return Ok(DecodeStatus::Done);
                }
                Stage::Paths { remaining } => {
                    let Some(geometry) = self.read_path()? else {
                        self.compact();
                        return Ok(DecodeStatus::NeedMoreData);
                    };
                    self.geometries.push(geometry);
                    self.stage = Stage::Paths {
                        remaining: remaining - 1,
                    };
                }
                Stage::Done => return Ok(DecodeStatus::Done),
                Stage::Failed => return Err(RasterError::invalid_data("decoder already failed")),
            }
        }
    }

    /// Drop bytes belonging to paths already decoded.
    fn compact(&mut self) {
        if self.consumed > 0 {
            self.buffer.drain(..self.consumed);
            self.consumed = 0;
        }
    }

    fn read_header(&mut self) -> RasterResult<Option<u32>> {
        let mut r = Reader::new(&self.buffer[self.consumed..]);
        let magic_len = r.remaining().min(BVEC_MAGIC.len());
        if r.data[..magic_len] != BVEC_MAGIC[..magic_len] {
            return Err(RasterError::invalid_data("bad magic, expected \"Bvec\""));
        }
        if r.remaining() < 8 {
            return Ok(None);
        }
        r.pos = 4;
        let version = r.u32().unwrap_or_default();
        if version != BVEC_VERSION {
            return Err(RasterError::invalid_data(format!(
                "unsupported version {version}, expected {BVEC_VERSION}"
            )));
        }
        let (Some(count), Some(bounds)) = (r.u32(), r.rect()) else {
            return Ok(None);
        };
        self.consumed += r.pos;
        self.bounds = bounds;
        self.geometries.reserve(count.min(1024) as usize);
        Ok(Some(count))
    }

    fn read_path(&mut self) -> RasterResult<Option<Geometry>> {
        let mut r = Reader::new(&self.buffer[self.consumed..]);
        if r.remaining() < PATH_HEADER_BYTES {
            return Ok(None);
        }
        let (Some(color), Some(bounds), Some(rule), Some(tag_count), Some(point_count)) =
            (r.u32(), r.rect(), r.u32(), r.u32(), r.u32())
        else {
            return Ok(None);
        };
        let fill_rule = FillRule::from_u32(rule)
            .ok_or_else(|| RasterError::invalid_data(format!("unknown fill rule {rule}")))?;
        let body = (point_count as usize)
            .checked_mul(POINT_BYTES)
            .and_then(|p| p.checked_add(tag_count as usize))
            .ok_or_else(|| RasterError::invalid_data("path size overflows"))?;
        if r.remaining() < body {
            return Ok(None);
        }

        let tag_bytes = r.bytes(tag_count as usize).unwrap_or_default();
        let tags = tag_bytes
            .iter()
            .map(|&b| {
                PathTag::from_u8(b).ok_or_else(|| RasterError::invalid_data(format!("unknown tag {b}")))
            })
            .collect::<RasterResult<Vec<_>>>()?;
        let mut points = Vec::with_capacity(point_count as usize);
        for _ in 0..point_count {
            let (Some(x), Some(y)) = (r.f64(), r.f64()) else {
                return Ok(None);
            };
            points.push([x, y]);
        }
        self.consumed += r.pos;

        Geometry::new(
            bounds,
            tags,
            points,
            Matrix::IDENTITY,
            Rgba8::from_u32(color),
            fill_rule,
        )
        .map(Some)
        .map_err(|e| RasterError::invalid_data(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> VectorImage {
        let tri = Geometry::new(
            IntRect::new(0, 0, 10, 10),
            vec![PathTag::Move, PathTag::Quadratic, PathTag::Cubic, PathTag::Close],
            vec![[0.0, 0.0], [5.0, 10.0], [10.0, 0.0], [8.0, 1.0], [4.0, 2.5], [0.5, 0.25]],
            Matrix::IDENTITY,
            Rgba8::new(10, 20, 30, 40),
            FillRule::EvenOdd,
        )
        .unwrap();
        VectorImage::new(
            IntRect::new(-1, -2, 30, 40),
            vec![Geometry::rect(1.0, 2.0, 3.0, 4.0, Rgba8::new(1, 2, 3, 255)), tri],
        )
    }

    #[test]
    fn test_round_trip() {
        let image = sample();
        let bytes = image.encode();
        assert_eq!(&bytes[..4], b"Bvec");
        assert_eq!(VectorImage::decode(&bytes).unwrap(), image);
    }

    #[test]
    fn test_empty_image() {
        let image = VectorImage::new(IntRect::new(0, 0, 1, 1), Vec::new());
        let bytes = image.encode();
        assert_eq!(bytes.len(), HEADER_BYTES);
        assert_eq!(VectorImage::decode(&bytes).unwrap(), image);
    }

    #[test]
    fn test_byte_at_a_time() {
        let image = sample();
        let bytes = image.encode();
        let mut decoder = BvecDecoder::new();
        for (i, b) in bytes.iter().enumerate() {
            let status = decoder.push(std::slice::from_ref(b)).unwrap();
            if i + 1 < bytes.len() {
                assert_eq!(status, DecodeStatus::NeedMoreData, "byte {i}");
            } else {
                assert_eq!(status, DecodeStatus::Done);
            }
        }
        assert_eq!(decoder.take_image().unwrap(), image);
    }

    #[test]
    fn test_truncated_needs_more() {
        let bytes = sample().encode();
        let mut decoder = BvecDecoder::new();
        assert_eq!(decoder.push(&bytes[..bytes.len() - 1]).unwrap(), DecodeStatus::NeedMoreData);
        assert_eq!(decoder.decoded_paths(), 1);
        assert!(decoder.take_image().is_none());
        assert!(matches!(
            VectorImage::decode(&bytes[..bytes.len() - 1]),
            Err(RasterError::InvalidData(_))
        ));
    }

    #[test]
    fn test_bad_magic() {
        let mut decoder = BvecDecoder::new();
        assert!(matches!(decoder.push(b"Bx"), Err(RasterError::InvalidData(_))));
        assert!(decoder.push(b"vec").is_err());
    }

    #[test]
    fn test_bad_version() {
        let mut bytes = sample().encode();
        bytes[4] = 2;
        assert!(matches!(VectorImage::decode(&bytes), Err(RasterError::InvalidData(_))));
    }

    #[test]
    fn test_bad_fill_rule() {
        let mut bytes = sample().encode();
        // First path's fill rule follows its color and bounds.
        bytes[HEADER_BYTES + 20] = 7;
        assert!(matches!(VectorImage::decode(&bytes), Err(RasterError::InvalidData(_))));
    }

    #[test]
    fn test_bad_tag() {
        let mut bytes = sample().encode();
        bytes[HEADER_BYTES + PATH_HEADER_BYTES] = 9;
        assert!(matches!(VectorImage::decode(&bytes), Err(RasterError::InvalidData(_))));
    }

    #[test]
    fn test_inconsistent_counts() {
        let mut bytes = sample().encode();
        // The rectangle's tags consume four points; claim three.
        bytes[HEADER_BYTES + 28] = 3;
        assert!(matches!(VectorImage::decode(&bytes), Err(RasterError::InvalidData(_))));
    }
}
