// Image comparison, BMP / raw I/O and built-in scenes for bvec-render.

use std::fs::File;
use std::io::{self, Read as IoRead, Write as IoWrite};
use std::path::Path;

use tileraster::{FillRule, Geometry, ImageBuffer, IntRect, Matrix, PathTag, Rgba8, VectorImage};

// ============================================================================
// Comparison
// ============================================================================

/// Information about a single pixel difference.
#[derive(Debug, Clone)]
pub struct DiffInfo {
    pub x: u32,
    pub y: u32,
    pub pixel_a: [u8; 4],
    pub pixel_b: [u8; 4],
}

/// Result of comparing two images.
#[derive(Debug, Clone)]
pub struct CompareResult {
    pub identical: bool,
    pub total_pixels: u64,
    pub different_pixels: u64,
    /// Largest absolute difference in any channel.
    pub max_channel_diff: u8,
    pub first_diff: Option<DiffInfo>,
    /// Index = absolute channel difference, value = channel count.
    pub diff_histogram: [u64; 256],
}

impl std::fmt::Display for CompareResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.identical {
            return write!(f, "IDENTICAL: {} pixels match", self.total_pixels);
        }
        write!(
            f,
            "DIFFERENT: {}/{} pixels differ ({:.2}%), max_diff={}",
            self.different_pixels,
            self.total_pixels,
            self.different_pixels as f64 / self.total_pixels as f64 * 100.0,
            self.max_channel_diff,
        )?;
        if let Some(d) = &self.first_diff {
            write!(
                f,
                "\n  first diff at ({}, {}): A={:?} B={:?}",
                d.x, d.y, d.pixel_a, d.pixel_b
            )?;
        }
        Ok(())
    }
}

/// Compare two images of equal size channel by channel.
pub fn compare_images(a: &ImageBuffer, b: &ImageBuffer) -> io::Result<CompareResult> {
    if a.width() != b.width() || a.height() != b.height() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "size mismatch: {}x{} vs {}x{}",
                a.width(),
                a.height(),
                b.width(),
                b.height()
            ),
        ));
    }
    let mut result = CompareResult {
        identical: true,
        total_pixels: a.width() as u64 * a.height() as u64,
        different_pixels: 0,
        max_channel_diff: 0,
        first_diff: None,
        diff_histogram: [0; 256],
    };
    for y in 0..a.height() {
        for x in 0..a.width() {
            let pa = a.pixel(x, y).to_bytes();
            let pb = b.pixel(x, y).to_bytes();
            if pa == pb {
                continue;
            }
            for c in 0..4 {
                let d = pa[c].abs_diff(pb[c]);
                result.max_channel_diff = result.max_channel_diff.max(d);
                result.diff_histogram[d as usize] += 1;
            }
            result.different_pixels += 1;
            if result.first_diff.is_none() {
                result.first_diff = Some(DiffInfo {
                    x,
                    y,
                    pixel_a: pa,
                    pixel_b: pb,
                });
            }
        }
    }
    result.identical = result.different_pixels == 0;
    Ok(result)
}

/// Dark gray where the images agree, red scaled by the difference elsewhere.
pub fn diff_image(a: &ImageBuffer, b: &ImageBuffer) -> io::Result<ImageBuffer> {
    let mut out = ImageBuffer::new(a.width(), a.height()).map_err(to_io)?;
    for y in 0..a.height() {
        for x in 0..a.width() {
            let pa = a.pixel(x, y).to_bytes();
            let pb = b.pixel(x, y).to_bytes();
            let d = (0..4).map(|c| pa[c].abs_diff(pb[c])).max().unwrap_or(0);
            let px = if d == 0 {
                Rgba8::new(40, 40, 40, 255)
            } else {
                Rgba8::new((d as u16 * 10).min(255) as u8, 0, 0, 255)
            };
            out.set_pixel(x, y, px);
        }
    }
    Ok(out)
}

fn to_io(e: tileraster::RasterError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e.to_string())
}

// ============================================================================
// BMP I/O (32-bit BGRA, top-down)
// ============================================================================

pub fn save_bmp(path: &Path, img: &ImageBuffer) -> io::Result<()> {
    let w = img.width();
    let h = img.height();
    let row_size = w * 4;
    let image_size = row_size * h;
    let file_size = 14 + 40 + image_size;

    let mut f = io::BufWriter::new(File::create(path)?);
    f.write_all(b"BM")?;
    f.write_all(&file_size.to_le_bytes())?;
    f.write_all(&[0u8; 4])?;
    f.write_all(&(14u32 + 40).to_le_bytes())?;

    f.write_all(&40u32.to_le_bytes())?;
    f.write_all(&w.to_le_bytes())?;
    f.write_all(&(-(h as i32)).to_le_bytes())?; // top-down
    f.write_all(&1u16.to_le_bytes())?;
    f.write_all(&32u16.to_le_bytes())?;
    f.write_all(&0u32.to_le_bytes())?;
    f.write_all(&image_size.to_le_bytes())?;
    f.write_all(&[0u8; 8])?;
    f.write_all(&0u32.to_le_bytes())?;
    f.write_all(&0u32.to_le_bytes())?;

    let mut row = vec![0u8; row_size as usize];
    for y in 0..h {
        for (dst, src) in row.chunks_exact_mut(4).zip(img.row(y).chunks_exact(4)) {
            dst.copy_from_slice(&[src[2], src[1], src[0], src[3]]);
        }
        f.write_all(&row)?;
    }
    f.flush()
}

/// Load a 24- or 32-bit uncompressed BMP.
pub fn load_bmp(path: &Path) -> io::Result<ImageBuffer> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    if data.len() < 54 || &data[0..2] != b"BM" {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "not a BMP file"));
    }
    let u32_at = |i: usize| u32::from_le_bytes([data[i], data[i + 1], data[i + 2], data[i + 3]]);
    let pixel_offset = u32_at(10) as usize;
    let w = u32_at(18) as i32;
    let h = u32_at(22) as i32;
    let bytes_pp = u16::from_le_bytes([data[28], data[29]]) as usize / 8;
    if bytes_pp != 3 && bytes_pp != 4 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("unsupported BMP depth: {} bits", bytes_pp * 8),
        ));
    }

    let width = w.unsigned_abs();
    let height = h.unsigned_abs();
    let top_down = h < 0;
    let row_stride = (width as usize * bytes_pp).div_ceil(4) * 4;
    let mut img = ImageBuffer::new(width, height).map_err(to_io)?;
    for y in 0..height {
        let src_y = (if top_down { y } else { height - 1 - y }) as usize;
        let start = pixel_offset + src_y * row_stride;
        let Some(src) = data.get(start..start + width as usize * bytes_pp) else {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "BMP pixel data truncated"));
        };
        for (dst, s) in img.row_mut(y).chunks_exact_mut(4).zip(src.chunks_exact(bytes_pp)) {
            let a = if bytes_pp == 4 { s[3] } else { 255 };
            dst.copy_from_slice(&[s[2], s[1], s[0], a]);
        }
    }
    Ok(img)
}

// ============================================================================
// Raw RGBA I/O: [width:u32][height:u32][rgba rows]
// ============================================================================

pub fn save_raw(path: &Path, img: &ImageBuffer) -> io::Result<()> {
    let mut f = io::BufWriter::new(File::create(path)?);
    f.write_all(&img.width().to_le_bytes())?;
    f.write_all(&img.height().to_le_bytes())?;
    for y in 0..img.height() {
        f.write_all(img.row(y))?;
    }
    f.flush()
}

pub fn load_raw(path: &Path) -> io::Result<ImageBuffer> {
    let mut data = Vec::new();
    File::open(path)?.read_to_end(&mut data)?;
    if data.len() < 8 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "raw file too small"));
    }
    let width = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let height = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let expected = width as usize * height as usize * 4;
    if data.len() < expected + 8 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("raw file too small: expected {} bytes, got {}", expected + 8, data.len()),
        ));
    }
    data.drain(..8);
    data.truncate(expected);
    ImageBuffer::from_vec(width, height, width as usize * 4, data).map_err(to_io)
}

/// Load an image, picking the format from the extension.
pub fn load_image(path: &Path) -> io::Result<ImageBuffer> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("bmp") => load_bmp(path),
        Some("raw") | Some("rgba") => load_raw(path),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported image format: {}", path.display()),
        )),
    }
}

/// Save an image, picking the format from the extension.
pub fn save_image(path: &Path, img: &ImageBuffer) -> io::Result<()> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("bmp") => save_bmp(path, img),
        Some("raw") | Some("rgba") => save_raw(path, img),
        _ => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("unsupported image format: {}", path.display()),
        )),
    }
}

// ============================================================================
// Scenes
// ============================================================================

/// Cubic control-point distance for a quarter circle.
const KAPPA: f64 = 0.552_284_749_830_793_4;

pub fn available_scenes() -> &'static [&'static str] {
    &["overlap", "circles", "stars", "curves"]
}

/// Build a named scene sized for a `width x height` canvas.
pub fn build_scene(name: &str, width: u32, height: u32) -> Option<VectorImage> {
    let (w, h) = (width as f64, height as f64);
    let geometries = match name {
        "overlap" => overlap(w, h),
        "circles" => circles(w, h),
        "stars" => stars(w, h),
        "curves" => curves(w, h),
        _ => return None,
    };
    Some(VectorImage::new(
        IntRect::new(0, 0, width as i32, height as i32),
        geometries,
    ))
}

fn overlap(w: f64, h: f64) -> Vec<Geometry> {
    vec![
        Geometry::rect(0.0, 0.0, w * 0.5, h * 0.5, Rgba8::new(255, 0, 0, 255)),
        Geometry::rect(w * 0.25, h * 0.25, w * 0.75, h * 0.75, Rgba8::new(0, 0, 255, 255)),
    ]
}

/// Circle of radius `r` around `(cx, cy)` as four cubics.
pub fn circle(cx: f64, cy: f64, r: f64, color: Rgba8, fill_rule: FillRule) -> Geometry {
    let k = r * KAPPA;
    let tags = vec![
        PathTag::Move,
        PathTag::Cubic,
        PathTag::Cubic,
        PathTag::Cubic,
        PathTag::Cubic,
        PathTag::Close,
    ];
    let points = vec![
        [cx + r, cy],
        [cx + r, cy + k],
        [cx + k, cy + r],
        [cx, cy + r],
        [cx - k, cy + r],
        [cx - r, cy + k],
        [cx - r, cy],
        [cx - r, cy - k],
        [cx - k, cy - r],
        [cx, cy - r],
        [cx + k, cy - r],
        [cx + r, cy - k],
        [cx + r, cy],
    ];
    Geometry::new(
        IntRect::new(
            (cx - r).floor() as i32,
            (cy - r).floor() as i32,
            (cx + r).ceil() as i32,
            (cy + r).ceil() as i32,
        ),
        tags,
        points,
        Matrix::IDENTITY,
        color,
        fill_rule,
    )
    .unwrap_or_else(|_| Geometry::rect(cx - r, cy - r, cx + r, cy + r, color))
}

/// Small deterministic generator for scene layout.
struct Lcg(u64);

impl Lcg {
    fn next_f64(&mut self) -> f64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 11) as f64 / (1u64 << 53) as f64
    }

    fn color(&mut self) -> Rgba8 {
        let a = 64 + (self.next_f64() * 191.0) as u8;
        Rgba8::from_straight(
            (self.next_f64() * 255.0) as u8,
            (self.next_f64() * 255.0) as u8,
            (self.next_f64() * 255.0) as u8,
            a,
        )
    }
}

fn circles(w: f64, h: f64) -> Vec<Geometry> {
    let mut rng = Lcg(7);
    let max_r = w.min(h) * 0.2;
    (0..64)
        .map(|i| {
            let rule = if i % 2 == 0 { FillRule::NonZero } else { FillRule::EvenOdd };
            circle(
                rng.next_f64() * w,
                rng.next_f64() * h,
                2.0 + rng.next_f64() * max_r,
                rng.color(),
                rule,
            )
        })
        .collect()
}

fn stars(w: f64, h: f64) -> Vec<Geometry> {
    let mut rng = Lcg(11);
    let mut out = Vec::new();
    for i in 0..24 {
        let (cx, cy) = (rng.next_f64() * w, rng.next_f64() * h);
        let r = 4.0 + rng.next_f64() * w.min(h) * 0.25;
        let spin = rng.next_f64() * std::f64::consts::TAU;
        let mut tags = vec![PathTag::Move];
        let mut points = Vec::new();
        // Five-point star drawn as one self-intersecting pentagram.
        for k in 0..5 {
            let a = spin + k as f64 * 2.0 * std::f64::consts::TAU / 5.0;
            points.push([cx + r * a.cos(), cy + r * a.sin()]);
            if k > 0 {
                tags.push(PathTag::Line);
            }
        }
        tags.push(PathTag::Close);
        let rule = if i % 2 == 0 { FillRule::NonZero } else { FillRule::EvenOdd };
        if let Ok(g) = Geometry::with_computed_bounds(tags, points, Matrix::IDENTITY, rng.color(), rule) {
            out.push(g);
        }
    }
    out
}

fn curves(w: f64, h: f64) -> Vec<Geometry> {
    let mut rng = Lcg(23);
    let mut out = Vec::new();
    for _ in 0..32 {
        let mut pt = || [rng.next_f64() * w * 1.2 - w * 0.1, rng.next_f64() * h * 1.2 - h * 0.1];
        let points = vec![pt(), pt(), pt(), pt(), pt(), pt()];
        let tags = vec![PathTag::Move, PathTag::Quadratic, PathTag::Cubic, PathTag::Close];
        if let Ok(g) =
            Geometry::with_computed_bounds(tags, points, Matrix::IDENTITY, rng.color(), FillRule::NonZero)
        {
            out.push(g);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenes_build() {
        for name in available_scenes() {
            let scene = build_scene(name, 64, 48).unwrap();
            assert!(!scene.geometries.is_empty(), "{name}");
        }
        assert!(build_scene("nope", 1, 1).is_none());
    }

    #[test]
    fn test_compare_reports_first_diff() {
        let a = ImageBuffer::new(4, 4).unwrap();
        let mut b = a.clone();
        b.set_pixel(2, 1, Rgba8::new(0, 0, 9, 9));
        let r = compare_images(&a, &b).unwrap();
        assert!(!r.identical);
        assert_eq!(r.different_pixels, 1);
        assert_eq!(r.max_channel_diff, 9);
        let d = r.first_diff.unwrap();
        assert_eq!((d.x, d.y), (2, 1));
    }
}
