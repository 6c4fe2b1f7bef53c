//! Rasterization entry point.
//!
//! [`rasterize`] runs four stages, each a parallel-for that completes before
//! the next one starts:
//!
//! 1. **Transform**: map every geometry's bounds through the global matrix
//!    and cull those missing the destination.
//! 2. **Linearize**: turn each surviving geometry into per-tile-row line
//!    segments in the frame arena of the worker that handled it.
//! 3. **Bucket**: build, for every destination tile row, the list of
//!    `(geometry, local row)` items touching it, in submission order. Each
//!    task owns a disjoint slice of tile rows.
//! 4. **Rasterize rows**: accumulate coverage and composite every item of a
//!    tile row in list order. Rows own disjoint bands of the image.
//!
//! Frame arenas are cleared once the image is complete.

use std::sync::OnceLock;

use crate::arena::{Span, TaskArena};
use crate::basics::{FillRule, IntRect, TileBounds, TILE_HEIGHT, TILE_WIDTH};
use crate::color::Rgba8;
use crate::compositor::{composite_row, PackedKernel, RowTarget, SpanKernel};
use crate::coverage::CoverageAccumulator;
use crate::executor::{TaskExecutor, WorkerSlots};
use crate::geometry::Geometry;
use crate::image::ImageBuffer;
use crate::linearizer::Linearizer;
use crate::matrix::Matrix;
use crate::tile_lines::{FrameArena, LineEncoding, RowLines};

/// Linearized geometry ready for row rasterization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RasterizableGeometry {
    /// Worker whose frame arena holds the lines.
    pub worker: usize,
    /// Window in destination tile coordinates.
    pub window: TileBounds,
    pub pixel_left: i32,
    pub pixel_width: i32,
    pub encoding: LineEncoding,
    pub rows: Span<RowLines>,
    pub color: Rgba8,
    pub fill_rule: FillRule,
}

impl RasterizableGeometry {
    /// Row descriptor for global tile row `row`.
    #[inline]
    fn row<'a>(&self, frame: &'a FrameArena, row: usize) -> &'a RowLines {
        &frame.rows(self.rows)[row - self.window.y as usize]
    }
}

/// Reference to one tile row of one geometry.
#[derive(Debug, Clone, Copy)]
struct RowItem {
    geometry: u32,
    row: u32,
}

/// Fill `geometries` into `destination`, later geometries over earlier ones.
///
/// Each geometry's points go through its own transform, then `matrix`.
pub fn rasterize(
    geometries: &[Geometry],
    matrix: &Matrix,
    executor: &mut TaskExecutor,
    destination: &mut ImageBuffer,
) {
    rasterize_with_kernel(geometries, matrix, executor, destination, &PackedKernel);
}

/// [`rasterize`] with an explicit span kernel.
#[tracing::instrument(
    level = "debug",
    skip_all,
    fields(
        geometries = geometries.len(),
        width = destination.width(),
        height = destination.height(),
        workers = executor.worker_count(),
    )
)]
pub fn rasterize_with_kernel<K: SpanKernel>(
    geometries: &[Geometry],
    matrix: &Matrix,
    executor: &mut TaskExecutor,
    destination: &mut ImageBuffer,
    kernel: &K,
) {
    if geometries.is_empty() {
        return;
    }
    let image_width = destination.width() as i32;
    let image_height = destination.height() as i32;
    let stride = destination.stride();
    let bounds = IntRect::new(0, 0, image_width, image_height);
    let tile_rows = TileBounds::rows_for_height(destination.height()) as usize;
    let scratch_width = (TileBounds::columns_for_width(destination.width()) * TILE_WIDTH) as usize;
    let (dispatcher, frames, tasks) = executor.parts();

    // Transform.
    let visible: Vec<OnceLock<bool>> = geometries.iter().map(|_| OnceLock::new()).collect();
    dispatcher.parallel_for(geometries.len(), |_, range| {
        for i in range {
            let g = &geometries[i];
            let device = matrix.transform_rect(&g.bounds);
            let _ = visible[i].set(!g.is_degenerate() && device.overlaps(&bounds));
        }
    });
    tracing::debug!(
        culled = visible.iter().filter(|v| v.get() != Some(&true)).count(),
        "transform stage done"
    );

    // Linearize.
    let linearized: Vec<OnceLock<RasterizableGeometry>> =
        geometries.iter().map(|_| OnceLock::new()).collect();
    {
        let frames: &WorkerSlots<FrameArena> = frames;
        let tasks: &WorkerSlots<TaskArena> = tasks;
        dispatcher.parallel_for(geometries.len(), |worker, range| {
            let mut frame = frames.lock(worker);
            let mut task = tasks.lock(worker);
            for i in range {
                if visible[i].get() != Some(&true) {
                    continue;
                }
                let g = &geometries[i];
                let out = Linearizer::linearize(g, matrix, &bounds, &mut frame, &mut task);
                task.clear();
                if let Some(out) = out {
                    let _ = linearized[i].set(RasterizableGeometry {
                        worker,
                        window: out.window,
                        pixel_left: out.window.pixel_left(),
                        pixel_width: out.window.columns * TILE_WIDTH,
                        encoding: out.encoding,
                        rows: out.rows,
                        color: g.color,
                        fill_rule: g.fill_rule,
                    });
                }
            }
        });
    }
    tracing::debug!(
        rasterizable = linearized.iter().filter(|g| g.get().is_some()).count(),
        "linearize stage done"
    );

    let frame_views = frames.views();

    // Bucket.
    let worklists: Vec<OnceLock<Vec<RowItem>>> = (0..tile_rows).map(|_| OnceLock::new()).collect();
    dispatcher.parallel_for(tile_rows, |_, range| {
        let mut local: Vec<Vec<RowItem>> = vec![Vec::new(); range.len()];
        for (index, slot) in linearized.iter().enumerate() {
            let Some(g) = slot.get() else {
                continue;
            };
            let frame = frame_views[g.worker];
            let first = range.start.max(g.window.y as usize);
            let end = range.end.min(g.window.end_row() as usize);
            for row in first..end {
                if g.row(frame, row).has_content() {
                    local[row - range.start].push(RowItem {
                        geometry: index as u32,
                        row: row as u32,
                    });
                }
            }
        }
        for (offset, items) in local.into_iter().enumerate() {
            let _ = worklists[range.start + offset].set(items);
        }
    });
    tracing::debug!(
        rows_with_work = worklists
            .iter()
            .filter(|w| w.get().is_some_and(|items| !items.is_empty()))
            .count(),
        "bucket stage done"
    );

    // Rasterize rows.
    let bands = WorkerSlots::from_vec(destination.tile_row_bands());
    {
        let tasks: &WorkerSlots<TaskArena> = tasks;
        dispatcher.parallel_for(tile_rows, |worker, range| {
            let mut task = tasks.lock(worker);
            for row in range {
                let Some(items) = worklists[row].get() else {
                    continue;
                };
                if items.is_empty() {
                    continue;
                }
                let lines = (image_height - row as i32 * TILE_HEIGHT).min(TILE_HEIGHT) as usize;
                let mut band = bands.lock(row);
                rasterize_row(
                    kernel,
                    items,
                    &linearized,
                    &frame_views,
                    &mut task,
                    &mut band,
                    RowGeometry {
                        stride,
                        image_width,
                        lines,
                        scratch_width,
                    },
                );
                task.clear();
            }
        });
    }

    drop(frame_views);
    frames.for_each_mut(FrameArena::clear);
}

#[derive(Debug, Clone, Copy)]
struct RowGeometry {
    stride: usize,
    image_width: i32,
    lines: usize,
    scratch_width: usize,
}

fn rasterize_row<K: SpanKernel>(
    kernel: &K,
    items: &[RowItem],
    linearized: &[OnceLock<RasterizableGeometry>],
    frames: &[&FrameArena],
    task: &mut TaskArena,
    band: &mut [u8],
    layout: RowGeometry,
) {
    let bits_span = task.bits.alloc(CoverageAccumulator::bit_len(layout.scratch_width), 0);
    let cells_span = task.cells.alloc(CoverageAccumulator::cell_len(layout.scratch_width), 0);
    let TaskArena { bits, cells, .. } = task;
    let bits = bits.get_mut(bits_span);
    let cells = cells.get_mut(cells_span);

    for item in items {
        let Some(g) = linearized[item.geometry as usize].get() else {
            continue;
        };
        let frame = frames[g.worker];
        let row_lines = g.row(frame, item.row as usize);
        let width = g.pixel_width as usize;

        let mut coverage = CoverageAccumulator::new(width, &mut *bits, &mut *cells);
        for line in frame.lines(g.encoding, row_lines) {
            coverage.add_line(&line);
        }
        let touched = if row_lines.count > 0 {
            let begin = row_lines.first_column as usize * TILE_WIDTH as usize;
            let end = (row_lines.last_column as usize + 1) * TILE_WIDTH as usize + 1;
            begin..end.min(width + 1)
        } else {
            0..0
        };
        let visible_width = width.min((layout.image_width - g.pixel_left) as usize);
        let mut target = RowTarget::new(
            band,
            layout.stride,
            g.pixel_left as usize,
            visible_width,
            layout.lines,
        );
        composite_row(
            kernel,
            &mut coverage,
            frame.start_cover(row_lines),
            touched,
            &mut target,
            g.color,
            g.fill_rule,
        );
        debug_assert!(coverage.is_clear());
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::ScalarKernel;
    use crate::executor::ExecutorConfig;

    const RED: Rgba8 = Rgba8::new(255, 0, 0, 255);
    const BLUE: Rgba8 = Rgba8::new(0, 0, 255, 255);

    fn render(geometries: &[Geometry], width: u32, height: u32) -> ImageBuffer {
        let mut img = ImageBuffer::new(width, height).unwrap();
        let mut ex = TaskExecutor::serial();
        rasterize(geometries, &Matrix::IDENTITY, &mut ex, &mut img);
        img
    }

    #[test]
    fn test_empty_input_is_noop() {
        let img = render(&[], 8, 8);
        assert!(img.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_overlapping_rectangles() {
        let img = render(
            &[
                Geometry::rect(0.0, 0.0, 10.0, 10.0, RED),
                Geometry::rect(5.0, 5.0, 15.0, 15.0, BLUE),
            ],
            20,
            20,
        );
        assert_eq!(img.pixel(2, 2), RED);
        assert_eq!(img.pixel(7, 7), BLUE);
        assert_eq!(img.pixel(12, 12), BLUE);
        assert_eq!(img.pixel(2, 12), Rgba8::TRANSPARENT);
        assert_eq!(img.pixel(10, 2), Rgba8::TRANSPARENT);
    }

    #[test]
    fn test_rect_spanning_tiles() {
        let img = render(&[Geometry::rect(3.0, 5.0, 40.0, 37.0, RED)], 48, 48);
        for y in 0..48 {
            for x in 0..48 {
                let inside = (3..40).contains(&x) && (5..37).contains(&y);
                let expected = if inside { RED } else { Rgba8::TRANSPARENT };
                assert_eq!(img.pixel(x, y), expected, "({x}, {y})");
            }
        }
    }

    #[test]
    fn test_partially_outside_rect() {
        let img = render(&[Geometry::rect(-20.0, -7.0, 9.0, 50.0, BLUE)], 30, 20);
        assert_eq!(img.pixel(0, 0), BLUE);
        assert_eq!(img.pixel(8, 19), BLUE);
        assert_eq!(img.pixel(9, 10), Rgba8::TRANSPARENT);
    }

    #[test]
    fn test_fully_left_of_image_is_culled() {
        let img = render(&[Geometry::rect(-20.0, 0.0, -5.0, 10.0, BLUE)], 16, 16);
        assert!(img.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_global_matrix_applies() {
        let mut img = ImageBuffer::new(32, 32).unwrap();
        let mut ex = TaskExecutor::serial();
        let m = Matrix::new_translation(16.0, 16.0);
        rasterize(&[Geometry::rect(0.0, 0.0, 4.0, 4.0, RED)], &m, &mut ex, &mut img);
        assert_eq!(img.pixel(17, 17), RED);
        assert_eq!(img.pixel(2, 2), Rgba8::TRANSPARENT);
    }

    #[test]
    fn test_frame_arena_released() {
        let mut img = ImageBuffer::new(64, 64).unwrap();
        let mut ex = TaskExecutor::serial();
        let shapes: Vec<Geometry> = (0..10)
            .map(|i| Geometry::rect(i as f64, 1.0, 50.0 + i as f64, 60.0, RED))
            .collect();
        rasterize(&shapes, &Matrix::IDENTITY, &mut ex, &mut img);
        assert_eq!(ex.frame_blocks_used(), (0, 0));
    }

    #[test]
    fn test_scalar_and_packed_pipelines_agree() {
        let shapes = vec![
            Geometry::rect(1.25, 2.5, 30.75, 20.1, Rgba8::new(100, 20, 0, 128)),
            Geometry::rect(10.3, 0.0, 18.9, 31.0, Rgba8::new(0, 60, 60, 200)),
        ];
        let mut a = ImageBuffer::new(32, 32).unwrap();
        let mut b = ImageBuffer::new(32, 32).unwrap();
        let mut ex = TaskExecutor::new(&ExecutorConfig::with_threads(2)).unwrap();
        rasterize_with_kernel(&shapes, &Matrix::IDENTITY, &mut ex, &mut a, &ScalarKernel);
        rasterize_with_kernel(&shapes, &Matrix::IDENTITY, &mut ex, &mut b, &PackedKernel);
        assert_eq!(a, b);
    }
}
