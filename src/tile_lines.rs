//! Tile line store.
//!
//! Linearized geometry is kept per tile row as a chain of small
//! struct-of-arrays blocks holding 24.8 line segments. x is relative to the
//! geometry's window left edge and y is relative to the top of the tile row,
//! so y always lies in `0..=TILE_HEIGHT_FIXED`.
//!
//! Two block encodings exist. Narrow blocks store x as `u16` and are used
//! when the whole window fits in 255 pixels; wide blocks store `i32`. Each
//! block carries at most 1024 bytes of payload.
//!
//! Every row may also own a start-cover table: the cover entering the window
//! from the left on each of its scanlines. Rows without one read
//! [`ZERO_START_COVER`].

use crate::arena::{Arena, BlockId, BlockPool, PooledBlock, Span};
use crate::basics::{TILE_HEIGHT, TILE_HEIGHT_FIXED};

/// Payload bytes per line block.
pub const LINE_BLOCK_BYTES: usize = 1024;

/// Start cover for rows that receive no contribution from the left.
pub const ZERO_START_COVER: [i32; TILE_HEIGHT as usize] = [0; TILE_HEIGHT as usize];

// ============================================================================
// LineSegment
// ============================================================================

/// A row-local line segment in 24.8 units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LineSegment {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
}

impl LineSegment {
    #[inline]
    pub const fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

// ============================================================================
// Encodings
// ============================================================================

/// Storage type for the x coordinates of a line block.
pub trait LineCoord: Copy + Default {
    /// Segments per block.
    const BLOCK_CAPACITY: usize;

    fn encode(x: i32) -> Self;
    fn decode(self) -> i32;
}

impl LineCoord for u16 {
    const BLOCK_CAPACITY: usize = LINE_BLOCK_BYTES / (2 * 2 + 2 * 2);

    #[inline]
    fn encode(x: i32) -> Self {
        debug_assert!((0..=u16::MAX as i32).contains(&x));
        x as u16
    }

    #[inline]
    fn decode(self) -> i32 {
        self as i32
    }
}

impl LineCoord for i32 {
    const BLOCK_CAPACITY: usize = LINE_BLOCK_BYTES / (2 * 4 + 2 * 2);

    #[inline]
    fn encode(x: i32) -> Self {
        x
    }

    #[inline]
    fn decode(self) -> i32 {
        self
    }
}

/// Which block type holds a geometry's lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEncoding {
    Narrow,
    Wide,
}

impl LineEncoding {
    /// Pick the encoding for a window `pixel_width` pixels wide.
    pub fn for_width(pixel_width: i32) -> Self {
        if pixel_width <= u16::MAX as i32 >> crate::basics::SUBPIXEL_SHIFT {
            LineEncoding::Narrow
        } else {
            LineEncoding::Wide
        }
    }
}

/// Struct-of-arrays block of line segments.
pub struct LineBlock<X: LineCoord> {
    x0: Vec<X>,
    y0: Vec<u16>,
    x1: Vec<X>,
    y1: Vec<u16>,
    next: Option<BlockId>,
}

impl<X: LineCoord> LineBlock<X> {
    #[inline]
    pub fn len(&self) -> usize {
        self.x0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x0.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.x0.len() == X::BLOCK_CAPACITY
    }

    #[inline]
    pub fn next(&self) -> Option<BlockId> {
        self.next
    }

    #[inline]
    fn push(&mut self, line: &LineSegment) {
        debug_assert!(!self.is_full());
        self.x0.push(X::encode(line.x0));
        self.y0.push(line.y0 as u16);
        self.x1.push(X::encode(line.x1));
        self.y1.push(line.y1 as u16);
    }

    #[inline]
    pub fn line(&self, i: usize) -> LineSegment {
        LineSegment {
            x0: self.x0[i].decode(),
            y0: self.y0[i] as i32,
            x1: self.x1[i].decode(),
            y1: self.y1[i] as i32,
        }
    }
}

impl<X: LineCoord> Default for LineBlock<X> {
    fn default() -> Self {
        Self {
            x0: Vec::with_capacity(X::BLOCK_CAPACITY),
            y0: Vec::with_capacity(X::BLOCK_CAPACITY),
            x1: Vec::with_capacity(X::BLOCK_CAPACITY),
            y1: Vec::with_capacity(X::BLOCK_CAPACITY),
            next: None,
        }
    }
}

impl<X: LineCoord> PooledBlock for LineBlock<X> {
    fn reset(&mut self) {
        self.x0.clear();
        self.y0.clear();
        self.x1.clear();
        self.y1.clear();
        self.next = None;
    }
}

pub type NarrowBlock = LineBlock<u16>;
pub type WideBlock = LineBlock<i32>;

// ============================================================================
// RowLines
// ============================================================================

/// Lines and start cover of one tile row of one geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RowLines {
    /// Most recently filled block; older blocks follow through `next`.
    pub front: Option<BlockId>,
    pub count: u32,
    pub start_cover: Option<Span<i32>>,
    /// Inclusive tile-column range touched by the stored lines.
    pub first_column: u16,
    pub last_column: u16,
}

impl RowLines {
    /// Whether the row contributes anything to the image.
    #[inline]
    pub fn has_content(&self) -> bool {
        self.count > 0 || self.start_cover.is_some()
    }

    fn touch_column(&mut self, column: u16) {
        if self.count == 0 {
            self.first_column = column;
            self.last_column = column;
        } else {
            self.first_column = self.first_column.min(column);
            self.last_column = self.last_column.max(column);
        }
    }
}

// ============================================================================
// FrameArena
// ============================================================================

/// Per-worker storage living until the whole image is composited.
#[derive(Default)]
pub struct FrameArena {
    narrow: BlockPool<NarrowBlock>,
    wide: BlockPool<WideBlock>,
    covers: Arena<i32>,
    rows: Arena<RowLines>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate empty row descriptors for a window `count` tile rows tall.
    pub fn alloc_rows(&mut self, count: usize) -> Span<RowLines> {
        self.rows.alloc(count, RowLines::default())
    }

    #[inline]
    pub fn rows(&self, span: Span<RowLines>) -> &[RowLines] {
        self.rows.get(span)
    }

    /// Append a row-local segment to `row` of the window `rows`.
    ///
    /// `column` is the tile column, relative to the window, the segment lies in.
    pub fn push_line(
        &mut self,
        rows: Span<RowLines>,
        row: usize,
        column: u16,
        encoding: LineEncoding,
        line: LineSegment,
    ) {
        debug_assert!((0..=TILE_HEIGHT_FIXED).contains(&line.y0));
        debug_assert!((0..=TILE_HEIGHT_FIXED).contains(&line.y1));
        let row_lines = &mut self.rows.get_mut(rows)[row];
        match encoding {
            LineEncoding::Narrow => push_into(&mut self.narrow, row_lines, &line),
            LineEncoding::Wide => push_into(&mut self.wide, row_lines, &line),
        }
        row_lines.touch_column(column);
        row_lines.count += 1;
    }

    /// Add `cover` to scanline `line` of the start-cover table of `row`.
    pub fn add_start_cover(&mut self, rows: Span<RowLines>, row: usize, line: usize, cover: i32) {
        if cover == 0 {
            return;
        }
        let row_lines = &mut self.rows.get_mut(rows)[row];
        let table = match row_lines.start_cover {
            Some(t) => t,
            None => {
                let t = self.covers.alloc(TILE_HEIGHT as usize, 0);
                row_lines.start_cover = Some(t);
                t
            }
        };
        self.covers.get_mut(table)[line] += cover;
    }

    /// Start cover of `row`, or the shared zero table.
    #[inline]
    pub fn start_cover(&self, row: &RowLines) -> &[i32] {
        match row.start_cover {
            Some(t) => self.covers.get(t),
            None => &ZERO_START_COVER,
        }
    }

    /// Iterate the segments stored for `row`.
    pub fn lines(&self, encoding: LineEncoding, row: &RowLines) -> RowLineIter<'_> {
        match encoding {
            LineEncoding::Narrow => RowLineIter::Narrow(BlockChainIter::new(&self.narrow, row.front)),
            LineEncoding::Wide => RowLineIter::Wide(BlockChainIter::new(&self.wide, row.front)),
        }
    }

    /// Release everything allocated since the last clear.
    pub fn clear(&mut self) {
        self.narrow.clear();
        self.wide.clear();
        self.covers.clear();
        self.rows.clear();
    }

    /// Line blocks handed out since the last clear, per encoding.
    pub fn blocks_used(&self) -> (usize, usize) {
        (self.narrow.used(), self.wide.used())
    }
}

fn push_into<X: LineCoord>(
    pool: &mut BlockPool<LineBlock<X>>,
    row: &mut RowLines,
    line: &LineSegment,
) {
    let block = match row.front {
        Some(id) if !pool.get(id).is_full() => id,
        previous => {
            let id = pool.alloc();
            pool.get_mut(id).next = previous;
            row.front = Some(id);
            id
        }
    };
    pool.get_mut(block).push(line);
}

// ============================================================================
// Iteration
// ============================================================================

/// Walks a block chain front to back.
pub struct BlockChainIter<'a, X: LineCoord> {
    pool: &'a BlockPool<LineBlock<X>>,
    block: Option<BlockId>,
    index: usize,
}

impl<'a, X: LineCoord> BlockChainIter<'a, X> {
    fn new(pool: &'a BlockPool<LineBlock<X>>, front: Option<BlockId>) -> Self {
        Self {
            pool,
            block: front,
            index: 0,
        }
    }
}

impl<X: LineCoord> Iterator for BlockChainIter<'_, X> {
    type Item = LineSegment;

    fn next(&mut self) -> Option<LineSegment> {
        loop {
            let block = self.pool.get(self.block?);
            if self.index < block.len() {
                let line = block.line(self.index);
                self.index += 1;
                return Some(line);
            }
            self.block = block.next();
            self.index = 0;
        }
    }
}

/// Segments of one row, whatever the encoding.
pub enum RowLineIter<'a> {
    Narrow(BlockChainIter<'a, u16>),
    Wide(BlockChainIter<'a, i32>),
}

impl Iterator for RowLineIter<'_> {
    type Item = LineSegment;

    #[inline]
    fn next(&mut self) -> Option<LineSegment> {
        match self {
            RowLineIter::Narrow(it) => it.next(),
            RowLineIter::Wide(it) => it.next(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
