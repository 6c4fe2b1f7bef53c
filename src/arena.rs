//! Index-based arena allocators.
//!
//! Three allocators serve the pipeline:
//!
//! - [`Arena<T>`]: a bump allocator over large blocks that hands out typed
//!   [`Span`] handles. `clear()` recycles every block in O(block count).
//! - [`BlockPool<B>`]: a pool of fixed-capacity blocks of one type, used for
//!   the tile line store.
//! - [`TaskArena`]: the per-worker scratch arena reset after every unit of
//!   work (one geometry in the linearize stage, one tile row in the
//!   rasterize stage).
//!
//! Handles are plain indices, so blocks can move (the block list is a
//! `Vec`) without invalidating anything.

use core::marker::PhantomData;

/// Smallest arena block, in bytes.
pub const ARENA_BLOCK_MIN_BYTES: usize = 128 * 1024;
/// Arena blocks are sized in multiples of this, in bytes.
pub const ARENA_BLOCK_ALIGN_BYTES: usize = 32 * 1024;
/// Blocks added to a [`BlockPool`] when it runs dry.
pub const POOL_GROWTH: usize = 32;

// ============================================================================
// Span
// ============================================================================

/// Handle to `len` consecutive values inside one arena block.
pub struct Span<T> {
    block: u32,
    start: u32,
    len: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Span<T> {
    pub const EMPTY: Span<T> = Span {
        block: 0,
        start: 0,
        len: 0,
        _marker: PhantomData,
    };

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Clone for Span<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Span<T> {}

impl<T> PartialEq for Span<T> {
    fn eq(&self, other: &Self) -> bool {
        self.block == other.block && self.start == other.start && self.len == other.len
    }
}

impl<T> Eq for Span<T> {}

impl<T> core::fmt::Debug for Span<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Span")
            .field("block", &self.block)
            .field("start", &self.start)
            .field("len", &self.len)
            .finish()
    }
}

// ============================================================================
// Arena
// ============================================================================

/// Bump allocator over typed blocks.
///
/// Each block is a `Vec<T>` created with a fixed capacity and never grown
/// past it; its length is the bump cursor.
pub struct Arena<T: Copy> {
    blocks: Vec<Vec<T>>,
    active: Vec<u32>,
    free: Vec<u32>,
}

impl<T: Copy> Arena<T> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            active: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Element capacity of a fresh block able to hold `len` values.
    fn block_capacity(len: usize) -> usize {
        let elem = core::mem::size_of::<T>().max(1);
        let bytes = len.saturating_mul(elem);
        let rounded = bytes.div_ceil(ARENA_BLOCK_ALIGN_BYTES) * ARENA_BLOCK_ALIGN_BYTES;
        rounded.max(ARENA_BLOCK_MIN_BYTES) / elem
    }

    /// Allocate `len` values initialised to `value`.
    pub fn alloc(&mut self, len: usize, value: T) -> Span<T> {
        if len == 0 {
            return Span::EMPTY;
        }
        let block = match self.active.last() {
            Some(&b) if room(&self.blocks[b as usize]) >= len => b,
            _ => self.acquire(len),
        };
        let storage = &mut self.blocks[block as usize];
        let start = storage.len();
        storage.resize(start + len, value);
        Span {
            block,
            start: start as u32,
            len: len as u32,
            _marker: PhantomData,
        }
    }

    /// Move a block with room for `len` values onto the active list.
    fn acquire(&mut self, len: usize) -> u32 {
        let reusable = self
            .free
            .iter()
            .position(|&b| self.blocks[b as usize].capacity() >= len);
        let block = match reusable {
            Some(i) => {
                let b = self.free.swap_remove(i);
                self.blocks[b as usize].clear();
                b
            }
            None => {
                self.blocks
                    .push(Vec::with_capacity(Self::block_capacity(len)));
                (self.blocks.len() - 1) as u32
            }
        };
        self.active.push(block);
        block
    }

    #[inline]
    pub fn get(&self, span: Span<T>) -> &[T] {
        if span.len == 0 {
            return &[];
        }
        let start = span.start as usize;
        &self.blocks[span.block as usize][start..start + span.len as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, span: Span<T>) -> &mut [T] {
        if span.len == 0 {
            return &mut [];
        }
        let start = span.start as usize;
        &mut self.blocks[span.block as usize][start..start + span.len as usize]
    }

    /// Recycle every active block. Outstanding spans become invalid.
    pub fn clear(&mut self) {
        self.free.append(&mut self.active);
    }

    /// Number of blocks owned, active or free.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Number of blocks currently handing out allocations.
    pub fn active_block_count(&self) -> usize {
        self.active.len()
    }
}

impl<T: Copy> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
#[allow(clippy::ptr_arg)]
fn room<T>(storage: &Vec<T>) -> usize {
    storage.capacity() - storage.len()
}

// ============================================================================
// BlockPool
// ============================================================================

/// Index of a block inside a [`BlockPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockId(u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A block type that can be recycled in place.
pub trait PooledBlock: Default {
    /// Return the block to its freshly created state, keeping its storage.
    fn reset(&mut self);
}

/// Pool of fixed-capacity blocks of a single type.
///
/// Blocks are never freed; `clear()` rewinds the used count so the next
/// frame reuses them.
pub struct BlockPool<B: PooledBlock> {
    blocks: Vec<B>,
    used: usize,
}

impl<B: PooledBlock> BlockPool<B> {
    pub fn new() -> Self {
        Self {
            blocks: Vec::new(),
            used: 0,
        }
    }

    /// Hand out a reset block.
    pub fn alloc(&mut self) -> BlockId {
        if self.used == self.blocks.len() {
            self.blocks.reserve(POOL_GROWTH);
            self.blocks.extend((0..POOL_GROWTH).map(|_| B::default()));
        }
        let id = self.used;
        self.used += 1;
        self.blocks[id].reset();
        BlockId(id as u32)
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> &B {
        &self.blocks[id.index()]
    }

    #[inline]
    pub fn get_mut(&mut self, id: BlockId) -> &mut B {
        &mut self.blocks[id.index()]
    }

    pub fn clear(&mut self) {
        self.used = 0;
    }

    /// Blocks handed out since the last `clear()`.
    pub fn used(&self) -> usize {
        self.used
    }

    /// Blocks owned by the pool.
    pub fn capacity(&self) -> usize {
        self.blocks.len()
    }
}

impl<B: PooledBlock> Default for BlockPool<B> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TaskArena
// ============================================================================

/// Per-worker scratch memory, cleared after each unit of work.
#[derive(Default)]
pub struct TaskArena {
    /// Transformed path points.
    pub points: Arena<[f64; 2]>,
    /// Coverage bit vectors.
    pub bits: Arena<u64>,
    /// Coverage cells, cover and area halves.
    pub cells: Arena<i32>,
}

impl TaskArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.bits.clear();
        self.cells.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        values: Vec<u32>,
        resets: u32,
    }

    impl PooledBlock for Counter {
        fn reset(&mut self) {
            self.values.clear();
            self.resets += 1;
        }
    }

    #[test]
    fn test_alloc_and_access() {
        let mut arena = Arena::<i32>::new();
        let a = arena.alloc(4, 7);
        let b = arena.alloc(3, -1);
        assert_eq!(arena.get(a), &[7, 7, 7, 7]);
        arena.get_mut(b)[1] = 5;
        assert_eq!(arena.get(b), &[-1, 5, -1]);
        assert_eq!(arena.get(a), &[7, 7, 7, 7]);
        assert_eq!(arena.block_count(), 1);
    }

    #[test]
    fn test_empty_span() {
        let mut arena = Arena::<u64>::new();
        let s = arena.alloc(0, 1);
        assert!(s.is_empty());
        assert!(arena.get(s).is_empty());
        assert_eq!(arena.block_count(), 0);
    }

    #[test]
    fn test_block_sizing() {
        let elems_per_min_block = ARENA_BLOCK_MIN_BYTES / 4;
        assert_eq!(Arena::<i32>::block_capacity(1), elems_per_min_block);
        // 129 KiB of i32 rounds up to 160 KiB.
        let len = 129 * 1024 / 4;
        assert_eq!(Arena::<i32>::block_capacity(len), 160 * 1024 / 4);
    }

    #[test]
    fn test_new_block_when_full() {
        let mut arena = Arena::<u8>::new();
        let a = arena.alloc(ARENA_BLOCK_MIN_BYTES - 10, 0);
        let b = arena.alloc(20, 1);
        assert_eq!(arena.block_count(), 2);
        assert_eq!(arena.get(a).len(), ARENA_BLOCK_MIN_BYTES - 10);
        assert_eq!(arena.get(b), &[1u8; 20]);
    }

    #[test]
    fn test_clear_reuses_blocks() {
        let mut arena = Arena::<i32>::new();
        for _ in 0..3 {
            arena.alloc(ARENA_BLOCK_MIN_BYTES / 4, 0);
        }
        assert_eq!(arena.block_count(), 3);
        for _ in 0..5 {
            arena.clear();
            assert_eq!(arena.active_block_count(), 0);
            for _ in 0..3 {
                arena.alloc(ARENA_BLOCK_MIN_BYTES / 4, 0);
            }
            assert_eq!(arena.block_count(), 3);
        }
    }

    #[test]
    fn test_oversized_request_gets_own_block() {
        let mut arena = Arena::<u8>::new();
        arena.alloc(16, 0);
        arena.clear();
        let big = arena.alloc(ARENA_BLOCK_MIN_BYTES * 2, 3);
        assert_eq!(arena.get(big).len(), ARENA_BLOCK_MIN_BYTES * 2);
        assert_eq!(arena.block_count(), 2);
    }

    #[test]
    fn test_pool_grows_and_rewinds() {
        let mut pool = BlockPool::<Counter>::new();
        let first = pool.alloc();
        pool.get_mut(first).values.push(9);
        assert_eq!(pool.capacity(), POOL_GROWTH);
        for _ in 1..POOL_GROWTH + 1 {
            pool.alloc();
        }
        assert_eq!(pool.capacity(), 2 * POOL_GROWTH);
        pool.clear();
        assert_eq!(pool.used(), 0);
        let again = pool.alloc();
        assert_eq!(again, first);
        assert!(pool.get(again).values.is_empty());
        assert_eq!(pool.get(again).resets, 2);
        assert_eq!(pool.capacity(), 2 * POOL_GROWTH);
    }

    #[test]
    fn test_task_arena_clear() {
        let mut task = TaskArena::new();
        task.points.alloc(8, [0.0, 0.0]);
        task.bits.alloc(8, 0);
        task.cells.alloc(8, 0);
        task.clear();
        assert_eq!(task.points.active_block_count(), 0);
        assert_eq!(task.bits.active_block_count(), 0);
        assert_eq!(task.cells.active_block_count(), 0);
    }
}
