//! Task executor.
//!
//! A [`TaskExecutor`] runs index-range parallel-for loops either on the
//! calling thread alone or on the calling thread plus a fixed rayon pool.
//! Workers claim contiguous batches from a shared atomic cursor, so uneven
//! per-index cost balances itself. Every call is a hard barrier: it returns
//! only after all claimed batches have run.
//!
//! Each worker index owns one [`FrameArena`] and one [`TaskArena`]; nothing
//! allocated in them ever crosses to another worker while it is mutable.

use core::ops::Range;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::arena::TaskArena;
use crate::error::{RasterError, RasterResult};
use crate::tile_lines::FrameArena;

// ============================================================================
// Configuration
// ============================================================================

/// Executor settings.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Total worker count including the calling thread. `None` uses the
    /// available hardware parallelism.
    pub threads: Option<usize>,
    /// Indices claimed per cursor bump. `None` picks a size from the work
    /// count.
    pub batch_size: Option<usize>,
}

impl ExecutorConfig {
    /// Single-threaded configuration.
    pub fn serial() -> Self {
        Self {
            threads: Some(1),
            batch_size: None,
        }
    }

    pub fn with_threads(threads: usize) -> Self {
        Self {
            threads: Some(threads),
            batch_size: None,
        }
    }
}

// ============================================================================
// Worker slots
// ============================================================================

/// One value per slot index, each behind its own mutex.
///
/// A slot is only ever locked by the task that owns its index, so locking
/// never contends.
pub struct WorkerSlots<T> {
    slots: Vec<Mutex<T>>,
}

impl<T> WorkerSlots<T> {
    pub fn new(count: usize, mut make: impl FnMut() -> T) -> Self {
        Self {
            slots: (0..count).map(|_| Mutex::new(make())).collect(),
        }
    }

    pub fn from_vec(values: Vec<T>) -> Self {
        Self {
            slots: values.into_iter().map(Mutex::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    #[inline]
    pub fn lock(&self, index: usize) -> MutexGuard<'_, T> {
        self.slots[index].lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Shared views of every slot, without locking.
    pub fn views(&mut self) -> Vec<&T> {
        self.slots
            .iter_mut()
            .map(|m| &*m.get_mut().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for m in &mut self.slots {
            f(m.get_mut().unwrap_or_else(PoisonError::into_inner));
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

enum DispatchMode {
    Serial,
    Pool(rayon::ThreadPool),
}

/// Runs parallel-for loops; the scheduling half of a [`TaskExecutor`].
pub struct Dispatcher {
    mode: DispatchMode,
    workers: usize,
    batch_size: Option<usize>,
}

impl Dispatcher {
    /// Number of distinct worker indices passed to tasks.
    pub fn worker_count(&self) -> usize {
        self.workers
    }

    pub fn is_parallel(&self) -> bool {
        matches!(self.mode, DispatchMode::Pool(_))
    }

    fn batch_for(&self, count: usize) -> usize {
        match self.batch_size {
            Some(n) => n.min(count),
            None => (count / (self.workers * 4)).clamp(1, 64),
        }
    }

    /// Call `task(worker, range)` over disjoint ranges covering `0..count`
    /// and wait for all of them.
    pub fn parallel_for<F>(&self, count: usize, task: F)
    where
        F: Fn(usize, Range<usize>) + Sync,
    {
        if count == 0 {
            return;
        }
        match &self.mode {
            DispatchMode::Serial => task(0, 0..count),
            DispatchMode::Pool(pool) => {
                let batch = self.batch_for(count);
                let cursor = AtomicUsize::new(0);
                let run = |worker: usize| claim_batches(worker, count, batch, &cursor, &task);
                pool.in_place_scope(|scope| {
                    scope.spawn_broadcast(|_, ctx| run(ctx.index() + 1));
                    run(0);
                });
            }
        }
    }
}

fn claim_batches<F>(worker: usize, count: usize, batch: usize, cursor: &AtomicUsize, task: &F)
where
    F: Fn(usize, Range<usize>),
{
    loop {
        let start = cursor.fetch_add(batch, Ordering::Relaxed);
        if start >= count {
            break;
        }
        task(worker, start..start.saturating_add(batch).min(count));
    }
}

fn build_thread_pool(threads: usize) -> RasterResult<rayon::ThreadPool> {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("tileraster-worker-{i}"))
        .build()?;
    Ok(pool)
}

// ============================================================================
// TaskExecutor
// ============================================================================

/// Dispatcher plus the per-worker arenas it feeds.
pub struct TaskExecutor {
    dispatcher: Dispatcher,
    frames: WorkerSlots<FrameArena>,
    tasks: WorkerSlots<TaskArena>,
}

impl TaskExecutor {
    /// Build an executor. One worker runs serially on the calling thread;
    /// `n > 1` workers are the calling thread plus a pool of `n - 1`.
    pub fn new(config: &ExecutorConfig) -> RasterResult<Self> {
        if config.batch_size == Some(0) {
            return Err(RasterError::invalid_config(
                "executor 'batch_size' must be >= 1 when set",
            ));
        }
        let workers = match config.threads {
            Some(0) => {
                return Err(RasterError::invalid_config(
                    "executor 'threads' must be >= 1 when set",
                ))
            }
            Some(n) => n,
            None => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        };
        let mode = if workers == 1 {
            DispatchMode::Serial
        } else {
            DispatchMode::Pool(build_thread_pool(workers - 1)?)
        };
        tracing::info!(
            workers,
            parallel = workers > 1,
            batch_size = ?config.batch_size,
            "task executor ready"
        );
        Ok(Self {
            dispatcher: Dispatcher {
                mode,
                workers,
                batch_size: config.batch_size,
            },
            frames: WorkerSlots::new(workers, FrameArena::new),
            tasks: WorkerSlots::new(workers, TaskArena::new),
        })
    }

    /// Serial executor; never fails.
    pub fn serial() -> Self {
        Self {
            dispatcher: Dispatcher {
                mode: DispatchMode::Serial,
                workers: 1,
                batch_size: None,
            },
            frames: WorkerSlots::new(1, FrameArena::new),
            tasks: WorkerSlots::new(1, TaskArena::new),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.dispatcher.worker_count()
    }

    pub fn is_parallel(&self) -> bool {
        self.dispatcher.is_parallel()
    }

    /// See [`Dispatcher::parallel_for`].
    pub fn parallel_for<F>(&self, count: usize, task: F)
    where
        F: Fn(usize, Range<usize>) + Sync,
    {
        self.dispatcher.parallel_for(count, task);
    }

    /// Borrow the dispatcher and the arenas separately.
    pub(crate) fn parts(
        &mut self,
    ) -> (
        &Dispatcher,
        &mut WorkerSlots<FrameArena>,
        &mut WorkerSlots<TaskArena>,
    ) {
        (&self.dispatcher, &mut self.frames, &mut self.tasks)
    }

    /// Line blocks currently held by all frame arenas, narrow and wide.
    pub fn frame_blocks_used(&mut self) -> (usize, usize) {
        let mut total = (0, 0);
        self.frames.for_each_mut(|f| {
            let (n, w) = f.blocks_used();
            total.0 += n;
            total.1 += w;
        });
        total
    }
}

impl Default for TaskExecutor {
    fn default() -> Self {
        Self::serial()
    }
}

// ============================================================================
// Tests
// ============================================================================
