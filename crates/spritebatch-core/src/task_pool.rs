//! Scoped worker pool for short fan-out jobs.
//!
//! Jobs may borrow from the caller's stack (typically disjoint `&mut` slices of
//! one output array), so workers are scoped threads joined before
//! [`TaskPool::for_each`] returns. Workers do not outlive a call: every
//! parallel `for_each` spawns and joins its threads again.

use parking_lot::Mutex;
use std::thread;

/// A fixed-width pool of scoped worker threads.
///
/// # Example
///
/// ```
/// use spritebatch_core::TaskPool;
///
/// let pool = TaskPool::new(4);
/// let mut out = vec![0u32; 10];
///
/// let jobs = out.chunks_mut(3).enumerate();
/// pool.for_each(jobs, 4, |(chunk, slice)| {
///     for value in slice.iter_mut() {
///         *value = chunk as u32;
///     }
/// });
///
/// assert_eq!(out, [0, 0, 0, 1, 1, 1, 2, 2, 2, 3]);
/// ```
#[derive(Debug, Clone)]
pub struct TaskPool {
    num_threads: usize,
}

impl TaskPool {
    /// Create a new task pool with the specified number of threads.
    ///
    /// The calling thread counts as one of them.
    ///
    /// # Panics
    ///
    /// Panics if num_threads is 0.
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "TaskPool must have at least one thread");
        tracing::debug!("TaskPool created with {} threads", num_threads);
        Self { num_threads }
    }

    /// Create a task pool using the number of available CPU cores.
    pub fn with_num_cpus() -> Self {
        Self::new(num_cpus::get())
    }

    /// Uses max(1, num_cpus - 1) to leave one core free for the main thread.
    pub fn default_threads() -> Self {
        Self::new(crate::config::default_worker_threads())
    }

    /// Get the number of threads in this pool.
    pub fn thread_count(&self) -> usize {
        self.num_threads
    }

    /// OS threads a [`for_each`](Self::for_each) call over `job_count` jobs
    /// spawns. The caller runs jobs too, so this is one less than the fan-out.
    pub fn spawned_threads(&self, job_count: usize) -> usize {
        self.num_threads.min(job_count).saturating_sub(1)
    }

    /// Run `f` on every job and block until all of them are done.
    ///
    /// `job_count` is the number of jobs `jobs` yields; it only sizes the
    /// fan-out. Jobs are pulled from a shared queue so uneven jobs balance
    /// out. The calling thread drains the queue too, so all jobs complete
    /// even when no extra worker could be spawned.
    ///
    /// Each call spawns and joins [`spawned_threads`](Self::spawned_threads)
    /// OS threads. A caller running once per frame pays that every frame, so
    /// jobs should be large enough to amortise it.
    pub fn for_each<I, F>(&self, jobs: I, job_count: usize, f: F)
    where
        I: Iterator + Send,
        I::Item: Send,
        F: Fn(I::Item) + Sync,
    {
        let spawned = self.spawned_threads(job_count);
        if spawned == 0 {
            jobs.for_each(f);
            return;
        }

        let queue = Mutex::new(jobs);
        let drain = || {
            loop {
                let job = queue.lock().next();
                match job {
                    Some(job) => f(job),
                    None => break,
                }
            }
        };

        thread::scope(|scope| {
            for index in 1..=spawned {
                let worker = thread::Builder::new()
                    .name(format!("spritebatch-worker-{}", index))
                    .spawn_scoped(scope, &drain);
                if let Err(e) = worker {
                    tracing::warn!("Failed to spawn worker thread: {}", e);
                    break;
                }
            }
            drain();
        });
    }
}

impl Default for TaskPool {
    fn default() -> Self {
        Self::default_threads()
    }
}
