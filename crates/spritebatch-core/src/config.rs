use std::time::Duration;

/// Capacity and threading configuration for a sprite renderer.
///
/// Every capacity is allocated up front when the renderer is built and never
/// grows afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Distinct sprites that can be batched in one frame.
    pub max_batches: usize,
    /// Draw requests a single sprite's batch can hold.
    pub max_draws_per_batch: usize,
    /// Instance records per frame. Also the per-frame draw limit.
    pub max_instances: usize,
    /// Threads used by multithreaded instance assembly, caller included.
    pub worker_threads: usize,
    /// Upper bound on the per-frame fence wait. `None` waits forever.
    pub fence_timeout: Option<Duration>,
    /// Reserve every batch's request storage at construction instead of the
    /// first time a slot is claimed. Costs `max_batches * max_draws_per_batch`
    /// requests of memory up front.
    pub reserve_batches: bool,
}

impl RendererConfig {
    pub const DEFAULT_MAX_BATCHES: usize = 1000;
    pub const DEFAULT_MAX_DRAWS_PER_BATCH: usize = 10_000;
    pub const DEFAULT_MAX_INSTANCES: usize = 10_000;
    pub const DEFAULT_FENCE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn with_max_batches(mut self, max_batches: usize) -> Self {
        self.max_batches = max_batches;
        self
    }

    pub fn with_max_draws_per_batch(mut self, max_draws_per_batch: usize) -> Self {
        self.max_draws_per_batch = max_draws_per_batch;
        self
    }

    pub fn with_max_instances(mut self, max_instances: usize) -> Self {
        self.max_instances = max_instances;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_fence_timeout(mut self, fence_timeout: Option<Duration>) -> Self {
        self.fence_timeout = fence_timeout;
        self
    }

    pub fn with_reserved_batches(mut self, reserve_batches: bool) -> Self {
        self.reserve_batches = reserve_batches;
        self
    }

    /// Check that every capacity can hold at least one element.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("max_batches", self.max_batches),
            ("max_draws_per_batch", self.max_draws_per_batch),
            ("max_instances", self.max_instances),
            ("worker_threads", self.worker_threads),
        ];
        match fields.iter().find(|(_, value)| *value == 0) {
            Some((field, _)) => Err(ConfigError::Zero { field: *field }),
            None => Ok(()),
        }
    }
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_batches: Self::DEFAULT_MAX_BATCHES,
            max_draws_per_batch: Self::DEFAULT_MAX_DRAWS_PER_BATCH,
            max_instances: Self::DEFAULT_MAX_INSTANCES,
            worker_threads: default_worker_threads(),
            fence_timeout: Some(Self::DEFAULT_FENCE_TIMEOUT),
            reserve_batches: false,
        }
    }
}

/// Leave one core for the thread that drives rendering.
pub fn default_worker_threads() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be at least 1")]
    Zero { field: &'static str },
}
