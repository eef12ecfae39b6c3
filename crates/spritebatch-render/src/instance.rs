//! Flattening of batched draw requests into GPU instance records.
//!
//! Each batch's records occupy a contiguous range of the output array, starting
//! at the running sum of the preceding batches' lengths. The parallel path
//! splits those ranges into chunks and hands every chunk its own `&mut` slice,
//! so workers never share an output element.

use glam::{Mat4, Quat, Vec3};
use spritebatch_core::TaskPool;
use spritebatch_core::math::{GpuMat4, to_gpu};
use spritebatch_core::profiling::profile_function;

use crate::batch::DrawRequest;
use crate::sprite::BoundingBox;

/// Per-instance data read by the vertex stage from the instance storage buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRecord {
    pub model: GpuMat4,
    pub bounds: BoundingBox,
}

static_assertions::const_assert_eq!(std::mem::size_of::<InstanceRecord>(), 80);

impl InstanceRecord {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    pub fn from_request(request: &DrawRequest) -> Self {
        Self {
            model: to_gpu(model_matrix(request)),
            bounds: request.bounds,
        }
    }
}

impl Default for InstanceRecord {
    fn default() -> Self {
        bytemuck::Zeroable::zeroed()
    }
}

/// Scale, then rotate around Z, then translate.
pub fn model_matrix(request: &DrawRequest) -> Mat4 {
    Mat4::from_scale_rotation_translation(
        Vec3::new(request.scale.x, request.scale.y, 1.0),
        Quat::from_rotation_z(request.rotation),
        request.position.extend(0.0),
    )
}

/// One chunk of one batch, bound to its slice of the instance array.
#[derive(Debug)]
pub struct AssemblyTask<'a> {
    requests: &'a [DrawRequest],
    start: usize,
    batch_base: usize,
    out: &'a mut [InstanceRecord],
}

impl<'a> AssemblyTask<'a> {
    /// `out` receives `requests[start..start + out.len()]`; `batch_base` is the
    /// batch's offset in the full instance array.
    pub fn new(
        requests: &'a [DrawRequest],
        start: usize,
        batch_base: usize,
        out: &'a mut [InstanceRecord],
    ) -> Self {
        debug_assert!(start + out.len() <= requests.len());
        Self {
            requests,
            start,
            batch_base,
            out,
        }
    }

    /// Range of the full instance array this task writes.
    pub fn output_range(&self) -> std::ops::Range<usize> {
        let first = self.batch_base + self.start;
        first..first + self.out.len()
    }

    pub fn run(self) {
        let end = self.start + self.out.len();
        for (record, request) in self.out.iter_mut().zip(&self.requests[self.start..end]) {
            *record = InstanceRecord::from_request(request);
        }
    }
}

/// Summary of one assembly pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Assembly {
    /// Records written, starting at index 0.
    pub instances: usize,
    /// Tasks dispatched; 0 for the single-threaded path.
    pub tasks: usize,
}

/// Write every request of every batch into `out`, in order, on the calling thread.
///
/// # Panics
///
/// Panics if `out` is shorter than the total request count.
pub fn assemble_single<'b, I>(batches: I, out: &mut [InstanceRecord]) -> Assembly
where
    I: IntoIterator<Item = &'b [DrawRequest]>,
{
    profile_function!();

    let mut written = 0;
    for requests in batches {
        let end = written + requests.len();
        for (record, request) in out[written..end].iter_mut().zip(requests) {
            *record = InstanceRecord::from_request(request);
        }
        written = end;
    }

    Assembly {
        instances: written,
        tasks: 0,
    }
}

/// Same output as [`assemble_single`], computed as chunks of at most
/// `chunk_size` requests spread over `pool`. Returns once every chunk is written.
///
/// # Panics
///
/// Panics if `chunk_size` is 0 or `out` is shorter than the total request count.
pub fn assemble_parallel<'b, I>(
    pool: &TaskPool,
    batches: I,
    out: &mut [InstanceRecord],
    chunk_size: usize,
) -> Assembly
where
    I: Iterator<Item = &'b [DrawRequest]> + Clone + Send,
{
    profile_function!();
    assert!(chunk_size > 0, "chunk size must be at least 1");

    let (instances, tasks) = batches.clone().fold((0, 0), |(instances, tasks), requests| {
        (instances + requests.len(), tasks + requests.len().div_ceil(chunk_size))
    });
    assert!(
        instances <= out.len(),
        "{instances} instances do not fit in an array of {}",
        out.len()
    );

    let jobs = batches
        .scan((0usize, &mut out[..instances]), |(base, rest), requests| {
            let batch_base = *base;
            let (batch_out, tail) = std::mem::take(rest).split_at_mut(requests.len());
            *rest = tail;
            *base += requests.len();
            Some((requests, batch_base, batch_out))
        })
        .flat_map(move |(requests, batch_base, batch_out)| {
            batch_out
                .chunks_mut(chunk_size)
                .enumerate()
                .map(move |(chunk, out)| {
                    AssemblyTask::new(requests, chunk * chunk_size, batch_base, out)
                })
        });

    pool.for_each(jobs, tasks, AssemblyTask::run);

    Assembly { instances, tasks }
}
