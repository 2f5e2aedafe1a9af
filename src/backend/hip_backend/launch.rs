//! Kernel launch geometry and the grid-stride execution loop
//!
//! A 1-D kernel is launched with `blocks(N)` blocks of `HIP_NUM_THREADS`
//! threads. Each logical thread walks the index space with a grid-stride
//! loop, so any `N` is covered even when the grid is capped:
//!
//! ```text
//! for (i = blockIdx.x * blockDim.x + threadIdx.x; i < N; i += blockDim.x * gridDim.x)
//! ```

use rayon::prelude::*;

use crate::backend::hip_backend::device::DeviceLimits;
use crate::backend::hip_backend::error::{HipError, HipResult};

/// Threads per block for 1-D elementwise kernels
pub const HIP_NUM_THREADS: u32 = 512;

/// Upper bound on the number of blocks of a 1-D launch
pub const MAXIMUM_NUM_BLOCKS: u32 = 4096;

/// Safe ceiling division using u64 arithmetic
#[inline]
fn ceil_div_u64(numerator: u64, denominator: u64) -> u64 {
    assert!(denominator > 0, "Division by zero in ceil_div_u64");
    (numerator + denominator - 1) / denominator
}

/// Number of blocks for `n` elements at `threads_per_block`, clamped to
/// `[1, max_blocks]`.
pub fn get_blocks(n: usize, threads_per_block: u32, max_blocks: u32) -> u32 {
    let blocks = ceil_div_u64(n as u64, threads_per_block as u64);
    blocks.clamp(1, max_blocks.max(1) as u64) as u32
}

/// Grid and block extents of one launch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    pub grid_dim: (u32, u32, u32),
    pub block_dim: (u32, u32, u32),
    pub shared_mem_bytes: u32,
}

impl LaunchConfig {
    /// 1-D launch with explicit extents
    pub fn linear(grid: u32, block: u32) -> Self {
        LaunchConfig {
            grid_dim: (grid, 1, 1),
            block_dim: (block, 1, 1),
            shared_mem_bytes: 0,
        }
    }

    /// Standard elementwise launch for `n` elements
    pub fn for_num_elements(n: usize) -> Self {
        Self::for_num_elements_with(n, HIP_NUM_THREADS, MAXIMUM_NUM_BLOCKS)
    }

    pub fn for_num_elements_with(n: usize, threads_per_block: u32, max_blocks: u32) -> Self {
        Self::linear(get_blocks(n, threads_per_block, max_blocks), threads_per_block)
    }

    pub fn grid_size(&self) -> u64 {
        self.grid_dim.0 as u64 * self.grid_dim.1 as u64 * self.grid_dim.2 as u64
    }

    pub fn threads_per_block(&self) -> u32 {
        self.block_dim.0 * self.block_dim.1 * self.block_dim.2
    }

    /// Total number of logical threads; the stride of the 1-D loop
    pub fn stride(&self) -> usize {
        self.grid_dim.0 as usize * self.block_dim.0 as usize
    }
}

/// Validate a launch configuration against device limits
pub fn validate_launch_config(config: &LaunchConfig, limits: &DeviceLimits) -> HipResult<()> {
    let block_dim = config.block_dim;
    let grid_dim = config.grid_dim;

    let threads_per_block = config.threads_per_block();
    if threads_per_block == 0 {
        return Err(HipError::KernelLaunchFailed(format!(
            "Block {:?} has no threads",
            block_dim
        )));
    }
    if threads_per_block > limits.max_threads_per_block {
        return Err(HipError::KernelLaunchFailed(format!(
            "Threads per block {} exceeds limit {} (block={:?})",
            threads_per_block, limits.max_threads_per_block, block_dim
        )));
    }

    let block_axes = [block_dim.0, block_dim.1, block_dim.2];
    for (axis, (&extent, &limit)) in block_axes
        .iter()
        .zip(limits.max_threads_dim.iter())
        .enumerate()
    {
        if extent > limit {
            return Err(HipError::KernelLaunchFailed(format!(
                "block.{} {} exceeds limit {}",
                ["x", "y", "z"][axis],
                extent,
                limit
            )));
        }
    }

    let grid_axes = [grid_dim.0, grid_dim.1, grid_dim.2];
    for (axis, (&extent, &limit)) in grid_axes
        .iter()
        .zip(limits.max_grid_size.iter())
        .enumerate()
    {
        if extent == 0 || extent > limit {
            return Err(HipError::KernelLaunchFailed(format!(
                "grid.{} {} invalid (limit: 1..{})",
                ["x", "y", "z"][axis],
                extent,
                limit
            )));
        }
    }

    Ok(())
}

/// Indices visited by one logical thread of a 1-D grid-stride loop
pub fn grid_stride_indices(
    config: &LaunchConfig,
    block_idx: u32,
    thread_idx: u32,
    n: usize,
) -> impl Iterator<Item = usize> {
    let start = block_idx as usize * config.block_dim.0 as usize + thread_idx as usize;
    let stride = config.stride().max(1);
    (start..n).step_by(stride)
}

/// Execute a 1-D grid-stride kernel body over `out`.
///
/// Every block of the grid runs in parallel and each of its threads walks
/// [`grid_stride_indices`]. Chunk `c` of `blockDim` slots is owned by block
/// `c % gridDim`, which hands each block disjoint mutable access to exactly
/// the indices its threads visit.
pub fn kernel_loop<T, F>(config: &LaunchConfig, out: &mut [T], body: F)
where
    T: Send,
    F: Fn(usize, &mut T) + Sync + Send,
{
    let n = out.len();
    let block = config.block_dim.0 as usize;
    let grid = config.grid_dim.0 as usize;
    if block == 0 || grid == 0 {
        return;
    }

    let mut owned: Vec<Vec<&mut [T]>> = (0..grid).map(|_| Vec::new()).collect();
    for (chunk, slots) in out.chunks_mut(block).enumerate() {
        owned[chunk % grid].push(slots);
    }

    owned
        .into_par_iter()
        .enumerate()
        .for_each(|(block_idx, mut chunks)| {
            for thread_idx in 0..config.block_dim.0 {
                for i in grid_stride_indices(config, block_idx as u32, thread_idx, n) {
                    body(i, &mut chunks[i / block / grid][i % block]);
                }
            }
        });
}
