//! Device configuration
//!
//! [`DeviceConfig`] selects the emulated device and the launch geometry used
//! by the elementwise executor. Defaults match the framework's HIP build:
//! 512 threads per block and at most 4096 blocks per 1-D launch.

use std::env;

use crate::backend::hip_backend::device::DeviceLimits;
use crate::backend::hip_backend::launch::{HIP_NUM_THREADS, MAXIMUM_NUM_BLOCKS};
use crate::backend::hip_backend::{GpuArchitecture, HipError, HipResult};

/// Configuration for a device context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Ordinal of the device the context is bound to
    pub device_id: i32,

    /// GFX architecture name, e.g. `gfx1100`
    pub arch: String,

    /// Threads per block for 1-D elementwise launches
    pub threads_per_block: u32,

    /// Cap on blocks per 1-D launch
    pub max_blocks: u32,

    /// Synchronize after every launch
    pub debug_sync_launch: bool,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            device_id: 0,
            arch: "gfx1100".to_string(),
            threads_per_block: HIP_NUM_THREADS,
            max_blocks: MAXIMUM_NUM_BLOCKS,
            debug_sync_launch: false,
        }
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_arch(mut self, arch: impl Into<String>) -> Self {
        self.arch = arch.into();
        self
    }

    pub fn with_threads_per_block(mut self, threads_per_block: u32) -> Self {
        self.threads_per_block = threads_per_block;
        self
    }

    pub fn with_max_blocks(mut self, max_blocks: u32) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    pub fn with_debug_sync_launch(mut self, debug_sync_launch: bool) -> Self {
        self.debug_sync_launch = debug_sync_launch;
        self
    }

    /// Defaults overridden by environment variables
    ///
    /// - `HIPOPS_DEVICE_ID`: device ordinal
    /// - `HIPOPS_ARCH`: gfx architecture name
    /// - `HIPOPS_DEBUG_SYNC`: synchronize after every launch (`1`/`true`)
    pub fn from_env() -> Self {
        let mut config = DeviceConfig::default();

        if let Ok(device_id) = env::var("HIPOPS_DEVICE_ID") {
            if let Ok(id) = device_id.parse::<i32>() {
                config.device_id = id;
            }
        }

        if let Ok(arch) = env::var("HIPOPS_ARCH") {
            if !arch.trim().is_empty() {
                config.arch = arch.trim().to_string();
            }
        }

        if let Ok(debug_sync) = env::var("HIPOPS_DEBUG_SYNC") {
            config.debug_sync_launch = debug_sync != "0" && debug_sync.to_lowercase() != "false";
        }

        config
    }

    /// Reject geometry the device cannot launch
    pub fn validate(&self) -> HipResult<()> {
        if self.device_id < 0 {
            return Err(HipError::DeviceNotFound);
        }

        let limits = DeviceLimits::for_architecture(GpuArchitecture::from_gfx_ip(&self.arch));
        if self.threads_per_block == 0 {
            return Err(HipError::InitializationFailed(
                "threads_per_block cannot be zero".to_string(),
            ));
        }
        if self.threads_per_block > limits.max_threads_per_block {
            return Err(HipError::InitializationFailed(format!(
                "threads_per_block {} exceeds device limit {}",
                self.threads_per_block, limits.max_threads_per_block
            )));
        }
        if self.max_blocks == 0 {
            return Err(HipError::InitializationFailed(
                "max_blocks cannot be zero".to_string(),
            ));
        }

        Ok(())
    }
}
