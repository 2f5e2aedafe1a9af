//! Emulated ROCm/HIP backend
//!
//! Devices, streams and launch geometry behave like their HIP counterparts,
//! but kernels execute on the host: a stream is a worker thread and the
//! blocks of a grid run on the rayon pool.

pub mod context;
pub mod device;
pub mod error;
pub mod launch;
pub mod stream;

pub use context::{HipContext, LaunchStats};
pub use device::{DeviceLimits, GpuArchitecture, HipDevice};
pub use error::{HipError, HipResult};
pub use launch::{
    get_blocks, kernel_loop, validate_launch_config, LaunchConfig, HIP_NUM_THREADS,
    MAXIMUM_NUM_BLOCKS,
};
pub use stream::{HipStream, StreamJob};
