//! Emulated HIP device: architecture table and launch limits
//!
//! The device is described by the same quantities the driver would report
//! through `hipDeviceProp_t`: the wavefront size of its architecture, the
//! maximum threads per block and the maximum grid extent per axis.

use crate::config::DeviceConfig;

/// GPU architecture identifiers for AMD GPUs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuArchitecture {
    /// RDNA3 (gfx1100, gfx1101, gfx1102), wave32
    Rdna3,
    /// RDNA2 (gfx1030 series), wave32
    Rdna2,
    /// CDNA2 (gfx90a), wave64
    Cdna2,
    /// CDNA3 (gfx940, gfx941, gfx942), wave64
    Cdna3,
    /// Unknown/fallback architecture
    Unknown,
}

impl GpuArchitecture {
    /// Parse architecture from a GFX IP name such as `gfx1100`
    pub fn from_gfx_ip(gfx_ip: &str) -> Self {
        match gfx_ip {
            ip if ip.starts_with("gfx110") => GpuArchitecture::Rdna3,
            ip if ip.starts_with("gfx103") => GpuArchitecture::Rdna2,
            ip if ip.starts_with("gfx94") => GpuArchitecture::Cdna3,
            ip if ip.starts_with("gfx90") => GpuArchitecture::Cdna2,
            _ => GpuArchitecture::Unknown,
        }
    }

    /// Wavefront size (threads per wave)
    pub fn wave_size(&self) -> u32 {
        match self {
            GpuArchitecture::Rdna2 | GpuArchitecture::Rdna3 => 32,
            GpuArchitecture::Cdna2 | GpuArchitecture::Cdna3 => 64,
            GpuArchitecture::Unknown => 32,
        }
    }

    /// Number of compute units reported for the emulated part
    pub fn compute_units(&self) -> u32 {
        match self {
            GpuArchitecture::Rdna3 => 84,
            GpuArchitecture::Rdna2 => 80,
            GpuArchitecture::Cdna2 => 110,
            GpuArchitecture::Cdna3 => 304,
            GpuArchitecture::Unknown => 32,
        }
    }
}

/// Cached device launch limits
///
/// Used to validate kernel launch configurations before work is queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    /// Maximum threads per block (product of x*y*z)
    pub max_threads_per_block: u32,
    /// Maximum grid dimensions [x, y, z]
    pub max_grid_size: [u32; 3],
    /// Maximum threads per dimension [x, y, z]
    pub max_threads_dim: [u32; 3],
    /// Warp size (wavefront size: 32 for RDNA, 64 for CDNA)
    pub warp_size: u32,
}

impl DeviceLimits {
    pub fn for_architecture(arch: GpuArchitecture) -> Self {
        DeviceLimits {
            max_threads_per_block: 1024,
            max_grid_size: [i32::MAX as u32, 65535, 65535],
            max_threads_dim: [1024, 1024, 1024],
            warp_size: arch.wave_size(),
        }
    }
}

/// An emulated HIP device
#[derive(Debug, Clone)]
pub struct HipDevice {
    device_id: i32,
    name: String,
    arch: GpuArchitecture,
    limits: DeviceLimits,
}

impl HipDevice {
    pub fn new(config: &DeviceConfig) -> Self {
        let arch = GpuArchitecture::from_gfx_ip(&config.arch);
        HipDevice {
            device_id: config.device_id,
            name: format!("Emulated AMD GPU ({})", config.arch),
            arch,
            limits: DeviceLimits::for_architecture(arch),
        }
    }

    pub fn device_id(&self) -> i32 {
        self.device_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn architecture(&self) -> GpuArchitecture {
        self.arch
    }

    pub fn limits(&self) -> &DeviceLimits {
        &self.limits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_from_gfx_ip() {
        assert_eq!(GpuArchitecture::from_gfx_ip("gfx1100"), GpuArchitecture::Rdna3);
        assert_eq!(GpuArchitecture::from_gfx_ip("gfx1030"), GpuArchitecture::Rdna2);
        assert_eq!(GpuArchitecture::from_gfx_ip("gfx90a"), GpuArchitecture::Cdna2);
        assert_eq!(GpuArchitecture::from_gfx_ip("gfx942"), GpuArchitecture::Cdna3);
        assert_eq!(GpuArchitecture::from_gfx_ip("sm_80"), GpuArchitecture::Unknown);
    }

    #[test]
    fn test_limits_follow_wave_size() {
        let rdna = DeviceLimits::for_architecture(GpuArchitecture::Rdna3);
        let cdna = DeviceLimits::for_architecture(GpuArchitecture::Cdna3);
        assert_eq!(rdna.warp_size, 32);
        assert_eq!(cdna.warp_size, 64);
        assert_eq!(rdna.max_threads_per_block, 1024);
    }

    #[test]
    fn test_device_from_config() {
        let config = DeviceConfig::new().with_device_id(1).with_arch("gfx942");
        let device = HipDevice::new(&config);
        assert_eq!(device.device_id(), 1);
        assert_eq!(device.architecture(), GpuArchitecture::Cdna3);
        assert!(device.name().contains("gfx942"));
    }
}
