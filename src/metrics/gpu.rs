use std::collections::HashMap;

/// One GPU reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GpuSample {
    /// Device memory in use, percent
    pub used_percent: f32,
    /// Dedicated memory per pid, megabytes
    pub per_process_mb: HashMap<u32, f32>,
}

/// Optional GPU statistics. Returning `None` skips the GPU series for that
/// tick and leaves per-process GPU figures unset.
pub trait GpuSource: Send {
    fn sample(&mut self) -> Option<GpuSample>;
}

#[cfg(feature = "nvml")]
pub use nvml::NvmlSource;

#[cfg(feature = "nvml")]
mod nvml {
    use super::{GpuSample, GpuSource};
    use log::{debug, warn};
    use nvml_wrapper::enums::device::UsedGpuMemory;
    use nvml_wrapper::Nvml;

    /// First NVIDIA device, read through NVML.
    pub struct NvmlSource {
        nvml: Nvml,
    }

    impl NvmlSource {
        /// Returns `None` when the NVML library or driver is not present.
        pub fn new() -> Option<Self> {
            match Nvml::init() {
                Ok(nvml) => Some(Self { nvml }),
                Err(e) => {
                    warn!("NVML unavailable, GPU charts disabled: {}", e);
                    None
                }
            }
        }
    }

    impl GpuSource for NvmlSource {
        fn sample(&mut self) -> Option<GpuSample> {
            let device = self.nvml.device_by_index(0).ok()?;
            let memory = device.memory_info().ok()?;
            let used_percent = if memory.total == 0 {
                0.0
            } else {
                (memory.used as f64 / memory.total as f64 * 100.0) as f32
            };

            let per_process_mb = match device.running_compute_processes() {
                Ok(processes) => processes
                    .into_iter()
                    .filter_map(|p| match p.used_gpu_memory {
                        UsedGpuMemory::Used(bytes) => {
                            Some((p.pid, (bytes as f64 / (1024.0 * 1024.0)) as f32))
                        }
                        UsedGpuMemory::Unavailable => None,
                    })
                    .collect(),
                Err(e) => {
                    debug!("NVML process list failed: {}", e);
                    Default::default()
                }
            };

            Some(GpuSample {
                used_percent,
                per_process_mb,
            })
        }
    }
}
