//! GPU backend for tensor operations using wgpu
//!
//! The key components are:
//! - `GpuBackend`: the [`Backend`](crate::Backend) implementation callers use
//! - `GpuContext`: the device, queue and lazily compiled compute pipelines
//! - `DeviceTensor`: a tensor whose values live in a device buffer
//! - WGSL compute shaders under `shaders/`
//!
//! There is no process-wide context: each `GpuBackend` opens its own device,
//! and dropping it releases the device.

mod backend;
mod buffer;
mod context;
mod kernels;

pub use backend::GpuBackend;
pub use buffer::{DeviceTensor, Residency};

use crate::config::DeviceConfig;

/// Check whether a GPU adapter can be opened with the environment config
///
/// Opens and immediately drops a device; callers that go on to use the GPU
/// should construct a `GpuBackend` directly instead.
#[must_use]
pub fn is_gpu_available() -> bool {
    match GpuBackend::new(&DeviceConfig::from_env()) {
        Ok(_) => true,
        Err(e) => {
            log::info!("GPU unavailable: {e}");
            false
        }
    }
}
