//! Device-resident tensors
//!
//! A `DeviceTensor` owns exactly one device buffer through a registry
//! [`Lease`]; dropping the tensor (or handing it to
//! `GpuBackend::release`) returns the buffer exactly once. Copying the data
//! to the host never frees the buffer, it only fills the host mirror.

use crate::error::Result;
use crate::registry::Lease;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Where a device tensor's current values can be read from
///
/// The host-only state is a plain [`Tensor`]; a `DeviceTensor` is always on
/// the device and optionally mirrored on the host.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Residency {
    DeviceOnly,
    Mirrored,
}

/// A tensor whose values live in an f32 device buffer
pub struct DeviceTensor {
    shape: Shape,
    lease: Lease<wgpu::Buffer>,
    /// Host copy, valid until the device buffer is written again
    host: Option<Tensor>,
}

impl std::fmt::Debug for DeviceTensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceTensor")
            .field("id", &self.lease.id())
            .field("shape", &self.shape)
            .field("residency", &self.residency())
            .finish()
    }
}

impl DeviceTensor {
    pub(crate) fn new(shape: Shape, lease: Lease<wgpu::Buffer>) -> Self {
        DeviceTensor {
            shape,
            lease,
            host: None,
        }
    }

    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.shape.dims()
    }

    #[must_use]
    pub fn shape_info(&self) -> &Shape {
        &self.shape
    }

    /// Number of f32 elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.shape.numel()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registry id of the owned buffer
    #[must_use]
    pub fn id(&self) -> u64 {
        self.lease.id()
    }

    #[must_use]
    pub fn residency(&self) -> Residency {
        if self.host.is_some() {
            Residency::Mirrored
        } else {
            Residency::DeviceOnly
        }
    }

    /// Host mirror, present after `GpuBackend::copy_to_host`
    #[must_use]
    pub fn host(&self) -> Option<&Tensor> {
        self.host.as_ref()
    }

    /// Handle to the underlying buffer for binding in a dispatch
    pub(crate) fn buffer(&self) -> Result<wgpu::Buffer> {
        self.lease.get()
    }

    pub(crate) fn set_host(&mut self, tensor: Tensor) -> &Tensor {
        self.host.insert(tensor)
    }

    /// Drop the mirror after an in-place device write
    pub(crate) fn invalidate_host(&mut self) {
        self.host = None;
    }

    pub(crate) fn into_lease(self) -> Lease<wgpu::Buffer> {
        self.lease
    }
}
