use super::buffer::DeviceTensor;
use super::context::GpuContext;
use super::kernels::GpuKernels;
use crate::backend::Backend;
use crate::config::DeviceConfig;
use crate::error::{AmpereError, Result};
use crate::ops::matmul::matmul_dims;
use crate::ops::{BinaryOp, MatmulLayout, UnaryOp};
use crate::registry::Registry;
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::trace;

/// wgpu execution engine
///
/// Values are stored as f32 on the device: `upload` narrows, `download`
/// widens. Every device buffer is tracked in a handle table so leaks and
/// double frees are observable through `live_buffers`.
pub struct GpuBackend {
    ctx: GpuContext,
    buffers: Registry<wgpu::Buffer>,
}

impl std::fmt::Debug for GpuBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBackend")
            .field("ctx", &self.ctx)
            .field("buffers", &self.buffers)
            .finish()
    }
}

impl GpuBackend {
    /// Open a device as described by `config`
    ///
    /// # Errors
    /// `DeviceUnavailable` when no adapter can be opened
    pub fn new(config: &DeviceConfig) -> Result<Self> {
        Ok(GpuBackend {
            ctx: GpuContext::new(config)?,
            buffers: Registry::new(),
        })
    }

    /// Backend configured from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(&DeviceConfig::from_env())
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        self.ctx.device_name()
    }

    /// Buffers currently owned by a live `DeviceTensor`
    #[must_use]
    pub fn live_buffers(&self) -> usize {
        self.buffers.live()
    }

    /// Block until all submitted work has finished
    pub fn sync(&self) -> Result<()> {
        self.ctx.sync()
    }

    fn register(&self, shape: Shape, buffer: wgpu::Buffer) -> DeviceTensor {
        let lease = self.buffers.register(buffer);
        trace!("wgpu register id={} len={} shape={:?}", lease.id(), shape.numel(), shape);
        DeviceTensor::new(shape, lease)
    }

    fn alloc(&self, shape: Shape) -> Result<DeviceTensor> {
        let buffer = self.ctx.create_storage("tensor", shape.numel())?;
        Ok(self.register(shape, buffer))
    }

    /// Zero-filled device tensor
    ///
    /// # Errors
    /// `UnsupportedRank` for bad ranks, `DeviceAllocationFailed` if the
    /// device is out of memory
    pub fn malloc(&self, shape: &[usize]) -> Result<DeviceTensor> {
        self.alloc(Shape::new(shape)?)
    }

    /// Read the device values into the tensor's host mirror
    ///
    /// The device buffer stays allocated and owned by `tensor`.
    pub fn copy_to_host<'t>(&self, tensor: &'t mut DeviceTensor) -> Result<&'t Tensor> {
        let host = self.read_back(tensor)?;
        Ok(tensor.set_host(host))
    }

    /// In-place accumulate: `y += alpha * x`
    ///
    /// # Errors
    /// `ShapeMismatch` unless both shapes are identical
    pub fn add_assign(&self, y: &mut DeviceTensor, alpha: f64, x: &DeviceTensor) -> Result<()> {
        if y.shape() != x.shape() {
            return Err(AmpereError::shape_mismatch("add_assign", y.shape(), x.shape()));
        }
        let (xb, yb) = (x.buffer()?, y.buffer()?);
        if !y.is_empty() {
            GpuKernels::axpy(&self.ctx, alpha as f32, &xb, &yb, y.len())?;
        }
        y.invalidate_host();
        Ok(())
    }

    /// Free the device buffer now instead of at drop
    ///
    /// # Errors
    /// `BufferReleased` if the handle table no longer holds the buffer
    pub fn release(&self, tensor: DeviceTensor) -> Result<()> {
        let id = tensor.id();
        let buffer = tensor
            .into_lease()
            .release()
            .ok_or(AmpereError::BufferReleased { id })?;
        buffer.destroy();
        Ok(())
    }

    fn read_back(&self, tensor: &DeviceTensor) -> Result<Tensor> {
        let buffer = tensor.buffer()?;
        let values = self.ctx.read_buffer(&buffer, tensor.len())?;
        let data = values.into_iter().map(f64::from).collect();
        Tensor::from_vec(data, tensor.shape())
    }

    fn binary(&self, lhs: &DeviceTensor, rhs: &DeviceTensor, op: BinaryOp) -> Result<DeviceTensor> {
        if lhs.shape() != rhs.shape() {
            return Err(AmpereError::shape_mismatch(op.name(), lhs.shape(), rhs.shape()));
        }
        let out = self.alloc(lhs.shape_info().clone())?;
        if !out.is_empty() {
            let (a, b, dst) = (lhs.buffer()?, rhs.buffer()?, out.buffer()?);
            GpuKernels::binary_op(&self.ctx, op, &a, &b, &dst, out.len())?;
        }
        Ok(out)
    }

    fn unary(&self, tensor: &DeviceTensor, op: UnaryOp) -> Result<DeviceTensor> {
        let out = self.alloc(tensor.shape_info().clone())?;
        if !out.is_empty() {
            let (src, dst) = (tensor.buffer()?, out.buffer()?);
            GpuKernels::unary_op(&self.ctx, op, &src, &dst, out.len())?;
        }
        Ok(out)
    }
}

impl Backend for GpuBackend {
    type Tensor = DeviceTensor;

    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn upload(&self, tensor: &Tensor) -> Result<DeviceTensor> {
        let narrowed: Vec<f32> = tensor.data().iter().map(|&x| x as f32).collect();
        let buffer = self.ctx.upload_storage("tensor upload", &narrowed)?;
        Ok(self.register(tensor.shape_info().clone(), buffer))
    }

    fn download(&self, tensor: &DeviceTensor) -> Result<Tensor> {
        match tensor.host() {
            Some(host) => Ok(host.clone()),
            None => self.read_back(tensor),
        }
    }

    fn add(&self, lhs: &DeviceTensor, rhs: &DeviceTensor) -> Result<DeviceTensor> {
        self.binary(lhs, rhs, BinaryOp::Add)
    }
    fn sub(&self, lhs: &DeviceTensor, rhs: &DeviceTensor) -> Result<DeviceTensor> {
        self.binary(lhs, rhs, BinaryOp::Sub)
    }
    fn mul(&self, lhs: &DeviceTensor, rhs: &DeviceTensor) -> Result<DeviceTensor> {
        self.binary(lhs, rhs, BinaryOp::Mul)
    }
    fn div(&self, lhs: &DeviceTensor, rhs: &DeviceTensor) -> Result<DeviceTensor> {
        self.binary(lhs, rhs, BinaryOp::Div)
    }

    fn add_scalar(&self, tensor: &DeviceTensor, c: f64) -> Result<DeviceTensor> {
        self.unary(tensor, UnaryOp::Affine(1.0, c))
    }
    fn mul_scalar(&self, tensor: &DeviceTensor, c: f64) -> Result<DeviceTensor> {
        self.unary(tensor, UnaryOp::Affine(c, 0.0))
    }

    fn affine(&self, tensor: &DeviceTensor, a: f64, b: f64) -> Result<DeviceTensor> {
        self.unary(tensor, UnaryOp::Affine(a, b))
    }
    fn mask(&self, tensor: &DeviceTensor) -> Result<DeviceTensor> {
        self.unary(tensor, UnaryOp::Mask)
    }
    fn exp_affine(&self, tensor: &DeviceTensor, a: f64, b: f64) -> Result<DeviceTensor> {
        self.unary(tensor, UnaryOp::ExpAffine(a, b))
    }
    fn log_shift(&self, tensor: &DeviceTensor, b: f64) -> Result<DeviceTensor> {
        self.unary(tensor, UnaryOp::LogShift(b))
    }

    fn matmul(
        &self,
        lhs: &DeviceTensor,
        rhs: &DeviceTensor,
        layout: MatmulLayout,
    ) -> Result<DeviceTensor> {
        let dims = matmul_dims(lhs.shape_info(), rhs.shape_info(), layout)?;
        let out = self.alloc(Shape::matrix(dims.m, dims.n)?)?;
        let (a, b, dst) = (lhs.buffer()?, rhs.buffer()?, out.buffer()?);
        GpuKernels::matmul(&self.ctx, &a, &b, &dst, (dims.m, dims.k, dims.n), layout)?;
        Ok(out)
    }

    fn sum_rows(&self, tensor: &DeviceTensor) -> Result<DeviceTensor> {
        let (rows, cols) = tensor.shape_info().matrix_dims("sum_rows")?;
        let out = self.alloc(Shape::matrix(1, cols)?)?;
        let (src, dst) = (tensor.buffer()?, out.buffer()?);
        // Column c: start at c, step over whole rows
        GpuKernels::strided_sums(
            &self.ctx,
            "sum_rows",
            &src,
            &dst,
            (0..cols).map(|c| (c, cols, rows)),
        )?;
        Ok(out)
    }

    fn sum_cols(&self, tensor: &DeviceTensor) -> Result<DeviceTensor> {
        let (rows, cols) = tensor.shape_info().matrix_dims("sum_cols")?;
        let out = self.alloc(Shape::matrix(rows, 1)?)?;
        let (src, dst) = (tensor.buffer()?, out.buffer()?);
        // Row r: contiguous run starting at r * cols
        GpuKernels::strided_sums(
            &self.ctx,
            "sum_cols",
            &src,
            &dst,
            (0..rows).map(|r| (r * cols, 1, cols)),
        )?;
        Ok(out)
    }

    fn cast(&self, tensor: &DeviceTensor, target: usize) -> Result<DeviceTensor> {
        let (rows, cols) = match tensor.shape() {
            &[rows, cols] => (rows, cols),
            dims => return Err(AmpereError::UnsupportedRank { rank: dims.len() }),
        };
        let (out_rows, out_cols, column_mode) = if rows == 1 {
            (target, cols, false)
        } else if cols == 1 {
            (rows, target, true)
        } else {
            return Err(AmpereError::UnsupportedCastShape {
                shape: tensor.shape().to_vec(),
            });
        };
        let out = self.alloc(Shape::matrix(out_rows, out_cols)?)?;
        if !out.is_empty() {
            let (src, dst) = (tensor.buffer()?, out.buffer()?);
            GpuKernels::broadcast(&self.ctx, &src, &dst, out_rows, out_cols, column_mode)?;
        }
        Ok(out)
    }
}
