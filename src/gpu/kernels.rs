//! GPU kernel execution
//!
//! Each function validates nothing about shapes (the backend does that),
//! packs its uniform parameters, and submits one command buffer through
//! `GpuContext::run`.

use super::context::{Dispatch, GpuContext, linear_workgroups};
use crate::error::{AmpereError, Result};
use crate::ops::{BinaryOp, MatmulLayout, UnaryOp};

/// Length plus an optional scalar (binary ops and axpy)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ElementwiseParams {
    pub len: u32,
    pub alpha: f32,
    pub _padding: [u32; 2],
}

/// Coefficients for the unary transforms
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct UnaryParams {
    pub a: f32,
    pub b: f32,
    pub len: u32,
    pub _padding: u32,
}

/// Parameters for matrix dimensions (used in matmul shader)
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct MatMulParams {
    pub m: u32,     // Rows of the output
    pub k: u32,     // Shared inner dimension
    pub n: u32,     // Cols of the output
    pub flags: u32, // bit 0: lhs transposed, bit 1: rhs transposed
}

/// Offset/stride addressing for one vector sum
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct StridedSumParams {
    pub first: u32,
    pub step: u32,
    pub count: u32,
    pub slot: u32,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct BroadcastParams {
    pub rows: u32,
    pub cols: u32,
    pub column_mode: u32,
    pub _padding: u32,
}

/// Device kernels only address 32-bit indices
pub(crate) fn to_u32(value: usize, call_site: &'static str) -> Result<u32> {
    u32::try_from(value).map_err(|_| AmpereError::LibraryCallFailed {
        call_site,
        message: format!("size {value} exceeds the 32-bit kernel index range"),
    })
}

pub(crate) struct GpuKernels;

impl GpuKernels {
    /// dst = lhs (op) rhs
    pub fn binary_op(
        ctx: &GpuContext,
        op: BinaryOp,
        lhs: &wgpu::Buffer,
        rhs: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        len: usize,
    ) -> Result<()> {
        let pipelines = ctx.pipelines();
        let pipeline = match op {
            BinaryOp::Add => &pipelines.add,
            BinaryOp::Sub => &pipelines.sub,
            BinaryOp::Mul => &pipelines.mul,
            BinaryOp::Div => &pipelines.div,
        };
        let params = ctx.uniform(
            "binary params",
            &ElementwiseParams {
                len: to_u32(len, op.name())?,
                alpha: 0.0,
                _padding: [0; 2],
            },
        );
        ctx.run(
            op.name(),
            &[Dispatch {
                pipeline,
                buffers: vec![lhs, rhs, dst, &params],
                workgroups: linear_workgroups(len),
            }],
        )
    }

    /// ys += alpha * xs, in place
    pub fn axpy(
        ctx: &GpuContext,
        alpha: f32,
        xs: &wgpu::Buffer,
        ys: &wgpu::Buffer,
        len: usize,
    ) -> Result<()> {
        let params = ctx.uniform(
            "axpy params",
            &ElementwiseParams {
                len: to_u32(len, "axpy")?,
                alpha,
                _padding: [0; 2],
            },
        );
        ctx.run(
            "axpy",
            &[Dispatch {
                pipeline: &ctx.pipelines().axpy,
                buffers: vec![xs, ys, &params],
                workgroups: linear_workgroups(len),
            }],
        )
    }

    pub fn unary_op(
        ctx: &GpuContext,
        op: UnaryOp,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        len: usize,
    ) -> Result<()> {
        let pipelines = ctx.pipelines();
        let (pipeline, a, b, call_site) = match op {
            UnaryOp::Mask => (&pipelines.mask, 0.0, 0.0, "mask"),
            UnaryOp::Affine(a, b) => (&pipelines.affine, a, b, "affine"),
            UnaryOp::ExpAffine(a, b) => (&pipelines.exp_affine, a, b, "exp_affine"),
            UnaryOp::LogShift(b) => (&pipelines.log_shift, 0.0, b, "log_shift"),
        };
        let params = ctx.uniform(
            "unary params",
            &UnaryParams {
                a: a as f32,
                b: b as f32,
                len: to_u32(len, call_site)?,
                _padding: 0,
            },
        );
        ctx.run(
            call_site,
            &[Dispatch {
                pipeline,
                buffers: vec![src, dst, &params],
                workgroups: linear_workgroups(len),
            }],
        )
    }

    /// dst[m, n] = op(lhs) @ op(rhs)
    pub fn matmul(
        ctx: &GpuContext,
        lhs: &wgpu::Buffer,
        rhs: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        (m, k, n): (usize, usize, usize),
        layout: MatmulLayout,
    ) -> Result<()> {
        let flags = u32::from(layout.lhs_transposed) | (u32::from(layout.rhs_transposed) << 1);
        let params = ctx.uniform(
            "matmul params",
            &MatMulParams {
                m: to_u32(m, "dot")?,
                k: to_u32(k, "dot")?,
                n: to_u32(n, "dot")?,
                flags,
            },
        );
        // One workgroup per 16x16 tile of the output
        let workgroups = [to_u32(n.div_ceil(16), "dot")?, to_u32(m.div_ceil(16), "dot")?, 1];
        ctx.run(
            "dot",
            &[Dispatch {
                pipeline: &ctx.pipelines().matmul,
                buffers: vec![lhs, rhs, dst, &params],
                workgroups,
            }],
        )
    }

    /// One strided vector sum per `(first, step, count)` triple; result `i`
    /// lands in `dst[i]`
    pub fn strided_sums(
        ctx: &GpuContext,
        call_site: &'static str,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        vectors: impl IntoIterator<Item = (usize, usize, usize)>,
    ) -> Result<()> {
        let mut params = Vec::new();
        for (slot, (first, step, count)) in vectors.into_iter().enumerate() {
            params.push(ctx.uniform(
                "strided sum params",
                &StridedSumParams {
                    first: to_u32(first, call_site)?,
                    step: to_u32(step, call_site)?,
                    count: to_u32(count, call_site)?,
                    slot: to_u32(slot, call_site)?,
                },
            ));
        }
        let pipeline = &ctx.pipelines().strided_sum;
        let dispatches: Vec<Dispatch<'_>> = params
            .iter()
            .map(|p| Dispatch {
                pipeline,
                buffers: vec![src, dst, p],
                workgroups: [1, 1, 1],
            })
            .collect();
        ctx.run(call_site, &dispatches)
    }

    /// Fill a [rows, cols] output from a row (`column_mode == false`) or
    /// column vector
    pub fn broadcast(
        ctx: &GpuContext,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
        rows: usize,
        cols: usize,
        column_mode: bool,
    ) -> Result<()> {
        let params = ctx.uniform(
            "broadcast params",
            &BroadcastParams {
                rows: to_u32(rows, "cast")?,
                cols: to_u32(cols, "cast")?,
                column_mode: u32::from(column_mode),
                _padding: 0,
            },
        );
        ctx.run(
            "cast",
            &[Dispatch {
                pipeline: &ctx.pipelines().broadcast,
                buffers: vec![src, dst, &params],
                workgroups: linear_workgroups(rows * cols),
            }],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_are_16_bytes() {
        assert_eq!(std::mem::size_of::<ElementwiseParams>(), 16);
        assert_eq!(std::mem::size_of::<UnaryParams>(), 16);
        assert_eq!(std::mem::size_of::<MatMulParams>(), 16);
        assert_eq!(std::mem::size_of::<StridedSumParams>(), 16);
        assert_eq!(std::mem::size_of::<BroadcastParams>(), 16);
    }

    #[test]
    fn test_to_u32_range() {
        assert_eq!(to_u32(7, "dot"), Ok(7));
        if usize::BITS > 32 {
            assert!(matches!(
                to_u32(u32::MAX as usize + 1, "dot"),
                Err(AmpereError::LibraryCallFailed { call_site: "dot", .. })
            ));
        }
    }
}
