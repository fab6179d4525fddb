use crate::error::{AmpereError, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::warn;

impl Tensor {
    /// Naive batched 1-D convolution
    ///
    /// `self` is `[batch, len]`, `kernel` is `[batch, width]`, output is
    /// `[batch, len]` with
    /// `out[b][i] = Σ_j self[b][i + j - 1] * kernel[b][j]`.
    /// Window positions outside `0..len` contribute nothing.
    ///
    /// `stride` is accepted but not applied; every position is computed.
    ///
    /// # Errors
    /// `BatchMismatch` when the batch dimensions differ
    pub fn conv1d(&self, kernel: &Tensor, stride: usize) -> Result<Tensor> {
        let (batch, len) = self.dims2()?;
        let (kernel_batch, width) = kernel.dims2()?;
        if batch != kernel_batch {
            return Err(AmpereError::BatchMismatch {
                input: batch,
                kernel: kernel_batch,
            });
        }
        if stride != 1 {
            warn!("conv1d: stride {stride} is ignored, computing every position");
        }

        let shape = Shape::matrix(batch, len)?;
        let mut out = vec![0.0; shape.numel()];
        let signals = self.data().chunks(len.max(1));
        let kernels = kernel.data().chunks(width.max(1));
        for ((signal, taps), out_row) in signals.zip(kernels).zip(out.chunks_mut(len.max(1))) {
            for (i, acc) in out_row.iter_mut().enumerate() {
                for (j, &w) in taps.iter().enumerate() {
                    // Window index is i + j - 1; j == 0 reaches one left of i
                    let Some(pos) = (i + j).checked_sub(1) else {
                        continue;
                    };
                    if let Some(&x) = signal.get(pos) {
                        *acc += x * w;
                    }
                }
            }
        }
        Ok(Tensor::from_parts(out, shape))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv1d_index_shift() {
        let input = Tensor::from_rows(&[[1.0, 2.0, 3.0, 4.0]]).unwrap();
        let kernel = Tensor::from_rows(&[[1.0, 10.0, 100.0]]).unwrap();
        let out = input.conv1d(&kernel, 1).unwrap();
        // i=0: j=1 -> x0*10, j=2 -> x1*100
        // i=3: j=0 -> x2*1, j=1 -> x3*10, j=2 out of range
        assert_eq!(out.data(), &[210.0, 321.0, 432.0, 43.0]);
    }

    #[test]
    fn test_conv1d_per_batch_kernels() {
        let input = Tensor::from_rows(&[[1.0, 1.0], [2.0, 2.0]]).unwrap();
        let kernel = Tensor::from_rows(&[[0.0, 1.0], [0.0, 3.0]]).unwrap();
        let out = input.conv1d(&kernel, 1).unwrap();
        // Kernel [0, w] picks input[i] exactly
        assert_eq!(out.data(), &[1.0, 1.0, 6.0, 6.0]);
    }

    #[test]
    fn test_conv1d_stride_ignored() {
        let input = Tensor::from_rows(&[[1.0, 2.0, 3.0]]).unwrap();
        let kernel = Tensor::from_rows(&[[1.0, 1.0]]).unwrap();
        assert_eq!(
            input.conv1d(&kernel, 2).unwrap(),
            input.conv1d(&kernel, 1).unwrap()
        );
    }

    #[test]
    fn test_conv1d_batch_mismatch() {
        let input = Tensor::make(&[2, 5]).unwrap();
        let kernel = Tensor::make(&[3, 2]).unwrap();
        assert_eq!(
            input.conv1d(&kernel, 1).unwrap_err(),
            AmpereError::BatchMismatch {
                input: 2,
                kernel: 3
            }
        );
    }
}
