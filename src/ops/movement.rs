use crate::error::{AmpereError, Result};
use crate::shape::{Shape, index_to_coords};
use crate::tensor::Tensor;

/// Movement operations: reorder or reinterpret data without changing values
///
/// Every movement op allocates a fresh tensor; nothing here aliases the
/// source buffer.
impl Tensor {
    /// Permute tensor axes
    ///
    /// `axes[i]` names the source axis that becomes output axis `i`, so the
    /// output shape is `axes.map(|a| shape[a])`.
    ///
    /// # Errors
    /// `InvalidAxis` unless `axes` is a permutation of `0..rank`
    pub fn transpose(&self, axes: &[usize]) -> Result<Tensor> {
        let shape = self.shape();
        let rank = shape.len();

        let mut seen = vec![false; rank];
        let valid = axes.len() == rank
            && axes.iter().all(|&ax| ax < rank && !std::mem::replace(&mut seen[ax], true));
        if !valid {
            return Err(AmpereError::InvalidAxis {
                axes: axes.to_vec(),
                rank,
            });
        }

        let new_dims: Vec<usize> = axes.iter().map(|&i| shape[i]).collect();
        let new_shape = Shape::new(&new_dims)?;
        let old_strides = self.shape_info().strides();

        // Stride of each output axis when walking the source buffer
        let gather_strides: Vec<usize> = axes.iter().map(|&ax| old_strides[ax]).collect();

        let src = self.data();
        let mut new_data = vec![0.0; src.len()];
        let mut coords = vec![0; rank];
        for (new_idx, val) in new_data.iter_mut().enumerate() {
            index_to_coords(new_idx, &new_dims, &mut coords);
            let old_idx: usize = coords
                .iter()
                .zip(&gather_strides)
                .map(|(c, s)| c * s)
                .sum();
            *val = src[old_idx];
        }
        Tensor::with_shape(new_data, new_shape)
    }

    /// Plain 2-D transpose
    pub fn t(&self) -> Result<Tensor> {
        self.dims2()?;
        self.transpose(&[1, 0])
    }

    /// Reinterpret the row-major elements under a new shape
    ///
    /// One entry of `new_shape` may be `INFER` (-1).
    ///
    /// # Errors
    /// `ShapeMismatch` when element counts disagree or more than one
    /// dimension is inferred, `UnsupportedRank` for a bad target rank
    pub fn reshape(&self, new_shape: &[isize]) -> Result<Tensor> {
        let shape = Shape::resolve(new_shape, self.numel())?;
        // The flat buffer is sized to numel before anything is written into it
        let flat = self.flatten();
        Tensor::with_shape(flat, shape)
    }

    /// Row-major flat copy of the elements
    #[must_use]
    pub fn flatten(&self) -> Vec<f64> {
        let mut flat = Vec::with_capacity(self.numel());
        flat.extend_from_slice(self.data());
        flat
    }

    /// Rebuild a tensor from flat row-major data
    ///
    /// `Tensor::unflatten(&t.flatten(), t.shape())` reproduces `t` exactly.
    pub fn unflatten(data: &[f64], shape: &[usize]) -> Result<Tensor> {
        Tensor::from_vec(data.to_vec(), shape)
    }

    /// Zero-pad a rank-4 tensor
    ///
    /// `pad_spec[axis] = [before, after]`.
    ///
    /// # Errors
    /// `UnsupportedRank` for non rank-4 input, `InvalidPadSpec` when the
    /// spec does not have exactly one row per axis
    pub fn pad(&self, pad_spec: &[[usize; 2]]) -> Result<Tensor> {
        let (n, c, h, w) = self.dims4()?;
        if pad_spec.len() != 4 {
            return Err(AmpereError::InvalidPadSpec {
                expected: 4,
                actual: pad_spec.len(),
            });
        }

        let old_dims = [n, c, h, w];
        let new_dims: Vec<usize> = old_dims
            .iter()
            .zip(pad_spec)
            .map(|(d, [before, after])| d + before + after)
            .collect();
        let new_shape = Shape::new(&new_dims)?;
        let new_strides = new_shape.strides();

        let mut out = vec![0.0; new_shape.numel()];
        let src = self.data();

        // Copy whole source rows (last axis is contiguous in both buffers)
        let row_len = w;
        let mut row_idx = 0;
        for i in 0..n {
            for j in 0..c {
                for k in 0..h {
                    let dst = (i + pad_spec[0][0]) * new_strides[0]
                        + (j + pad_spec[1][0]) * new_strides[1]
                        + (k + pad_spec[2][0]) * new_strides[2]
                        + pad_spec[3][0];
                    let start = row_idx * row_len;
                    out[dst..dst + row_len].copy_from_slice(&src[start..start + row_len]);
                    row_idx += 1;
                }
            }
        }
        Tensor::with_shape(out, new_shape)
    }
}
