use crate::error::{AmpereError, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;
use log::debug;
use rayon::prelude::*;

/// Which operands are read transposed
///
/// - `NN`: lhs @ rhs
/// - `TN`: lhsᵀ @ rhs
/// - `NT`: lhs @ rhsᵀ
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatmulLayout {
    pub lhs_transposed: bool,
    pub rhs_transposed: bool,
}

impl MatmulLayout {
    pub const NN: Self = Self {
        lhs_transposed: false,
        rhs_transposed: false,
    };
    pub const TN: Self = Self {
        lhs_transposed: true,
        rhs_transposed: false,
    };
    pub const NT: Self = Self {
        lhs_transposed: false,
        rhs_transposed: true,
    };
}

/// Logical product dimensions: (m, k) @ (k, n) -> (m, n)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct MatmulDims {
    pub m: usize,
    pub k: usize,
    pub n: usize,
}

/// Validate operands and resolve the logical product dimensions
pub(crate) fn matmul_dims(lhs: &Shape, rhs: &Shape, layout: MatmulLayout) -> Result<MatmulDims> {
    let (lr, lc) = lhs.matrix_dims("dot")?;
    let (rr, rc) = rhs.matrix_dims("dot")?;

    let (m, k) = if layout.lhs_transposed { (lc, lr) } else { (lr, lc) };
    let (k2, n) = if layout.rhs_transposed { (rc, rr) } else { (rr, rc) };

    if k != k2 {
        return Err(AmpereError::DimensionMismatch {
            lhs_rows: lr,
            lhs_cols: lc,
            rhs_rows: rr,
            rhs_cols: rc,
        });
    }
    Ok(MatmulDims { m, k, n })
}

/// Compute one output row: k-outer, j-inner accumulation
#[inline]
fn matmul_row(
    row: &mut [f64],
    i: usize,
    a: &[f64],
    b: &[f64],
    dims: MatmulDims,
    layout: MatmulLayout,
) {
    let MatmulDims { m, k, n } = dims;
    for p in 0..k {
        let aip = if layout.lhs_transposed {
            a[p * m + i]
        } else {
            a[i * k + p]
        };
        if layout.rhs_transposed {
            for (j, out) in row.iter_mut().enumerate() {
                *out += aip * b[j * k + p];
            }
        } else {
            let b_row = &b[p * n..(p + 1) * n];
            for (out, &bpj) in row.iter_mut().zip(b_row) {
                *out += aip * bpj;
            }
        }
    }
}

/// Row-parallel matmul on the current rayon pool
///
/// The output is split into disjoint `n`-length row chunks, one task per
/// row; the call returns only after every row has been written.
pub(crate) fn matmul_rows(
    a: &[f64],
    b: &[f64],
    dims: MatmulDims,
    layout: MatmulLayout,
) -> Vec<f64> {
    debug!(
        "matmul {}x{} @ {}x{} ({:?}) on {} worker threads",
        dims.m,
        dims.k,
        dims.k,
        dims.n,
        layout,
        rayon::current_num_threads()
    );
    let mut out = vec![0.0; dims.m * dims.n];
    out.par_chunks_mut(dims.n)
        .enumerate()
        .for_each(|(i, row)| matmul_row(row, i, a, b, dims, layout));
    out
}

impl Tensor {
    /// Matrix product with an explicit operand layout
    ///
    /// # Errors
    /// `UnsupportedRank` for non rank-2 operands, `DimensionMismatch` when
    /// the inner dimensions disagree
    pub fn matmul(&self, rhs: &Tensor, layout: MatmulLayout) -> Result<Tensor> {
        let dims = matmul_dims(self.shape_info(), rhs.shape_info(), layout)?;
        let shape = Shape::matrix(dims.m, dims.n)?;
        let out = matmul_rows(self.data(), rhs.data(), dims, layout);
        Ok(Tensor::from_parts(out, shape))
    }

    /// `self @ rhs`
    pub fn dot(&self, rhs: &Tensor) -> Result<Tensor> {
        self.matmul(rhs, MatmulLayout::NN)
    }

    /// `selfᵀ @ rhs`
    pub fn t_dot(&self, rhs: &Tensor) -> Result<Tensor> {
        self.matmul(rhs, MatmulLayout::TN)
    }

    /// `self @ rhsᵀ`
    pub fn dot_t(&self, rhs: &Tensor) -> Result<Tensor> {
        self.matmul(rhs, MatmulLayout::NT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(a: &Tensor, b: &Tensor) -> Vec<f64> {
        let (m, k) = a.dims2().unwrap();
        let (_, n) = b.dims2().unwrap();
        let mut out = vec![0.0; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0;
                for p in 0..k {
                    sum += a.data()[i * k + p] * b.data()[p * n + j];
                }
                out[i * n + j] = sum;
            }
        }
        out
    }

    fn seq(rows: usize, cols: usize, offset: f64) -> Tensor {
        let data = (0..rows * cols).map(|i| i as f64 * 0.5 + offset).collect();
        Tensor::from_vec(data, &[rows, cols]).unwrap()
    }

    #[test]
    fn test_dot_small() {
        let a = Tensor::from_rows(&[[1.0, 2.0], [3.0, 4.0]]).unwrap();
        let b = Tensor::from_rows(&[[5.0, 6.0], [7.0, 8.0]]).unwrap();
        let c = a.dot(&b).unwrap();
        assert_eq!(c.data(), &[19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_dot_matches_naive() {
        let a = seq(7, 5, -3.0);
        let b = seq(5, 9, 1.0);
        let c = a.dot(&b).unwrap();
        assert_eq!(c.shape(), &[7, 9]);
        for (x, y) in c.data().iter().zip(naive(&a, &b)) {
            assert!((x - y).abs() < 1e-9);
        }
    }

    #[test]
    fn test_transposed_variants() {
        let a = seq(4, 3, 0.0);
        let b = seq(4, 6, 2.0);
        let expected = a.t().unwrap().dot(&b).unwrap();
        assert_eq!(a.t_dot(&b).unwrap(), expected);

        let c = seq(6, 3, -1.0);
        let expected = a.dot(&c.t().unwrap()).unwrap();
        assert_eq!(a.dot_t(&c).unwrap(), expected);
    }

    #[test]
    fn test_dimension_mismatch() {
        let a = Tensor::make(&[2, 3]).unwrap();
        let b = Tensor::make(&[4, 5]).unwrap();
        assert_eq!(
            a.dot(&b).unwrap_err(),
            AmpereError::DimensionMismatch {
                lhs_rows: 2,
                lhs_cols: 3,
                rhs_rows: 4,
                rhs_cols: 5
            }
        );
        // (2,3)ᵀ @ (2,5) is fine, (2,3) @ (5,4)ᵀ is not
        assert!(a.t_dot(&Tensor::make(&[2, 5]).unwrap()).is_ok());
        assert!(a.dot_t(&Tensor::make(&[5, 4]).unwrap()).is_err());
    }

    #[test]
    fn test_dot_rank_check() {
        let a = Tensor::make(&[1, 1, 2, 2]).unwrap();
        let b = Tensor::make(&[2, 2]).unwrap();
        assert!(matches!(
            a.dot(&b),
            Err(AmpereError::UnsupportedRank { rank: 4 })
        ));
    }
}
