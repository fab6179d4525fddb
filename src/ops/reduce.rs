use crate::error::{AmpereError, Result};
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Row/column reductions over rank-2 tensors
///
/// `SumRows` collapses the row axis to `[1, cols]`, `SumCols` collapses the
/// column axis to `[rows, 1]`. The max variants keep the full shape and
/// replicate the per-row result across every column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    SumRows,
    SumCols,
    MaxCols,
}

/// Per-row arg-max result, one column index per element
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexMatrix {
    rows: usize,
    cols: usize,
    data: Vec<usize>,
}

impl IndexMatrix {
    #[must_use]
    pub fn shape(&self) -> [usize; 2] {
        [self.rows, self.cols]
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    #[must_use]
    pub fn data(&self) -> &[usize] {
        &self.data
    }

    #[must_use]
    pub fn to_rows(&self) -> Vec<Vec<usize>> {
        self.data.chunks(self.cols).map(<[usize]>::to_vec).collect()
    }
}

/// Running max seeded at (0.0, 0): all-negative rows report 0 at column 0
fn row_max(row: &[f64]) -> (f64, usize) {
    let mut max = 0.0;
    let mut index = 0;
    for (j, &x) in row.iter().enumerate() {
        if x > max {
            max = x;
            index = j;
        }
    }
    (max, index)
}

// ===== REDUCE OPERATIONS =====

impl Tensor {
    pub fn reduce_op(&self, op: ReduceOp) -> Result<Tensor> {
        let (rows, cols) = self.matrix_dims("reduce")?;
        let data = self.data();

        let out = match op {
            ReduceOp::SumRows => {
                let mut sums = vec![0.0; cols];
                for row in data.chunks(cols) {
                    for (acc, &x) in sums.iter_mut().zip(row) {
                        *acc += x;
                    }
                }
                Tensor::from_parts(sums, Shape::matrix(1, cols)?)
            }
            ReduceOp::SumCols => {
                let sums = data.chunks(cols).map(|row| row.iter().sum()).collect();
                Tensor::from_parts(sums, Shape::matrix(rows, 1)?)
            }
            ReduceOp::MaxCols => {
                let mut out = Vec::with_capacity(rows * cols);
                for row in data.chunks(cols) {
                    let (max, _) = row_max(row);
                    out.extend(std::iter::repeat_n(max, cols));
                }
                Tensor::from_parts(out, Shape::matrix(rows, cols)?)
            }
        };
        Ok(out)
    }

    /// Column sums, shape `[1, cols]`
    pub fn sum_rows(&self) -> Result<Tensor> {
        self.reduce_op(ReduceOp::SumRows)
    }

    /// Row sums, shape `[rows, 1]`
    pub fn sum_cols(&self) -> Result<Tensor> {
        self.reduce_op(ReduceOp::SumCols)
    }

    /// Row max replicated across the row; the running max starts at 0
    pub fn max_cols(&self) -> Result<Tensor> {
        self.reduce_op(ReduceOp::MaxCols)
    }

    /// Column index of the row max replicated across the row
    ///
    /// Uses the same zero-seeded running max as `max_cols`, so a row with
    /// no positive entry reports index 0. Ties keep the first index.
    pub fn argmax_cols(&self) -> Result<IndexMatrix> {
        let (rows, cols) = self.matrix_dims("argmax_cols")?;
        let mut data = Vec::with_capacity(rows * cols);
        for row in self.data().chunks(cols) {
            let (_, index) = row_max(row);
            data.extend(std::iter::repeat_n(index, cols));
        }
        Ok(IndexMatrix { rows, cols, data })
    }

    /// Broadcast a row vector to `target` rows or a column vector to
    /// `target` columns
    ///
    /// A `[1, 1]` input is treated as a row vector.
    ///
    /// # Errors
    /// `UnsupportedCastShape` if neither dimension is 1
    pub fn cast(&self, target: usize) -> Result<Tensor> {
        let (rows, cols) = self.dims2()?;
        if rows == 1 {
            let shape = Shape::matrix(target, cols)?;
            let mut out = Vec::with_capacity(shape.numel());
            for _ in 0..target {
                out.extend_from_slice(self.data());
            }
            Ok(Tensor::from_parts(out, shape))
        } else if cols == 1 {
            let shape = Shape::matrix(rows, target)?;
            let mut out = Vec::with_capacity(shape.numel());
            for &x in self.data() {
                out.extend(std::iter::repeat_n(x, target));
            }
            Ok(Tensor::from_parts(out, shape))
        } else {
            Err(AmpereError::UnsupportedCastShape {
                shape: self.shape().to_vec(),
            })
        }
    }
}
