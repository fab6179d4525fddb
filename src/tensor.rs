use crate::error::{AmpereError, Result};
use crate::shape::{Rank, Shape};

// ===== TENSOR STRUCTURE =====

/// A dense, rank-tagged array of f64 values
///
/// Fields:
/// - `shape`: rank tag plus dimensions, e.g. [batch, channels, height, width]
/// - `data`: flat values in row-major order, `data.len() == shape.numel()`
///
/// Tensors are values: every operation returns a new tensor and leaves its
/// operands untouched.
#[derive(Clone, PartialEq)]
pub struct Tensor {
    shape: Shape,
    data: Vec<f64>,
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("shape", &self.shape)
            .field("numel", &self.data.len())
            .finish()
    }
}

impl std::fmt::Display for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Ok((rows, cols)) = self.dims2() {
            writeln!(f, "Tensor {}x{}", rows, cols)?;
            for row in self.data.chunks(cols.max(1)).take(rows) {
                writeln!(f, "  {row:?}")?;
            }
            Ok(())
        } else {
            write!(f, "Tensor {} ({} elements)", self.shape, self.data.len())
        }
    }
}

// ===== TENSOR CONSTRUCTORS =====
impl Tensor {
    /// Create a zero-filled tensor
    ///
    /// # Errors
    /// `UnsupportedRank` unless `shape` has 2, 4 or 6 dimensions
    pub fn make(shape: &[usize]) -> Result<Tensor> {
        let shape = Shape::new(shape)?;
        Ok(Self::zeros(shape))
    }

    /// Zero-filled tensor for an already validated shape
    #[must_use]
    pub fn zeros(shape: Shape) -> Tensor {
        let size = shape.numel();
        Tensor {
            shape,
            data: vec![0.0; size],
        }
    }

    /// Wrap caller-supplied row-major data
    ///
    /// # Errors
    /// `UnsupportedRank` for bad ranks, `ShapeMismatch` if `data.len()`
    /// differs from the product of `shape`
    pub fn from_vec(data: Vec<f64>, shape: &[usize]) -> Result<Tensor> {
        let shape = Shape::new(shape)?;
        Self::with_shape(data, shape)
    }

    pub(crate) fn with_shape(data: Vec<f64>, shape: Shape) -> Result<Tensor> {
        if data.len() != shape.numel() {
            return Err(AmpereError::ShapeMismatch(format!(
                "shape {shape} has {} elements but data length is {}",
                shape.numel(),
                data.len()
            )));
        }
        Ok(Tensor { shape, data })
    }

    /// Internal constructor for outputs whose length is known to match
    pub(crate) fn from_parts(data: Vec<f64>, shape: Shape) -> Tensor {
        debug_assert_eq!(data.len(), shape.numel());
        Tensor { shape, data }
    }

    /// Import a rank-2 tensor from nested rows
    ///
    /// # Errors
    /// `ShapeMismatch` if the rows are ragged
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Tensor> {
        let n = rows.len();
        let m = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(n * m);
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != m {
                return Err(AmpereError::ShapeMismatch(format!(
                    "row {i} has {} columns, expected {m}",
                    row.len()
                )));
            }
            data.extend_from_slice(row);
        }
        Ok(Tensor {
            shape: Shape::matrix(n, m)?,
            data,
        })
    }

    /// Constant-filled rows x cols tensor
    ///
    /// # Errors
    /// `ShapeMismatch` if `rows * cols` overflows
    pub fn fill(rows: usize, cols: usize, value: f64) -> Result<Tensor> {
        let shape = Shape::matrix(rows, cols)?;
        let data = vec![value; shape.numel()];
        Ok(Tensor { shape, data })
    }
}

// ===== ACCESSORS =====
impl Tensor {
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        self.shape.dims()
    }

    #[must_use]
    pub fn shape_info(&self) -> &Shape {
        &self.shape
    }

    #[must_use]
    pub fn rank(&self) -> Rank {
        self.shape.rank()
    }

    #[must_use]
    pub fn numel(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[must_use]
    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Element at `coords`, None when out of bounds
    #[must_use]
    pub fn get(&self, coords: &[usize]) -> Option<f64> {
        self.shape.offset(coords).map(|i| self.data[i])
    }

    /// (rows, cols) of a rank-2 tensor
    pub fn dims2(&self) -> Result<(usize, usize)> {
        match self.shape.dims() {
            &[n, c] => Ok((n, c)),
            dims => Err(AmpereError::UnsupportedRank { rank: dims.len() }),
        }
    }

    /// (n, c, h, w) of a rank-4 tensor
    pub fn dims4(&self) -> Result<(usize, usize, usize, usize)> {
        match self.shape.dims() {
            &[n, c, h, w] => Ok((n, c, h, w)),
            dims => Err(AmpereError::UnsupportedRank { rank: dims.len() }),
        }
    }

    /// (n, c, h, w, x, y) of a rank-6 tensor
    pub fn dims6(&self) -> Result<(usize, usize, usize, usize, usize, usize)> {
        match self.shape.dims() {
            &[n, c, h, w, x, y] => Ok((n, c, h, w, x, y)),
            dims => Err(AmpereError::UnsupportedRank { rank: dims.len() }),
        }
    }

    pub(crate) fn matrix_dims(&self, op: &str) -> Result<(usize, usize)> {
        self.shape.matrix_dims(op)
    }

    /// Nested rows of a rank-2 tensor
    pub fn to_rows(&self) -> Result<Vec<Vec<f64>>> {
        let (_, cols) = self.dims2()?;
        if cols == 0 {
            return Ok(vec![Vec::new(); self.shape()[0]]);
        }
        Ok(self.data.chunks(cols).map(<[f64]>::to_vec).collect())
    }
}
