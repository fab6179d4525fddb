//! The execution backend contract
//!
//! [`Backend`] is the operation set shared by the host engine and the GPU
//! engine. A program written against it runs unchanged on either; results
//! agree up to the precision of the narrower backend (f32 on the device).

use crate::error::Result;
use crate::ops::MatmulLayout;
use crate::tensor::Tensor;

/// Operations every execution backend provides
///
/// All operations return a fresh `Self::Tensor` and leave their inputs
/// untouched. Shape errors are the same as the host `Tensor` methods of the
/// same name.
pub trait Backend {
    /// Backend-resident tensor representation
    type Tensor;

    /// Short identifier for logs and benchmark labels
    fn name(&self) -> &'static str;

    /// Move a host tensor onto the backend
    fn upload(&self, tensor: &Tensor) -> Result<Self::Tensor>;

    /// Copy a backend tensor back to the host
    fn download(&self, tensor: &Self::Tensor) -> Result<Tensor>;

    fn add(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor>;
    fn sub(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor>;
    fn mul(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor>;
    fn div(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor>;

    fn add_scalar(&self, tensor: &Self::Tensor, c: f64) -> Result<Self::Tensor>;
    fn mul_scalar(&self, tensor: &Self::Tensor, c: f64) -> Result<Self::Tensor>;

    /// `a * x + b`
    fn affine(&self, tensor: &Self::Tensor, a: f64, b: f64) -> Result<Self::Tensor>;
    /// 1 where x > 0, else 0
    fn mask(&self, tensor: &Self::Tensor) -> Result<Self::Tensor>;
    /// `exp(a * x + b)`
    fn exp_affine(&self, tensor: &Self::Tensor, a: f64, b: f64) -> Result<Self::Tensor>;
    /// `ln(x + b)`
    fn log_shift(&self, tensor: &Self::Tensor, b: f64) -> Result<Self::Tensor>;

    fn matmul(
        &self,
        lhs: &Self::Tensor,
        rhs: &Self::Tensor,
        layout: MatmulLayout,
    ) -> Result<Self::Tensor>;

    fn dot(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.matmul(lhs, rhs, MatmulLayout::NN)
    }
    fn t_dot(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.matmul(lhs, rhs, MatmulLayout::TN)
    }
    fn dot_t(&self, lhs: &Self::Tensor, rhs: &Self::Tensor) -> Result<Self::Tensor> {
        self.matmul(lhs, rhs, MatmulLayout::NT)
    }

    /// Column sums, `[1, cols]`
    fn sum_rows(&self, tensor: &Self::Tensor) -> Result<Self::Tensor>;
    /// Row sums, `[rows, 1]`
    fn sum_cols(&self, tensor: &Self::Tensor) -> Result<Self::Tensor>;

    /// Broadcast a row or column vector to `target` rows or columns
    fn cast(&self, tensor: &Self::Tensor, target: usize) -> Result<Self::Tensor>;
}
