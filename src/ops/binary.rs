use crate::error::{AmpereError, Result};
use crate::tensor::Tensor;

/// Binary operations: two inputs of identical shape, one output
///
/// There is no implicit broadcasting; use `cast` to expand a vector first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add, // x + y
    Sub, // x - y
    Mul, // x * y (element-wise)
    Div, // x / y (element-wise)
}

impl BinaryOp {
    #[inline]
    #[must_use]
    pub fn eval(self, a: f64, b: f64) -> f64 {
        match self {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
        }
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
        }
    }
}

impl Tensor {
    /// Apply `op` element by element
    ///
    /// # Errors
    /// `ShapeMismatch` unless both shapes are identical
    pub fn binary_op(&self, other: &Tensor, op: BinaryOp) -> Result<Tensor> {
        if self.shape() != other.shape() {
            return Err(AmpereError::shape_mismatch(
                op.name(),
                self.shape(),
                other.shape(),
            ));
        }
        let data = self
            .data()
            .iter()
            .zip(other.data())
            .map(|(&a, &b)| op.eval(a, b))
            .collect();
        Ok(Tensor::from_parts(data, self.shape_info().clone()))
    }

    pub fn add(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(other, BinaryOp::Add)
    }
    pub fn sub(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(other, BinaryOp::Sub)
    }
    pub fn mul(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(other, BinaryOp::Mul)
    }
    pub fn div(&self, other: &Tensor) -> Result<Tensor> {
        self.binary_op(other, BinaryOp::Div)
    }

    // Scalar variants; the scalar is the right operand.
    #[must_use]
    pub fn add_scalar(&self, c: f64) -> Tensor {
        self.apply(|x| x + c)
    }
    #[must_use]
    pub fn sub_scalar(&self, c: f64) -> Tensor {
        self.apply(|x| x - c)
    }
    #[must_use]
    pub fn mul_scalar(&self, c: f64) -> Tensor {
        self.apply(|x| x * c)
    }
}
