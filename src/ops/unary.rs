use crate::tensor::Tensor;

/// Unary transforms with a device counterpart
///
/// - `Mask`: 1 where x > 0, else 0
/// - `Affine(a, b)`: a*x + b
/// - `ExpAffine(a, b)`: exp(a*x + b)
/// - `LogShift(b)`: ln(x + b)
///
/// Anything else goes through `Tensor::apply`, which is host only.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum UnaryOp {
    Mask,
    Affine(f64, f64),
    ExpAffine(f64, f64),
    LogShift(f64),
}

impl UnaryOp {
    #[inline]
    #[must_use]
    pub fn eval(self, x: f64) -> f64 {
        match self {
            UnaryOp::Mask => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            UnaryOp::Affine(a, b) => a * x + b,
            UnaryOp::ExpAffine(a, b) => (a * x + b).exp(),
            UnaryOp::LogShift(b) => (x + b).ln(),
        }
    }
}

impl Tensor {
    /// Map `f` over every element; `f` must be pure
    #[must_use]
    pub fn apply<F>(&self, f: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        let data: Vec<f64> = self.data().iter().map(|&x| f(x)).collect();
        // Same length as self, so the shape check cannot fail
        Tensor::from_parts(data, self.shape_info().clone())
    }

    #[must_use]
    pub fn unary_op(&self, op: UnaryOp) -> Tensor {
        self.apply(|x| op.eval(x))
    }

    #[must_use]
    pub fn mask(&self) -> Tensor {
        self.unary_op(UnaryOp::Mask)
    }

    #[must_use]
    pub fn affine(&self, a: f64, b: f64) -> Tensor {
        self.unary_op(UnaryOp::Affine(a, b))
    }

    #[must_use]
    pub fn exp_affine(&self, a: f64, b: f64) -> Tensor {
        self.unary_op(UnaryOp::ExpAffine(a, b))
    }

    #[must_use]
    pub fn log_shift(&self, b: f64) -> Tensor {
        self.unary_op(UnaryOp::LogShift(b))
    }
}
