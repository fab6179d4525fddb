//! Parameter initializers
//!
//! The plain functions draw from the thread-local generator; the `_with`
//! variants take any `Rng` so runs can be seeded.

use crate::error::Result;
use crate::shape::Shape;
use crate::tensor::Tensor;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

/// Constant-filled `[rows, cols]` tensor
pub fn fill(rows: usize, cols: usize, value: f64) -> Result<Tensor> {
    Tensor::fill(rows, cols, value)
}

/// Standard normal samples scaled by `scale`
///
/// # Errors
/// `ShapeMismatch` if `rows * cols` overflows
pub fn random_normal(rows: usize, cols: usize, scale: f64) -> Result<Tensor> {
    random_normal_with(&mut rand::rng(), rows, cols, scale)
}

pub fn random_normal_with<R: Rng + ?Sized>(
    rng: &mut R,
    rows: usize,
    cols: usize,
    scale: f64,
) -> Result<Tensor> {
    let shape = Shape::matrix(rows, cols)?;
    let data: Vec<f64> = (0..shape.numel())
        .map(|_| {
            let z: f64 = StandardNormal.sample(&mut *rng);
            z * scale
        })
        .collect();
    Ok(Tensor::from_parts(data, shape))
}

/// He initialization: normal samples scaled by 1/sqrt(rows)
///
/// `rows` is the fan-in of a weight matrix used as `x @ w`.
pub fn he_init(rows: usize, cols: usize) -> Result<Tensor> {
    he_init_with(&mut rand::rng(), rows, cols)
}

pub fn he_init_with<R: Rng + ?Sized>(rng: &mut R, rows: usize, cols: usize) -> Result<Tensor> {
    let scale = 1.0 / (rows.max(1) as f64).sqrt();
    random_normal_with(rng, rows, cols, scale)
}
