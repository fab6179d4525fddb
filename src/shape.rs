//! Shapes and rank tags
//!
//! A `Shape` is a rank tag plus the list of dimensions. Only ranks 2, 4
//! and 6 exist; every constructor goes through `Shape::new`, so a shape
//! that reaches an operation always has a supported rank.

use crate::error::{AmpereError, Result};
use std::fmt;

/// Sentinel accepted by `reshape` for the one dimension to infer.
pub const INFER: isize = -1;

/// Supported tensor ranks
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rank {
    Two,
    Four,
    Six,
}

impl Rank {
    pub fn from_len(len: usize) -> Result<Self> {
        match len {
            2 => Ok(Rank::Two),
            4 => Ok(Rank::Four),
            6 => Ok(Rank::Six),
            rank => Err(AmpereError::UnsupportedRank { rank }),
        }
    }

    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Rank::Two => 2,
            Rank::Four => 4,
            Rank::Six => 6,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    rank: Rank,
    dims: Vec<usize>,
    numel: usize,
}

/// Element count of `dims`, or None if it does not fit in `usize`
///
/// Zero dimensions are skipped while checking, so every stride of a
/// shape that passes is representable as well.
fn checked_numel(dims: &[usize]) -> Option<usize> {
    let nonzero = dims
        .iter()
        .filter(|&&d| d != 0)
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))?;
    Some(if dims.contains(&0) { 0 } else { nonzero })
}

impl Shape {
    /// Build a shape, rejecting ranks other than 2, 4 and 6
    ///
    /// # Errors
    /// `UnsupportedRank` for other ranks, `ShapeMismatch` if the element
    /// count overflows `usize`
    pub fn new(dims: &[usize]) -> Result<Self> {
        let rank = Rank::from_len(dims.len())?;
        let numel = checked_numel(dims).ok_or_else(|| {
            AmpereError::ShapeMismatch(format!("shape {dims:?} has too many elements"))
        })?;
        Ok(Shape {
            rank,
            dims: dims.to_vec(),
            numel,
        })
    }

    /// Rank-2 shape
    pub fn matrix(rows: usize, cols: usize) -> Result<Self> {
        Self::new(&[rows, cols])
    }

    #[must_use]
    pub fn rank(&self) -> Rank {
        self.rank
    }

    #[must_use]
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    #[must_use]
    pub fn numel(&self) -> usize {
        self.numel
    }

    /// Row-major strides (last axis has stride 1)
    #[must_use]
    pub fn strides(&self) -> Vec<usize> {
        compute_strides(&self.dims)
    }

    /// Linear offset of `coords`, or None if out of bounds / wrong length
    #[must_use]
    pub fn offset(&self, coords: &[usize]) -> Option<usize> {
        if coords.len() != self.dims.len() {
            return None;
        }
        let mut idx = 0;
        for (&c, &d) in coords.iter().zip(&self.dims) {
            if c >= d {
                return None;
            }
            idx = idx * d + c;
        }
        Some(idx)
    }

    /// Rank-2 dims that are both non-zero; what every matrix op needs
    pub fn matrix_dims(&self, op: &str) -> Result<(usize, usize)> {
        match self.dims[..] {
            [rows, cols] if rows > 0 && cols > 0 => Ok((rows, cols)),
            [rows, cols] => Err(AmpereError::ShapeMismatch(format!(
                "{op}: empty matrix {rows}x{cols}"
            ))),
            _ => Err(AmpereError::UnsupportedRank {
                rank: self.dims.len(),
            }),
        }
    }

    /// Resolve a reshape target with at most one `INFER` entry against
    /// `numel` elements.
    pub fn resolve(target: &[isize], numel: usize) -> Result<Self> {
        let infer_count = target.iter().filter(|&&d| d == INFER).count();
        if infer_count > 1 {
            return Err(AmpereError::ShapeMismatch(format!(
                "reshape target {target:?} has more than one inferred dimension"
            )));
        }
        if let Some(bad) = target.iter().find(|&&d| d != INFER && d <= 0) {
            return Err(AmpereError::ShapeMismatch(format!(
                "reshape target {target:?} has invalid dimension {bad}"
            )));
        }

        let known = target
            .iter()
            .filter(|&&d| d != INFER)
            .try_fold(1usize, |acc, &d| acc.checked_mul(d as usize))
            .ok_or_else(|| {
                AmpereError::ShapeMismatch(format!("reshape target {target:?} overflows"))
            })?;

        let dims: Vec<usize> = if infer_count == 1 {
            if known == 0 || numel % known != 0 {
                return Err(AmpereError::ShapeMismatch(format!(
                    "cannot infer dimension: {numel} elements do not divide into {target:?}"
                )));
            }
            let inferred = numel / known;
            target
                .iter()
                .map(|&d| if d == INFER { inferred } else { d as usize })
                .collect()
        } else {
            target.iter().map(|&d| d as usize).collect()
        };

        let shape = Shape::new(&dims)?;
        if shape.numel() != numel {
            return Err(AmpereError::ShapeMismatch(format!(
                "cannot reshape {numel} elements into {dims:?}"
            )));
        }
        Ok(shape)
    }
}

impl fmt::Debug for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.dims)
    }
}

pub fn compute_strides(dims: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dims.len()];
    for i in (0..dims.len().saturating_sub(1)).rev() {
        strides[i] = strides[i + 1] * dims[i + 1];
    }
    strides
}

/// Convert a linear index into coordinates for `dims`
pub(crate) fn index_to_coords(mut idx: usize, dims: &[usize], coords: &mut [usize]) {
    for i in (0..dims.len()).rev() {
        coords[i] = idx % dims[i];
        idx /= dims[i];
    }
}
