//! Multi-core host backend

use crate::backend::Backend;
use crate::config::EngineConfig;
use crate::error::{AmpereError, Result};
use crate::ops::MatmulLayout;
use crate::tensor::Tensor;
use log::debug;
use rayon::{ThreadPool, ThreadPoolBuilder};

/// Host execution engine
///
/// Owns the worker pool used by matrix multiply. Every other operation runs
/// on the calling thread.
pub struct HostBackend {
    pool: ThreadPool,
    threads: usize,
}

impl std::fmt::Debug for HostBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostBackend")
            .field("threads", &self.threads)
            .finish()
    }
}

impl HostBackend {
    /// Build the worker pool described by `config`
    ///
    /// # Errors
    /// `InvalidConfig` for a zero thread count or if the pool cannot start
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let threads = config.resolved_threads()?;
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("ampere-matmul-{i}"))
            .build()
            .map_err(|e| AmpereError::InvalidConfig(format!("worker pool: {e}")))?;
        debug!("host backend started with {threads} matmul workers");
        Ok(HostBackend { pool, threads })
    }

    /// Backend configured from the environment
    pub fn from_env() -> Result<Self> {
        Self::new(&EngineConfig::from_env())
    }

    #[must_use]
    pub fn threads(&self) -> usize {
        self.threads
    }
}

impl Backend for HostBackend {
    type Tensor = Tensor;

    fn name(&self) -> &'static str {
        "host"
    }

    fn upload(&self, tensor: &Tensor) -> Result<Tensor> {
        Ok(tensor.clone())
    }

    fn download(&self, tensor: &Tensor) -> Result<Tensor> {
        Ok(tensor.clone())
    }

    fn add(&self, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
        lhs.add(rhs)
    }
    fn sub(&self, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
        lhs.sub(rhs)
    }
    fn mul(&self, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
        lhs.mul(rhs)
    }
    fn div(&self, lhs: &Tensor, rhs: &Tensor) -> Result<Tensor> {
        lhs.div(rhs)
    }

    fn add_scalar(&self, tensor: &Tensor, c: f64) -> Result<Tensor> {
        Ok(tensor.add_scalar(c))
    }
    fn mul_scalar(&self, tensor: &Tensor, c: f64) -> Result<Tensor> {
        Ok(tensor.mul_scalar(c))
    }

    fn affine(&self, tensor: &Tensor, a: f64, b: f64) -> Result<Tensor> {
        Ok(tensor.affine(a, b))
    }
    fn mask(&self, tensor: &Tensor) -> Result<Tensor> {
        Ok(tensor.mask())
    }
    fn exp_affine(&self, tensor: &Tensor, a: f64, b: f64) -> Result<Tensor> {
        Ok(tensor.exp_affine(a, b))
    }
    fn log_shift(&self, tensor: &Tensor, b: f64) -> Result<Tensor> {
        Ok(tensor.log_shift(b))
    }

    fn matmul(&self, lhs: &Tensor, rhs: &Tensor, layout: MatmulLayout) -> Result<Tensor> {
        // Row tasks spawned inside `install` are bounded by this pool
        self.pool.install(|| lhs.matmul(rhs, layout))
    }

    fn sum_rows(&self, tensor: &Tensor) -> Result<Tensor> {
        tensor.sum_rows()
    }
    fn sum_cols(&self, tensor: &Tensor) -> Result<Tensor> {
        tensor.sum_cols()
    }

    fn cast(&self, tensor: &Tensor, target: usize) -> Result<Tensor> {
        tensor.cast(target)
    }
}
