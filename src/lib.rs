//! # ampere
//!
//! A dense tensor engine with two interchangeable execution backends:
//! a multi-core host backend and (with the `gpu` feature) a wgpu compute
//! backend.
//!
//! Tensors are rank 2, 4 or 6, stored as flat row-major f64 buffers. Every
//! operation returns a new tensor; failures are typed [`AmpereError`]s.
//!
//! ```
//! use ampere::{Backend, EngineConfig, HostBackend, Tensor};
//!
//! let a = Tensor::from_rows(&[[1.0, 2.0], [3.0, 4.0]])?;
//! let b = ampere::init::fill(2, 2, 1.0)?;
//!
//! let host = HostBackend::new(&EngineConfig::default())?;
//! let c = host.dot(&a, &b)?;
//! assert_eq!(c.data(), &[3.0, 3.0, 7.0, 7.0]);
//! # Ok::<(), ampere::AmpereError>(())
//! ```
//!
//! Diagnostics go through the `log` facade; install any logger to see them.

pub mod backend;
pub mod config;
pub mod error;
pub mod host;
pub mod init;
pub mod ops;
pub mod registry;
pub mod shape;
pub mod tensor;

#[cfg(feature = "gpu")]
pub mod gpu;

pub use backend::Backend;
pub use config::{DeviceConfig, EngineConfig, PowerPreference};
pub use error::{AmpereError, Result};
pub use host::HostBackend;
pub use ops::{BinaryOp, IndexMatrix, MatmulLayout, ReduceOp, UnaryOp};
pub use registry::{Lease, Registry};
pub use shape::{INFER, Rank, Shape};
pub use tensor::Tensor;

#[cfg(feature = "gpu")]
pub use gpu::{DeviceTensor, GpuBackend, Residency, is_gpu_available};
