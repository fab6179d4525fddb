use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmpereError {
    #[error("Unsupported rank {rank}: only ranks 2, 4 and 6 are supported")]
    UnsupportedRank { rank: usize },

    #[error("Invalid axis permutation {axes:?} for a rank-{rank} tensor")]
    InvalidAxis { axes: Vec<usize>, rank: usize },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("Invalid pad spec: expected {expected} rows of (before, after), got {actual}")]
    InvalidPadSpec { expected: usize, actual: usize },

    #[error("Cannot cast shape {shape:?}: neither dimension is 1")]
    UnsupportedCastShape { shape: Vec<usize> },

    #[error("Dimension mismatch: ({lhs_rows},{lhs_cols}) @ ({rhs_rows},{rhs_cols})")]
    DimensionMismatch {
        lhs_rows: usize,
        lhs_cols: usize,
        rhs_rows: usize,
        rhs_cols: usize,
    },

    #[error("Batch mismatch: input has {input} rows but kernel has {kernel}")]
    BatchMismatch { input: usize, kernel: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("No GPU device available: {0}")]
    DeviceUnavailable(String),

    #[error("Device allocation of {bytes} bytes failed: {message}")]
    DeviceAllocationFailed { bytes: u64, message: String },

    #[error("Device transfer failed: {0}")]
    DeviceTransferFailed(String),

    #[error("GPU call `{call_site}` failed: {message}")]
    LibraryCallFailed {
        call_site: &'static str,
        message: String,
    },

    #[error("Device buffer {id} was already released")]
    BufferReleased { id: u64 },
}

pub type Result<T> = std::result::Result<T, AmpereError>;

impl AmpereError {
    pub(crate) fn shape_mismatch(op: &str, lhs: &[usize], rhs: &[usize]) -> Self {
        AmpereError::ShapeMismatch(format!("{op}: {lhs:?} vs {rhs:?}"))
    }
}
