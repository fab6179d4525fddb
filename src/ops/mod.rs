// Operation enums and tensor method implementations
pub mod binary;
pub mod conv;
pub mod matmul;
pub mod movement;
pub mod reduce;
pub mod unary;

// Re-export operation types
pub use binary::BinaryOp;
pub use matmul::MatmulLayout;
pub use reduce::{IndexMatrix, ReduceOp};
pub use unary::UnaryOp;
