//! Tensor Module
//!
//! Numerics shared by the graph, data and model code:
//! - Row-major host `f32` matrices for preprocessing and checkpoints
//! - Named candle `Var` parameters behind the `Parameterized` trait

pub mod matrix;
pub mod param;

pub use matrix::Matrix;
pub use param::{Parameter, Parameterized};
