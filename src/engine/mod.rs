pub mod context;
pub mod runner;

pub use context::{DEFAULT_BATCH, ExecutionContext};
pub use runner::OpEngine;
