pub mod error;

pub use error::{ClusterOpsError, OpPhase, Result};
