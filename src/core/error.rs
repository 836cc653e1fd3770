use std::fmt;
use thiserror::Error;

/// Phase of the operation contract in which an error surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpPhase {
    Prepare,
    Execute,
    Finalize,
}

impl fmt::Display for OpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let phase = match self {
            OpPhase::Prepare => "prepare",
            OpPhase::Execute => "execute",
            OpPhase::Finalize => "finalize",
        };
        f.write_str(phase)
    }
}

#[derive(Error, Debug)]
pub enum ClusterOpsError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Config mismatch: {0}")]
    ConfigMismatch(String),

    #[error("Host {0} is already part of the database")]
    DuplicateHost(String),

    #[error("Could not generate a node name for host {0}")]
    NameGeneration(String),

    #[error("Marshal error: {0}")]
    Marshal(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),

    #[error("Invalid operation state: {0}")]
    InvalidState(String),

    #[error("Config file error: {0}")]
    Config(String),

    #[error("[{op}] {phase} failed: {source}")]
    Operation {
        op: String,
        phase: OpPhase,
        #[source]
        source: Box<ClusterOpsError>,
    },
}

impl ClusterOpsError {
    /// Wraps the error with the operation and phase that produced it.
    pub fn in_op(self, op: impl Into<String>, phase: OpPhase) -> Self {
        Self::Operation {
            op: op.into(),
            phase,
            source: Box::new(self),
        }
    }

    /// Returns the innermost error, skipping operation wrappers.
    pub fn root(&self) -> &ClusterOpsError {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClusterOpsError>;

impl From<serde_json::Error> for ClusterOpsError {
    fn from(err: serde_json::Error) -> Self {
        Self::Marshal(err.to_string())
    }
}

impl From<serde_yaml::Error> for ClusterOpsError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<std::io::Error> for ClusterOpsError {
    fn from(err: std::io::Error) -> Self {
        Self::Config(err.to_string())
    }
}
