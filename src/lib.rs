// ============================================================================
// clusterops Library
// ============================================================================

pub mod config;
pub mod core;
pub mod dispatch;
pub mod engine;
pub mod host_maps;
pub mod ops;
pub mod topology;

// Re-export main types for convenience
pub use core::{ClusterOpsError, OpPhase, Result};
pub use config::ClusterConfig;
pub use dispatch::{
    CancelHandle, Dispatcher, HostFailure, HostFailureKind, HostRequest, HostResponse, HostResult,
    HostResultMap, HostTransport, HttpMethod, HttpTransport, HttpTransportConfig, InMemoryTransport,
    ScriptedReply,
};
pub use engine::{ExecutionContext, OpEngine};
pub use host_maps::validate_host_maps;
pub use ops::{
    AddNodesOp, ClusterOp, FailurePolicy, LogStagingLimits, NmaHealthOp, NmaNodeStateOp,
    NmaStageErrorReportOp, NmaStageVerticaLogsOp, OpBase, OpState, StagedFileInfo,
    generate_scrutinize_id,
};
pub use topology::{ClusterTopology, CreateDatabaseOptions, Node, NodeState};
