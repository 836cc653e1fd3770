use super::{ClusterOp, FailurePolicy, OpBase, ScrutinizeOpBase};
use crate::core::Result;
use crate::engine::ExecutionContext;
use crate::topology::ClusterTopology;
use chrono::{DateTime, Utc};
use serde::Serialize;

const OP_NAME: &str = "NMAStageVerticaLogsOp";
const URL_SUFFIX: &str = "/vertica.log";

/// Bounds on which server logs get staged.
#[derive(Debug, Clone, Default)]
pub struct LogStagingLimits {
    /// Total bytes of log files to stage per host; `0` means no limit.
    pub size_limit_bytes: i64,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
struct StageVerticaLogsRequestData {
    catalog_path: String,
    log_size_limit_bytes: i64,
    log_age_oldest_time: String,
    log_age_newest_time: String,
}

fn format_bound(bound: Option<DateTime<Utc>>) -> String {
    bound.map(|time| time.to_rfc3339()).unwrap_or_default()
}

/// Asks each host's agent to stage the server log files for collection.
#[derive(Debug)]
pub struct NmaStageVerticaLogsOp {
    scrutinize: ScrutinizeOpBase,
    limits: LogStagingLimits,
}

impl NmaStageVerticaLogsOp {
    pub fn from_topology(
        id: &str,
        topology: &ClusterTopology,
        hosts: &[String],
        limits: LogStagingLimits,
    ) -> Result<Self> {
        let scrutinize = ScrutinizeOpBase::from_topology(OP_NAME, id, topology, hosts, URL_SUFFIX)?;
        Ok(Self { scrutinize, limits })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.scrutinize.policy = policy;
        self
    }
}

impl ClusterOp for NmaStageVerticaLogsOp {
    fn base(&self) -> &OpBase {
        &self.scrutinize.base
    }

    fn base_mut(&mut self) -> &mut OpBase {
        &mut self.scrutinize.base
    }

    fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let limits = self.limits.clone();
        self.scrutinize.prepare_requests(ctx, |catalog_path| StageVerticaLogsRequestData {
            catalog_path: catalog_path.to_string(),
            log_size_limit_bytes: limits.size_limit_bytes,
            log_age_oldest_time: format_bound(limits.oldest),
            log_age_newest_time: format_bound(limits.newest),
        })
    }

    fn process_result(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.scrutinize.process_staged_files_result(ctx)
    }
}
