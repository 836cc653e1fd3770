use super::{ClusterOp, FailurePolicy, OpBase, ScrutinizeOpBase};
use crate::core::Result;
use crate::engine::ExecutionContext;
use crate::topology::ClusterTopology;
use serde::Serialize;
use std::collections::HashMap;

const OP_NAME: &str = "NMAStageErrorReportOp";
const URL_SUFFIX: &str = "/ErrorReport.txt";

#[derive(Debug, Serialize)]
struct StageErrorReportRequestData {
    catalog_path: String,
}

/// Asks each host's agent to stage its `ErrorReport.txt` for collection.
///
/// Tolerates unreachable hosts unless every host fails.
#[derive(Debug)]
pub struct NmaStageErrorReportOp {
    scrutinize: ScrutinizeOpBase,
}

impl NmaStageErrorReportOp {
    pub fn new(
        id: &str,
        hosts: Vec<String>,
        host_node_name_map: HashMap<String, String>,
        host_cat_path_map: HashMap<String, String>,
    ) -> Result<Self> {
        let scrutinize = ScrutinizeOpBase::new(
            OP_NAME,
            id,
            hosts,
            host_node_name_map,
            host_cat_path_map,
            URL_SUFFIX,
        )?;
        Ok(Self { scrutinize })
    }

    /// Targets `hosts` of `topology`; an empty slice targets every host.
    pub fn from_topology(id: &str, topology: &ClusterTopology, hosts: &[String]) -> Result<Self> {
        let scrutinize = ScrutinizeOpBase::from_topology(OP_NAME, id, topology, hosts, URL_SUFFIX)?;
        Ok(Self { scrutinize })
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.scrutinize.policy = policy;
        self
    }
}

impl ClusterOp for NmaStageErrorReportOp {
    fn base(&self) -> &OpBase {
        &self.scrutinize.base
    }

    fn base_mut(&mut self) -> &mut OpBase {
        &mut self.scrutinize.base
    }

    fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.scrutinize
            .prepare_requests(ctx, |catalog_path| StageErrorReportRequestData {
                catalog_path: catalog_path.to_string(),
            })
    }

    fn process_result(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.scrutinize.process_staged_files_result(ctx)
    }
}
