use super::{ClusterOp, FailurePolicy, OpBase};
use crate::core::{ClusterOpsError, Result};
use crate::dispatch::HttpMethod;
use crate::engine::ExecutionContext;
use crate::topology::ClusterTopology;
use tracing::{Level, event};

const OP_NAME: &str = "AddNodesOp";
const HEALTH_PATH: &str = "health";

/// Adds hosts to the database as new nodes of one subcluster.
///
/// The new nodes are staged on a copy of the topology in `prepare` and only
/// become visible in the context's topology once every new host's agent has
/// answered and `finalize` runs.
#[derive(Debug)]
pub struct AddNodesOp {
    base: OpBase,
    subcluster: String,
    staged: Option<ClusterTopology>,
}

impl AddNodesOp {
    pub fn new(new_hosts: Vec<String>, subcluster: &str) -> Self {
        Self {
            base: OpBase::new(OP_NAME, new_hosts, HttpMethod::Get, HEALTH_PATH),
            subcluster: subcluster.to_string(),
            staged: None,
        }
    }

    /// The topology that will be committed, once prepared.
    pub fn staged(&self) -> Option<&ClusterTopology> {
        self.staged.as_ref()
    }
}

impl ClusterOp for AddNodesOp {
    fn base(&self) -> &OpBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OpBase {
        &mut self.base
    }

    fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        if self.base.hosts.is_empty() {
            return Err(ClusterOpsError::Validation(
                "no hosts given to add".to_string(),
            ));
        }
        let (existing, _) = ctx.topology.contain_nodes(&self.base.hosts);
        if let Some(host) = existing.into_iter().next() {
            return Err(ClusterOpsError::DuplicateHost(host));
        }

        let mut staged = ctx.topology.copy(&[]);
        staged.add_hosts(&self.base.hosts, &self.subcluster)?;
        self.staged = Some(staged);

        ctx.dispatcher.setup(&self.base.hosts);
        self.base.setup_host_requests(|_| HEALTH_PATH.to_string());
        Ok(())
    }

    fn process_result(&mut self, _ctx: &mut ExecutionContext) -> Result<()> {
        let (_, failed) = self.base.partition_results();
        let failures: Vec<(String, String)> = failed
            .into_iter()
            .map(|(host, failure)| (host.to_string(), failure.to_string()))
            .collect();
        FailurePolicy::Strict.check(self.base.name(), self.base.results.len(), &failures)
    }

    fn finalize(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let staged = self.staged.take().ok_or_else(|| {
            ClusterOpsError::InvalidState(format!("[{}] nothing staged to commit", OP_NAME))
        })?;
        event!(
            Level::INFO,
            op = OP_NAME,
            added = self.base.hosts.len(),
            subcluster = %self.subcluster,
            "committing new nodes"
        );
        ctx.topology = staged;
        Ok(())
    }
}
