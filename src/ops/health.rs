use super::{ClusterOp, FailurePolicy, OpBase};
use crate::core::Result;
use crate::dispatch::HttpMethod;
use crate::engine::ExecutionContext;

const OP_NAME: &str = "NMAHealthOp";
const HEALTH_PATH: &str = "health";

/// Checks that the agent on every host answers. Any failing host fails the run.
#[derive(Debug)]
pub struct NmaHealthOp {
    base: OpBase,
}

impl NmaHealthOp {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            base: OpBase::new(OP_NAME, hosts, HttpMethod::Get, HEALTH_PATH),
        }
    }
}

impl ClusterOp for NmaHealthOp {
    fn base(&self) -> &OpBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OpBase {
        &mut self.base
    }

    fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
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
}
