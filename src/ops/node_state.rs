use super::{ClusterOp, OpBase};
use crate::core::Result;
use crate::dispatch::HttpMethod;
use crate::engine::ExecutionContext;
use crate::topology::NodeState;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use tracing::{Level, event};

const OP_NAME: &str = "NMANodeStateOp";
const NODE_STATE_PATH: &str = "node-state";

#[derive(Debug, Deserialize)]
struct NodeStateResponse {
    state: String,
}

fn parse_state(body: &JsonValue) -> Option<NodeState> {
    serde_json::from_value::<NodeStateResponse>(body.clone())
        .ok()
        .map(|response| NodeState::parse(&response.state))
}

/// Polls each host's agent for its node state.
///
/// Hosts that cannot be reached are reported as `Unknown` rather than failing
/// the run. States are written back into the topology on finalize.
#[derive(Debug)]
pub struct NmaNodeStateOp {
    base: OpBase,
}

impl NmaNodeStateOp {
    pub fn new(hosts: Vec<String>) -> Self {
        Self {
            base: OpBase::new(OP_NAME, hosts, HttpMethod::Get, NODE_STATE_PATH),
        }
    }
}

impl ClusterOp for NmaNodeStateOp {
    fn base(&self) -> &OpBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut OpBase {
        &mut self.base
    }

    fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        if self.base.hosts.is_empty() {
            self.base.hosts = ctx.topology.host_list().to_vec();
        }
        ctx.dispatcher.setup(&self.base.hosts);
        self.base
            .setup_host_requests(|_| NODE_STATE_PATH.to_string());
        Ok(())
    }

    fn process_result(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let (passed, failed) = self.base.partition_results();
        let mut states: Vec<(String, NodeState)> = Vec::new();
        let mut failures: Vec<(String, String)> = Vec::new();

        for (host, body) in passed {
            match parse_state(body) {
                Some(state) => states.push((host.to_string(), state)),
                None => {
                    states.push((host.to_string(), NodeState::Unknown));
                    failures.push((host.to_string(), "unreadable node state".to_string()));
                }
            }
        }
        for (host, failure) in failed {
            states.push((host.to_string(), NodeState::Unknown));
            failures.push((host.to_string(), failure.to_string()));
        }

        for (host, state) in states {
            ctx.node_states.insert(host, state);
        }
        for (host, detail) in failures {
            event!(Level::WARN, op = OP_NAME, host = %host, detail = %detail, "node state unknown");
            ctx.record_failed_host(&host, detail);
        }
        Ok(())
    }

    fn finalize(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        for host in &self.base.hosts {
            let Some(state) = ctx.node_states.get(host).copied() else {
                continue;
            };
            if !ctx.topology.set_node_state(host, state) {
                event!(Level::DEBUG, host = %host, "host not in topology, state not committed");
            }
        }
        ctx.topology.refresh_primary_up_nodes();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_state() {
        assert_eq!(parse_state(&json!({"state": "UP"})), Some(NodeState::Up));
        assert_eq!(parse_state(&json!({"state": "DOWN"})), Some(NodeState::Down));
        assert_eq!(parse_state(&json!({"other": 1})), None);
        assert_eq!(parse_state(&JsonValue::Null), None);
    }
}
