pub mod add_nodes;
pub mod health;
pub mod node_state;
pub mod scrutinize;
pub mod stage_error_report;
pub mod stage_vertica_logs;

pub use add_nodes::AddNodesOp;
pub use health::NmaHealthOp;
pub use node_state::NmaNodeStateOp;
pub use scrutinize::{ScrutinizeOpBase, StagedFileInfo, generate_scrutinize_id};
pub use stage_error_report::NmaStageErrorReportOp;
pub use stage_vertica_logs::{LogStagingLimits, NmaStageVerticaLogsOp};

use crate::core::{ClusterOpsError, Result};
use crate::dispatch::{HostFailure, HostRequest, HostResultMap, HttpMethod};
use crate::engine::ExecutionContext;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// Lifecycle of one operation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpState {
    Created,
    Prepared,
    Executed,
    Finalized,
    Failed,
}

/// How an operation treats hosts whose request failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// The phase succeeds while at least one host passed.
    Tolerant,
    /// Any failed host fails the phase.
    Strict,
}

impl FailurePolicy {
    /// Decides whether the per-host `failures` out of `total` hosts fail the phase.
    pub fn check(&self, op_name: &str, total: usize, failures: &[(String, String)]) -> Result<()> {
        if failures.is_empty() {
            return Ok(());
        }
        let detail = failures
            .iter()
            .map(|(host, failure)| format!("{}: {}", host, failure))
            .collect::<Vec<_>>()
            .join("; ");

        match self {
            FailurePolicy::Tolerant if failures.len() < total => Ok(()),
            FailurePolicy::Tolerant => Err(ClusterOpsError::Transport(format!(
                "[{}] all {} hosts failed: {}",
                op_name, total, detail
            ))),
            FailurePolicy::Strict => Err(ClusterOpsError::Transport(format!(
                "[{}] {} of {} hosts failed: {}",
                op_name,
                failures.len(),
                total,
                detail
            ))),
        }
    }
}

/// Fields and plumbing shared by every operation.
#[derive(Debug)]
pub struct OpBase {
    name: String,
    pub hosts: Vec<String>,
    pub http_method: HttpMethod,
    pub url_suffix: String,
    pub host_request_body_map: HashMap<String, String>,
    pub results: HostResultMap,
    requests: HashMap<String, HostRequest>,
    state: OpState,
}

impl OpBase {
    pub fn new(
        name: impl Into<String>,
        hosts: Vec<String>,
        http_method: HttpMethod,
        url_suffix: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hosts,
            http_method,
            url_suffix: url_suffix.into(),
            host_request_body_map: HashMap::new(),
            results: HashMap::new(),
            requests: HashMap::new(),
            state: OpState::Created,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> OpState {
        self.state
    }

    /// Moves to `next`, rejecting anything but the forward transitions.
    pub fn advance(&mut self, next: OpState) -> Result<()> {
        let allowed = matches!(
            (self.state, next),
            (OpState::Created, OpState::Prepared)
                | (OpState::Prepared, OpState::Executed)
                | (OpState::Executed, OpState::Finalized)
        );
        if !allowed {
            return Err(ClusterOpsError::InvalidState(format!(
                "[{}] cannot move from {:?} to {:?}",
                self.name, self.state, next
            )));
        }
        self.state = next;
        Ok(())
    }

    /// Marks the operation failed. Finalized operations stay finalized.
    pub fn mark_failed(&mut self) {
        if self.state != OpState::Finalized {
            self.state = OpState::Failed;
        }
    }

    /// Serializes `data` as the JSON body sent to `host`.
    pub fn set_request_body<T: Serialize>(&mut self, host: &str, data: &T) -> Result<()> {
        let body = serde_json::to_string(data).map_err(|e| {
            ClusterOpsError::Marshal(format!(
                "[{}] fail to marshal request data to JSON string, detail {}",
                self.name, e
            ))
        })?;
        self.host_request_body_map.insert(host.to_string(), body);
        Ok(())
    }

    /// Builds one request per host, with the path produced by `path_for`.
    pub fn setup_host_requests<F>(&mut self, path_for: F)
    where
        F: Fn(&str) -> String,
    {
        self.requests = self
            .hosts
            .iter()
            .map(|host| {
                let request = HostRequest {
                    method: self.http_method,
                    path: path_for(host),
                    body: self.host_request_body_map.get(host).cloned(),
                };
                (host.clone(), request)
            })
            .collect();
    }

    pub fn requests(&self) -> &HashMap<String, HostRequest> {
        &self.requests
    }

    /// Fans the prepared requests out through the context's dispatcher.
    pub async fn run_execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.results = ctx.dispatcher.dispatch(&self.requests).await?;
        Ok(())
    }

    /// Passed and failed hosts, each sorted by host address.
    pub fn partition_results(&self) -> (Vec<(&str, &JsonValue)>, Vec<(&str, &HostFailure)>) {
        let mut passed = Vec::new();
        let mut failed = Vec::new();
        for (host, result) in &self.results {
            match (result.body(), result.failure()) {
                (Some(body), _) => passed.push((host.as_str(), body)),
                (None, Some(failure)) => failed.push((host.as_str(), failure)),
                (None, None) => {}
            }
        }
        passed.sort_by(|a, b| a.0.cmp(b.0));
        failed.sort_by(|a, b| a.0.cmp(b.0));
        (passed, failed)
    }
}

/// The four-phase operation contract driven by [`crate::engine::OpEngine`].
///
/// Implementors embed an [`OpBase`]; `execute` dispatches the requests built
/// in `prepare` and then runs `process_result`.
#[async_trait]
pub trait ClusterOp: Send {
    fn base(&self) -> &OpBase;

    fn base_mut(&mut self) -> &mut OpBase;

    fn name(&self) -> &str {
        self.base().name()
    }

    /// Builds per-host requests and registers the hosts with the dispatcher.
    fn prepare(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    async fn execute(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        self.base_mut().run_execute(ctx).await?;
        self.process_result(ctx)
    }

    /// Interprets `base().results` and records outcomes into `ctx`.
    fn process_result(&mut self, ctx: &mut ExecutionContext) -> Result<()>;

    fn finalize(&mut self, _ctx: &mut ExecutionContext) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> OpBase {
        OpBase::new("TestOp", vec!["h1".to_string()], HttpMethod::Get, "health")
    }

    #[test]
    fn test_state_machine_forward_only() {
        let mut op = base();
        assert!(op.advance(OpState::Executed).is_err());
        op.advance(OpState::Prepared).unwrap();
        op.advance(OpState::Executed).unwrap();
        op.advance(OpState::Finalized).unwrap();
        assert!(op.advance(OpState::Prepared).is_err());
    }

    #[test]
    fn test_failed_is_terminal() {
        let mut op = base();
        op.advance(OpState::Prepared).unwrap();
        op.mark_failed();
        assert_eq!(op.state(), OpState::Failed);
        assert!(op.advance(OpState::Executed).is_err());
        assert!(op.advance(OpState::Prepared).is_err());
    }

    #[test]
    fn test_failure_policies() {
        let failures = vec![("h2".to_string(), "unreachable".to_string())];
        assert!(FailurePolicy::Tolerant.check("op", 3, &failures).is_ok());
        assert!(FailurePolicy::Strict.check("op", 3, &failures).is_err());
        assert!(FailurePolicy::Tolerant.check("op", 1, &failures).is_err());
        assert!(FailurePolicy::Strict.check("op", 3, &[]).is_ok());
    }

    #[test]
    fn test_setup_host_requests_attaches_bodies() {
        let mut op = OpBase::new(
            "TestOp",
            vec!["h1".to_string(), "h2".to_string()],
            HttpMethod::Post,
            "/ErrorReport.txt",
        );
        op.set_request_body("h1", &serde_json::json!({"catalog_path": "/c1"}))
            .unwrap();
        op.setup_host_requests(|host| format!("stage/{}", host));

        let requests = op.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests["h1"].path, "stage/h1");
        assert_eq!(
            requests["h1"].body.as_deref(),
            Some(r#"{"catalog_path":"/c1"}"#)
        );
        assert!(requests["h2"].body.is_none());
    }
}
