use crate::dispatch::Dispatcher;
use crate::ops::StagedFileInfo;
use crate::topology::{ClusterTopology, NodeState};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Batch label used when a run does not name one.
pub const DEFAULT_BATCH: &str = "context";

/// State owned by one pipeline run and threaded through every operation phase.
pub struct ExecutionContext {
    pub dispatcher: Dispatcher,
    pub topology: ClusterTopology,
    run_id: Option<Uuid>,
    batch: String,
    /// Files staged on each host by diagnostic operations.
    pub staged_files: HashMap<String, Vec<StagedFileInfo>>,
    /// Node states reported by the agents.
    pub node_states: HashMap<String, NodeState>,
    /// Hosts whose request failed in a tolerated way, with the failure detail.
    pub failed_hosts: BTreeMap<String, String>,
}

impl ExecutionContext {
    pub fn new(dispatcher: Dispatcher, topology: ClusterTopology) -> Self {
        Self {
            dispatcher,
            topology,
            run_id: None,
            batch: DEFAULT_BATCH.to_string(),
            staged_files: HashMap::new(),
            node_states: HashMap::new(),
            failed_hosts: BTreeMap::new(),
        }
    }

    /// Starts a new run: assigns a fresh run id and the run's batch label and
    /// drops the outcomes recorded by any earlier run.
    pub fn begin_run(&mut self, batch: &str) -> Uuid {
        let run_id = Uuid::new_v4();
        self.run_id = Some(run_id);
        self.batch = batch.to_string();
        self.staged_files.clear();
        self.node_states.clear();
        self.failed_hosts.clear();
        run_id
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub fn batch(&self) -> &str {
        &self.batch
    }

    pub fn record_staged_files(&mut self, host: &str, files: Vec<StagedFileInfo>) {
        self.staged_files
            .entry(host.to_string())
            .or_default()
            .extend(files);
    }

    pub fn record_failed_host(&mut self, host: &str, detail: impl Into<String>) {
        self.failed_hosts.insert(host.to_string(), detail.into());
    }

    /// Consumes the context, handing the topology back to the caller.
    pub fn into_topology(self) -> ClusterTopology {
        self.topology
    }
}
