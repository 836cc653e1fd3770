use super::{FailurePolicy, OpBase};
use crate::core::{ClusterOpsError, Result};
use crate::dispatch::HttpMethod;
use crate::engine::ExecutionContext;
use crate::host_maps::validate_host_maps;
use crate::topology::ClusterTopology;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::{Level, event};

pub const SCRUTINIZE_URL_PREFIX: &str = "scrutinize/collect/";

/// A file the agent staged for collection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StagedFileInfo {
    pub name: String,
    pub size_bytes: i64,
    pub mod_time: String,
}

/// Identifier grouping every file staged by one diagnostic collection.
pub fn generate_scrutinize_id() -> String {
    format!("Scrutinize.{}", Utc::now().format("%Y%m%d%H%M%S"))
}

/// Shared state of the diagnostic staging operations.
///
/// Requests go to `scrutinize/collect/<id>/<node name>/<batch><suffix>`; the
/// batch comes from the running [`ExecutionContext`].
#[derive(Debug)]
pub struct ScrutinizeOpBase {
    pub base: OpBase,
    pub id: String,
    pub host_node_name_map: HashMap<String, String>,
    pub host_cat_path_map: HashMap<String, String>,
    pub policy: FailurePolicy,
}

impl ScrutinizeOpBase {
    /// The caller supplies maps keyed by exactly `hosts`.
    pub fn new(
        name: &str,
        id: &str,
        hosts: Vec<String>,
        host_node_name_map: HashMap<String, String>,
        host_cat_path_map: HashMap<String, String>,
        url_suffix: &str,
    ) -> Result<Self> {
        validate_host_maps(&hosts, &[&host_node_name_map, &host_cat_path_map])?;
        Ok(Self {
            base: OpBase::new(name, hosts, HttpMethod::Post, url_suffix),
            id: id.to_string(),
            host_node_name_map,
            host_cat_path_map,
            policy: FailurePolicy::Tolerant,
        })
    }

    /// Builds the maps for `hosts` from the topology's node records.
    pub fn from_topology(
        name: &str,
        id: &str,
        topology: &ClusterTopology,
        hosts: &[String],
        url_suffix: &str,
    ) -> Result<Self> {
        let hosts = if hosts.is_empty() {
            topology.host_list().to_vec()
        } else {
            hosts.to_vec()
        };
        let node_names = topology.host_node_name_map(&hosts)?;
        let catalog_paths = topology.host_catalog_path_map(&hosts)?;
        Self::new(name, id, hosts, node_names, catalog_paths, url_suffix)
    }

    /// Serializes one body per host, registers the hosts with the dispatcher
    /// and builds the staging requests.
    pub fn prepare_requests<T, F>(&mut self, ctx: &mut ExecutionContext, body_for: F) -> Result<()>
    where
        T: Serialize,
        F: Fn(&str) -> T,
    {
        validate_host_maps(
            &self.base.hosts,
            &[&self.host_node_name_map, &self.host_cat_path_map],
        )?;

        let hosts = self.base.hosts.clone();
        for host in &hosts {
            let catalog_path = self.host_cat_path_map.get(host).ok_or_else(|| {
                ClusterOpsError::ConfigMismatch(format!("no catalog path for host {}", host))
            })?;
            let body = body_for(catalog_path);
            self.base.set_request_body(host, &body)?;
        }
        ctx.dispatcher.setup(&hosts);

        let prefix = format!("{}{}", SCRUTINIZE_URL_PREFIX, self.id);
        let batch = ctx.batch().to_string();
        let node_names = &self.host_node_name_map;
        let url_suffix = self.base.url_suffix.clone();
        let paths: HashMap<String, String> = hosts
            .iter()
            .map(|host| {
                let node = node_names.get(host).map(String::as_str).unwrap_or_default();
                (host.clone(), format!("{}/{}/{}{}", prefix, node, batch, url_suffix))
            })
            .collect();
        self.base
            .setup_host_requests(|host| paths.get(host).cloned().unwrap_or_default());
        Ok(())
    }

    /// Records each passing host's staged file list into `ctx`, then applies
    /// the failure policy to the hosts that failed or answered unreadably.
    pub fn process_staged_files_result(&mut self, ctx: &mut ExecutionContext) -> Result<()> {
        let name = self.base.name().to_string();
        let total = self.base.results.len();
        let mut failures: Vec<(String, String)> = Vec::new();
        let mut staged: Vec<(String, Vec<StagedFileInfo>)> = Vec::new();

        let (passed, failed) = self.base.partition_results();
        for (host, body) in passed {
            match parse_staged_files(body) {
                Ok(files) => {
                    event!(Level::DEBUG, op = %name, host, files = files.len(), "files staged");
                    staged.push((host.to_string(), files));
                }
                Err(err) => failures.push((host.to_string(), err.to_string())),
            }
        }
        for (host, failure) in failed {
            failures.push((host.to_string(), failure.to_string()));
        }

        for (host, files) in staged {
            ctx.record_staged_files(&host, files);
        }
        for (host, detail) in &failures {
            event!(Level::WARN, op = %name, host = %host, detail = %detail, "host did not stage files");
            ctx.record_failed_host(host, detail.clone());
        }

        self.policy.check(&name, total, &failures)
    }
}

fn parse_staged_files(body: &JsonValue) -> Result<Vec<StagedFileInfo>> {
    if body.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(body.clone()).map_err(|e| {
        ClusterOpsError::Transport(format!("malformed staged file list: {}", e))
    })
}
