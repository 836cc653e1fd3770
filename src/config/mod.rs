use crate::core::{ClusterOpsError, Result};
use crate::topology::{ClusterTopology, Node};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// File name used when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "cluster_config.yaml";

/// Environment variable overriding [`DEFAULT_CONFIG_FILE`].
pub const CONFIG_PATH_ENV: &str = "CLUSTEROPS_CONFIG";

/// Path of the configuration file: `CLUSTEROPS_CONFIG` if set, else
/// `cluster_config.yaml` in the working directory.
pub fn default_config_path() -> PathBuf {
    match std::env::var(CONFIG_PATH_ENV) {
        Ok(path) if !path.trim().is_empty() => PathBuf::from(path),
        _ => PathBuf::from(DEFAULT_CONFIG_FILE),
    }
}

/// Human-readable record of one database, written after the topology changes
/// and trusted as-is when read back.
///
/// Access keys are never written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterConfig {
    pub db_name: String,
    pub catalog_prefix: String,
    pub data_prefix: String,
    #[serde(default)]
    pub depot_prefix: String,
    #[serde(default)]
    pub is_eon: bool,
    #[serde(default)]
    pub communal_storage_location: String,
    #[serde(default)]
    pub depot_size: String,
    #[serde(default)]
    pub num_shards: u32,
    #[serde(default)]
    pub ipv6: bool,
    #[serde(default)]
    pub license_path_on_node: String,
    /// Node records in host order.
    pub nodes: Vec<Node>,
}

impl ClusterConfig {
    pub fn from_topology(topology: &ClusterTopology) -> Self {
        Self {
            db_name: topology.name.clone(),
            catalog_prefix: topology.catalog_prefix.clone(),
            data_prefix: topology.data_prefix.clone(),
            depot_prefix: topology.depot_prefix.clone(),
            is_eon: topology.is_eon,
            communal_storage_location: topology.communal_storage_location.clone(),
            depot_size: topology.depot_size.clone(),
            num_shards: topology.num_shards,
            ipv6: topology.ipv6,
            license_path_on_node: topology.license_path_on_node.clone(),
            nodes: topology.nodes().cloned().collect(),
        }
    }

    /// Rebuilds the topology from the recorded nodes without re-deriving names
    /// or paths. Only duplicate addresses are rejected.
    pub fn into_topology(self) -> Result<ClusterTopology> {
        let mut topology = ClusterTopology::new(self.db_name);
        topology.catalog_prefix = self.catalog_prefix;
        topology.data_prefix = self.data_prefix;
        topology.use_depot = !self.depot_prefix.is_empty();
        topology.depot_prefix = self.depot_prefix;
        topology.is_eon = self.is_eon;
        topology.communal_storage_location = self.communal_storage_location;
        topology.depot_size = self.depot_size;
        topology.num_shards = self.num_shards;
        topology.ipv6 = self.ipv6;
        topology.license_path_on_node = self.license_path_on_node;

        for node in self.nodes {
            topology.add_node(node).map_err(|err| match err {
                ClusterOpsError::DuplicateHost(host) => ClusterOpsError::Config(format!(
                    "host {} is listed more than once in the config file",
                    host
                )),
                other => other,
            })?;
        }
        Ok(topology)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ClusterOpsError::Config(format!("fail to read config file {}: {}", path.display(), e))
        })?;
        serde_yaml::from_str(&contents).map_err(|e| {
            ClusterOpsError::Config(format!("fail to parse config file {}: {}", path.display(), e))
        })
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let contents = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
        Ok(())
    }

    /// Raw contents of the file at `path`, unparsed.
    pub fn show(path: &Path) -> Result<String> {
        fs::read_to_string(path).map_err(|e| {
            ClusterOpsError::Config(format!("fail to read config file {}: {}", path.display(), e))
        })
    }
}
