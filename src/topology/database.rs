use crate::core::{ClusterOpsError, Result};
use std::collections::{HashMap, HashSet};

use super::naming::{self, gen_node_names, node_name_for_index};
use super::node::{Node, NodeLayout, NodeState};
use super::options::{AccessKeys, CreateDatabaseOptions, credentials_from_env};

/// Subcluster every node of a freshly created eon database belongs to.
pub const DEFAULT_SUBCLUSTER: &str = "default_subcluster";

/// Catalog and node information for one database.
///
/// `host_list` keeps insertion order and `host_node_map` indexes the same
/// nodes by address. Both are private so every mutation goes through methods
/// that update them together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterTopology {
    pub name: String,
    pub catalog_prefix: String,
    pub data_prefix: String,
    pub depot_prefix: String,

    pub is_eon: bool,
    pub communal_storage_location: String,
    pub use_depot: bool,
    pub depot_size: String,
    pub num_shards: u32,
    pub access_keys: Option<AccessKeys>,

    pub license_path_on_node: String,
    pub ipv6: bool,
    /// Names of the primary nodes last reported UP, in host order.
    pub primary_up_nodes: Vec<String>,

    host_list: Vec<String>,
    host_node_map: HashMap<String, Node>,
}

impl ClusterTopology {
    /// Creates an empty topology for `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Validates `options` and derives a topology with one node per host.
    ///
    /// Reads the access keys from the environment when the options ask for it.
    pub fn from_creation_options(options: &CreateDatabaseOptions) -> Result<Self> {
        let mut options = options.clone();
        options.validate()?;

        let mut topology = Self::from_basic_options(&options)?;
        topology.license_path_on_node = options.license_path_on_node.clone();
        topology.num_shards = options.shard_count;
        if options.credentials_from_env {
            topology.access_keys = Some(credentials_from_env()?);
        }
        Ok(topology)
    }

    /// Builds the topology from options without validating them.
    ///
    /// Used for options that come from a trusted configuration file.
    pub fn from_basic_options(options: &CreateDatabaseOptions) -> Result<Self> {
        let is_eon = !options.communal_storage_location.is_empty();
        let mut topology = Self {
            name: options.db_name.clone(),
            catalog_prefix: options.catalog_prefix.clone(),
            data_prefix: options.data_prefix.clone(),
            depot_prefix: options.depot_prefix.clone(),
            is_eon,
            communal_storage_location: options.communal_storage_location.clone(),
            use_depot: !options.depot_prefix.is_empty(),
            depot_size: if is_eon { options.depot_size.clone() } else { String::new() },
            ipv6: options.ipv6,
            ..Self::default()
        };

        let subcluster = if is_eon { DEFAULT_SUBCLUSTER } else { "" };
        for (index, host) in options.hosts.iter().enumerate() {
            let name = node_name_for_index(&options.db_name, index + 1);
            let node = Node::with_paths(topology.layout(options.client_port), host, &name)
                .primary(true)
                .in_subcluster(subcluster);
            topology.add_node(node)?;
        }
        Ok(topology)
    }

    fn layout(&self, port: u16) -> NodeLayout<'_> {
        NodeLayout {
            db_name: &self.name,
            catalog_prefix: &self.catalog_prefix,
            data_prefix: &self.data_prefix,
            depot_prefix: &self.depot_prefix,
            ipv6: self.ipv6,
            port,
        }
    }

    /// Reads the access keys from the environment into the topology.
    pub fn load_credentials_from_env(&mut self) -> Result<()> {
        self.access_keys = Some(credentials_from_env()?);
        Ok(())
    }

    /// Hosts in insertion order.
    pub fn host_list(&self) -> &[String] {
        &self.host_list
    }

    pub fn host_node_map(&self) -> &HashMap<String, Node> {
        &self.host_node_map
    }

    pub fn node(&self, address: &str) -> Option<&Node> {
        self.host_node_map.get(address)
    }

    /// Nodes in host-list order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.host_list
            .iter()
            .filter_map(|host| self.host_node_map.get(host))
    }

    pub fn len(&self) -> usize {
        self.host_list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.host_list.is_empty()
    }

    /// Adds a node under its address. Rejects addresses already present.
    pub fn add_node(&mut self, node: Node) -> Result<()> {
        if self.host_node_map.contains_key(&node.address) {
            return Err(ClusterOpsError::DuplicateHost(node.address));
        }
        self.host_list.push(node.address.clone());
        self.host_node_map.insert(node.address.clone(), node);
        Ok(())
    }

    /// Adds `hosts` as new nodes of `subcluster`.
    ///
    /// Names are generated against every name already in use and the total
    /// host count after the addition. Nothing is added if any host fails.
    pub fn add_hosts(&mut self, hosts: &[String], subcluster: &str) -> Result<()> {
        let mut incoming = HashSet::new();
        for host in hosts {
            if self.host_node_map.contains_key(host) || !incoming.insert(host.as_str()) {
                return Err(ClusterOpsError::DuplicateHost(host.clone()));
            }
        }

        let total_host_count = hosts.len() + self.host_list.len();
        let existing = self.node_name_to_host();
        let names = gen_node_names(&existing, &self.name, total_host_count, hosts.len())
            .ok_or_else(|| {
                let host = hosts.first().cloned().unwrap_or_default();
                ClusterOpsError::NameGeneration(host)
            })?;

        let port = self
            .nodes()
            .next()
            .map(|node| node.port)
            .unwrap_or(super::node::DEFAULT_CLIENT_PORT);
        let new_nodes: Vec<Node> = hosts
            .iter()
            .zip(names.iter())
            .map(|(host, name)| {
                Node::with_paths(self.layout(port), host, name).in_subcluster(subcluster)
            })
            .collect();

        for node in new_nodes {
            self.add_node(node)?;
        }
        Ok(())
    }

    /// Removes a host from both the list and the map.
    pub fn remove_host(&mut self, address: &str) -> Option<Node> {
        let node = self.host_node_map.remove(address)?;
        self.host_list.retain(|host| host != address);
        Some(node)
    }

    /// Updates the state of the node at `address`. Returns false if absent.
    pub fn set_node_state(&mut self, address: &str, state: NodeState) -> bool {
        match self.host_node_map.get_mut(address) {
            Some(node) => {
                node.state = state;
                true
            }
            None => false,
        }
    }

    /// Rebuilds `primary_up_nodes` from the current node states.
    pub fn refresh_primary_up_nodes(&mut self) {
        let map = &self.host_node_map;
        self.primary_up_nodes = self
            .host_list
            .iter()
            .filter_map(|host| map.get(host))
            .filter(|node| node.is_primary && node.state == NodeState::Up)
            .map(|node| node.name.clone())
            .collect();
    }

    /// Copies the topology, optionally keeping only `target_hosts`.
    ///
    /// An empty slice copies every host. Targets that are not part of the
    /// topology are skipped.
    pub fn copy(&self, target_hosts: &[String]) -> Self {
        let mut copy = Self {
            host_list: Vec::new(),
            host_node_map: HashMap::new(),
            ..self.clone_scalars()
        };

        if target_hosts.is_empty() {
            copy.host_list = self.host_list.clone();
            copy.host_node_map = self.host_node_map.clone();
            return copy;
        }

        copy.host_node_map = self.copy_host_node_map(target_hosts);
        let mut seen = HashSet::new();
        copy.host_list = target_hosts
            .iter()
            .filter(|host| copy.host_node_map.contains_key(*host) && seen.insert(host.as_str()))
            .cloned()
            .collect();
        copy
    }

    fn clone_scalars(&self) -> Self {
        Self {
            name: self.name.clone(),
            catalog_prefix: self.catalog_prefix.clone(),
            data_prefix: self.data_prefix.clone(),
            depot_prefix: self.depot_prefix.clone(),
            is_eon: self.is_eon,
            communal_storage_location: self.communal_storage_location.clone(),
            use_depot: self.use_depot,
            depot_size: self.depot_size.clone(),
            num_shards: self.num_shards,
            access_keys: self.access_keys.clone(),
            license_path_on_node: self.license_path_on_node.clone(),
            ipv6: self.ipv6,
            primary_up_nodes: self.primary_up_nodes.clone(),
            host_list: Vec::new(),
            host_node_map: HashMap::new(),
        }
    }

    /// Copies the host-node map, optionally keeping only `target_hosts`.
    pub fn copy_host_node_map(&self, target_hosts: &[String]) -> HashMap<String, Node> {
        if target_hosts.is_empty() {
            return self.host_node_map.clone();
        }
        target_hosts
            .iter()
            .filter_map(|host| {
                self.host_node_map
                    .get(host)
                    .map(|node| (host.clone(), node.clone()))
            })
            .collect()
    }

    /// Node name -> host address.
    pub fn node_name_to_host(&self) -> HashMap<String, String> {
        self.host_node_map
            .iter()
            .map(|(host, node)| (node.name.clone(), host.clone()))
            .collect()
    }

    /// Distinct subcluster names in first-seen (host-list) order.
    pub fn subcluster_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.nodes()
            .filter(|node| seen.insert(node.subcluster.as_str()))
            .map(|node| node.subcluster.clone())
            .collect()
    }

    /// Splits `candidates` into hosts that are in the topology and hosts that are not.
    pub fn contain_nodes(&self, candidates: &[String]) -> (Vec<String>, Vec<String>) {
        candidates
            .iter()
            .cloned()
            .partition(|host| self.host_node_map.contains_key(host))
    }

    pub fn has_at_least_one_down_node(&self) -> bool {
        self.host_node_map.values().any(Node::is_down)
    }

    /// Drops every secondary node.
    pub fn filter_to_primary_only(&mut self) {
        self.host_node_map.retain(|_, node| node.is_primary);
        let map = &self.host_node_map;
        self.host_list.retain(|host| map.contains_key(host));
    }

    pub fn catalog_path(&self, node_name: &str) -> String {
        naming::catalog_path(&self.catalog_prefix, &self.name, node_name)
    }

    pub fn data_path(&self, node_name: &str) -> String {
        naming::data_path(&self.data_prefix, &self.name, node_name)
    }

    pub fn depot_path(&self, node_name: &str) -> String {
        naming::depot_path(&self.depot_prefix, &self.name, node_name)
    }

    /// Host -> node name for `hosts`. Every host must be in the topology.
    pub fn host_node_name_map(&self, hosts: &[String]) -> Result<HashMap<String, String>> {
        self.per_host(hosts, |node| node.name.clone())
    }

    /// Host -> catalog path for `hosts`. Every host must be in the topology.
    pub fn host_catalog_path_map(&self, hosts: &[String]) -> Result<HashMap<String, String>> {
        self.per_host(hosts, |node| node.catalog_path.clone())
    }

    fn per_host<F>(&self, hosts: &[String], value: F) -> Result<HashMap<String, String>>
    where
        F: Fn(&Node) -> String,
    {
        hosts
            .iter()
            .map(|host| {
                self.host_node_map
                    .get(host)
                    .map(|node| (host.clone(), value(node)))
                    .ok_or_else(|| {
                        ClusterOpsError::ConfigMismatch(format!(
                            "host {} is not part of database {}",
                            host, self.name
                        ))
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    fn three_node_topology() -> ClusterTopology {
        let options = CreateDatabaseOptions::new("vdb", hosts(&["h1", "h2", "h3"]));
        ClusterTopology::from_creation_options(&options).unwrap()
    }

    #[test]
    fn test_remove_host_keeps_structures_in_sync() {
        let mut topology = three_node_topology();
        let removed = topology.remove_host("h2").unwrap();
        assert_eq!(removed.name, "v_vdb_node0002");
        assert_eq!(topology.host_list(), &hosts(&["h1", "h3"])[..]);
        assert_eq!(topology.host_node_map().len(), 2);
        assert!(topology.remove_host("h2").is_none());
    }

    #[test]
    fn test_add_hosts_reuses_freed_name() {
        let mut topology = three_node_topology();
        topology.remove_host("h2");
        topology.add_hosts(&hosts(&["h4"]), "").unwrap();
        assert_eq!(topology.node("h4").unwrap().name, "v_vdb_node0002");
    }

    #[test]
    fn test_add_hosts_is_atomic() {
        let mut topology = three_node_topology();
        let err = topology
            .add_hosts(&hosts(&["h4", "h1"]), "analytics")
            .unwrap_err();
        assert!(matches!(err, ClusterOpsError::DuplicateHost(host) if host == "h1"));
        assert_eq!(topology.len(), 3);
        assert!(topology.node("h4").is_none());
    }

    #[test]
    fn test_host_maps_reject_unknown_host() {
        let topology = three_node_topology();
        let names = topology.host_node_name_map(&hosts(&["h1", "h3"])).unwrap();
        assert_eq!(names["h3"], "v_vdb_node0003");

        let err = topology.host_catalog_path_map(&hosts(&["h9"])).unwrap_err();
        assert!(matches!(err, ClusterOpsError::ConfigMismatch(_)));
    }

    #[test]
    fn test_eon_nodes_join_default_subcluster() {
        let options = CreateDatabaseOptions::new("vdb", hosts(&["h1", "h2"]))
            .eon("s3://bucket/vdb", "/depot", 6)
            .depot_size("40%");
        let topology = ClusterTopology::from_creation_options(&options).unwrap();
        assert!(topology.is_eon);
        assert!(topology.use_depot);
        assert_eq!(topology.depot_size, "40%");
        assert_eq!(topology.subcluster_names(), vec![DEFAULT_SUBCLUSTER.to_string()]);
        assert_eq!(
            topology.node("h2").unwrap().depot_path,
            "/depot/vdb/v_vdb_node0002_depot"
        );
    }
}
