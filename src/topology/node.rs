use serde::{Deserialize, Serialize};
use std::fmt;

use super::naming::{catalog_path, data_path, depot_path};

/// Default client port of a database node.
pub const DEFAULT_CLIENT_PORT: u16 = 5433;

/// Address family used for a node's control messaging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    #[default]
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    pub fn from_ipv6_flag(ipv6: bool) -> Self {
        if ipv6 { Self::Ipv6 } else { Self::Ipv4 }
    }
}

/// Runtime state reported for a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeState {
    Up,
    Down,
    #[default]
    Unknown,
}

impl NodeState {
    /// Parses the agent's state string. Anything unrecognized is `Unknown`.
    pub fn parse(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "UP" => Self::Up,
            "DOWN" => Self::Down,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            NodeState::Up => "UP",
            NodeState::Down => "DOWN",
            NodeState::Unknown => "UNKNOWN",
        };
        f.write_str(state)
    }
}

/// One database server process on one host.
///
/// Catalog, data and depot locations are always derived from the owning
/// database's prefixes and the node name; see [`Node::with_paths`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Node {
    pub name: String,
    pub address: String,
    pub catalog_path: String,
    #[serde(default)]
    pub storage_locations: Vec<String>,
    #[serde(default)]
    pub user_storage_locations: Vec<String>,
    #[serde(default)]
    pub depot_path: String,
    pub port: u16,
    #[serde(default)]
    pub control_address_family: AddressFamily,
    #[serde(default)]
    pub is_primary: bool,
    #[serde(default)]
    pub state: NodeState,
    /// Empty when the database is not in eon mode.
    #[serde(default)]
    pub subcluster: String,
    /// Empty when the node is not sandboxed.
    #[serde(default)]
    pub sandbox: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub is_control_node: bool,
}

/// Prefix and mode inputs needed to derive a node's paths.
#[derive(Debug, Clone, Copy)]
pub struct NodeLayout<'a> {
    pub db_name: &'a str,
    pub catalog_prefix: &'a str,
    pub data_prefix: &'a str,
    pub depot_prefix: &'a str,
    pub ipv6: bool,
    pub port: u16,
}

impl Node {
    /// Builds a node whose paths are derived from `layout` and `name`.
    ///
    /// The depot path is left empty when the layout has no depot prefix.
    pub fn with_paths(layout: NodeLayout<'_>, address: &str, name: &str) -> Self {
        let depot = if layout.depot_prefix.is_empty() {
            String::new()
        } else {
            depot_path(layout.depot_prefix, layout.db_name, name)
        };

        Self {
            name: name.to_string(),
            address: address.to_string(),
            catalog_path: catalog_path(layout.catalog_prefix, layout.db_name, name),
            storage_locations: vec![data_path(layout.data_prefix, layout.db_name, name)],
            user_storage_locations: Vec::new(),
            depot_path: depot,
            port: layout.port,
            control_address_family: AddressFamily::from_ipv6_flag(layout.ipv6),
            is_primary: false,
            state: NodeState::Unknown,
            subcluster: String::new(),
            sandbox: String::new(),
            version: String::new(),
            is_control_node: false,
        }
    }

    pub fn primary(mut self, is_primary: bool) -> Self {
        self.is_primary = is_primary;
        self
    }

    /// Sets the subcluster the node belongs to.
    pub fn in_subcluster(mut self, subcluster: impl Into<String>) -> Self {
        self.subcluster = subcluster.into();
        self
    }

    pub fn is_down(&self) -> bool {
        self.state == NodeState::Down
    }
}
