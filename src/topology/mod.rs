pub mod database;
pub mod naming;
pub mod node;
pub mod options;

pub use database::{ClusterTopology, DEFAULT_SUBCLUSTER};
pub use naming::{catalog_path, data_path, depot_path, gen_node_name, gen_node_names};
pub use node::{AddressFamily, DEFAULT_CLIENT_PORT, Node, NodeLayout, NodeState};
pub use options::{AccessKeys, CreateDatabaseOptions, credentials_from_env};
