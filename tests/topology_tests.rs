use clusterops::topology::{
    ClusterTopology, CreateDatabaseOptions, DEFAULT_SUBCLUSTER, Node, NodeLayout, NodeState,
    catalog_path, data_path, depot_path, gen_node_name,
};
use clusterops::ClusterOpsError;
use std::collections::{HashMap, HashSet};

fn hosts(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

fn three_node_db() -> ClusterTopology {
    let options = CreateDatabaseOptions::new("vdb", hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]))
        .prefixes("/catalog", "/data");
    ClusterTopology::from_creation_options(&options).unwrap()
}

#[test]
fn creation_names_nodes_in_host_order() {
    let topology = three_node_db();

    assert_eq!(topology.host_list().len(), 3);
    assert_eq!(topology.host_node_map().len(), 3);
    assert!(!topology.is_eon);
    assert!(!topology.use_depot);

    let names: Vec<&str> = topology.nodes().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["v_vdb_node0001", "v_vdb_node0002", "v_vdb_node0003"]);

    let first = topology.node("10.0.0.1").unwrap();
    assert_eq!(first.catalog_path, "/catalog/vdb/v_vdb_node0001_catalog");
    assert_eq!(first.storage_locations, vec!["/data/vdb/v_vdb_node0001_data".to_string()]);
    assert!(first.depot_path.is_empty());
    assert!(first.is_primary);
}

#[test]
fn eon_creation_places_nodes_in_default_subcluster() {
    let options = CreateDatabaseOptions::new("Sales", hosts(&["10.0.0.1", "10.0.0.2"]))
        .eon("s3://bucket/sales", "/depot", 6)
        .depot_size("40%");
    let topology = ClusterTopology::from_creation_options(&options).unwrap();

    assert!(topology.is_eon);
    assert!(topology.use_depot);
    assert_eq!(topology.num_shards, 6);
    assert_eq!(topology.depot_size, "40%");
    for node in topology.nodes() {
        assert_eq!(node.subcluster, DEFAULT_SUBCLUSTER);
        assert!(node.name.starts_with("v_sales_node"));
        assert!(node.depot_path.starts_with("/depot/Sales/"));
        assert!(node.depot_path.ends_with("_depot"));
    }
}

#[test]
fn creation_rejects_invalid_options() {
    let duplicate = CreateDatabaseOptions::new("vdb", hosts(&["10.0.0.1", "10.0.0.1"]));
    assert!(matches!(
        ClusterTopology::from_creation_options(&duplicate),
        Err(ClusterOpsError::Validation(_))
    ));

    let bad_name = CreateDatabaseOptions::new("1vdb", hosts(&["10.0.0.1"]));
    assert!(ClusterTopology::from_creation_options(&bad_name).is_err());

    let no_hosts = CreateDatabaseOptions::new("vdb", Vec::new());
    assert!(ClusterTopology::from_creation_options(&no_hosts).is_err());
}

#[test]
fn add_node_rejects_present_address() {
    let mut topology = three_node_db();
    let before = topology.clone();

    let layout = NodeLayout {
        db_name: "vdb",
        catalog_prefix: "/catalog",
        data_prefix: "/data",
        depot_prefix: "",
        ipv6: false,
        port: 5433,
    };
    let node = Node::with_paths(layout, "10.0.0.2", "v_vdb_node0009");

    let err = topology.add_node(node).unwrap_err();
    assert!(matches!(err, ClusterOpsError::DuplicateHost(ref h) if h == "10.0.0.2"));
    assert_eq!(topology, before);
}

#[test]
fn copy_of_subset_keeps_given_order() {
    let topology = three_node_db();
    let subset = hosts(&["10.0.0.3", "10.0.0.1"]);

    let copy = topology.copy(&subset);
    assert_eq!(copy.host_list(), subset.as_slice());
    let keys: HashSet<&String> = copy.host_node_map().keys().collect();
    assert_eq!(keys, subset.iter().collect());
    assert_eq!(copy.name, "vdb");

    let full = topology.copy(&[]);
    assert_eq!(full, topology);
}

#[test]
fn contain_nodes_partitions_candidates() {
    let topology = three_node_db();
    let candidates = hosts(&["10.0.0.9", "10.0.0.2", "10.0.0.1"]);

    let (present, absent) = topology.contain_nodes(&candidates);
    assert_eq!(present, hosts(&["10.0.0.2", "10.0.0.1"]));
    assert_eq!(absent, hosts(&["10.0.0.9"]));

    let union: HashSet<&String> = present.iter().chain(absent.iter()).collect();
    assert_eq!(union, candidates.iter().collect());
}

#[test]
fn successive_add_hosts_never_reuse_names() {
    let mut topology = three_node_db();
    topology.add_hosts(&hosts(&["10.0.0.4"]), "").unwrap();
    topology.add_hosts(&hosts(&["10.0.0.5", "10.0.0.6"]), "").unwrap();

    let names: HashSet<&str> = topology.nodes().map(|n| n.name.as_str()).collect();
    assert_eq!(names.len(), 6);
    assert_eq!(topology.node("10.0.0.6").unwrap().name, "v_vdb_node0006");
    assert!(!topology.node("10.0.0.4").unwrap().is_primary);
}

#[test]
fn add_hosts_is_all_or_nothing() {
    let mut topology = three_node_db();
    let before = topology.clone();

    let err = topology
        .add_hosts(&hosts(&["10.0.0.7", "10.0.0.1"]), "")
        .unwrap_err();
    assert!(matches!(err, ClusterOpsError::DuplicateHost(_)));
    assert_eq!(topology, before);
}

#[test]
fn name_generation_fills_lowest_gap() {
    let mut topology = three_node_db();
    topology.remove_host("10.0.0.2").unwrap();
    assert_eq!(topology.len(), 2);
    assert_eq!(topology.host_list(), hosts(&["10.0.0.1", "10.0.0.3"]).as_slice());

    let existing = topology.node_name_to_host();
    assert_eq!(
        gen_node_name(&existing, "vdb", 3),
        Some("v_vdb_node0002".to_string())
    );

    let full: HashMap<String, String> = three_node_db().node_name_to_host();
    assert_eq!(gen_node_name(&full, "vdb", 3), None);
}

#[test]
fn path_helpers_are_pure() {
    assert_eq!(catalog_path("/c", "vdb", "n1"), catalog_path("/c", "vdb", "n1"));
    assert_eq!(data_path("/d", "vdb", "n1"), "/d/vdb/n1_data");
    assert_eq!(depot_path("/dp", "vdb", "n1"), "/dp/vdb/n1_depot");
}

#[test]
fn per_host_maps_require_known_hosts() {
    let topology = three_node_db();
    let names = topology.host_node_name_map(&hosts(&["10.0.0.1"])).unwrap();
    assert_eq!(names["10.0.0.1"], "v_vdb_node0001");

    let err = topology
        .host_catalog_path_map(&hosts(&["10.0.0.1", "10.9.9.9"]))
        .unwrap_err();
    assert!(matches!(err, ClusterOpsError::ConfigMismatch(_)));
}

#[test]
fn filter_to_primary_only_drops_secondaries_in_order() {
    let mut topology = three_node_db();
    topology.add_hosts(&hosts(&["10.0.0.4"]), "").unwrap();
    let layout = NodeLayout {
        db_name: "vdb",
        catalog_prefix: "/catalog",
        data_prefix: "/data",
        depot_prefix: "",
        ipv6: false,
        port: 5433,
    };
    topology
        .add_node(Node::with_paths(layout, "10.0.0.5", "v_vdb_node0005").primary(true))
        .unwrap();
    topology.add_hosts(&hosts(&["10.0.0.6"]), "").unwrap();
    assert_eq!(topology.len(), 6);

    topology.filter_to_primary_only();

    let expected = hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3", "10.0.0.5"]);
    assert_eq!(topology.host_list(), expected.as_slice());
    let keys: HashSet<&String> = topology.host_node_map().keys().collect();
    assert_eq!(keys, expected.iter().collect());
    assert!(topology.node("10.0.0.4").is_none());
    assert!(topology.node("10.0.0.6").is_none());
}

#[test]
fn subcluster_names_follow_first_appearance() {
    let options = CreateDatabaseOptions::new("vdb", hosts(&["10.0.0.1"]))
        .eon("s3://bucket/vdb", "/depot", 1);
    let mut topology = ClusterTopology::from_creation_options(&options).unwrap();

    topology.add_hosts(&hosts(&["10.0.0.2"]), "analytics").unwrap();
    topology.add_hosts(&hosts(&["10.0.0.3"]), "reporting").unwrap();
    topology.add_hosts(&hosts(&["10.0.0.4"]), "analytics").unwrap();

    assert_eq!(
        topology.subcluster_names(),
        vec![
            DEFAULT_SUBCLUSTER.to_string(),
            "analytics".to_string(),
            "reporting".to_string(),
        ]
    );
}

#[test]
fn down_node_detection() {
    let mut topology = three_node_db();
    assert!(!topology.has_at_least_one_down_node());

    for host in hosts(&["10.0.0.1", "10.0.0.2", "10.0.0.3"]) {
        assert!(topology.set_node_state(&host, NodeState::Up));
    }
    assert!(!topology.has_at_least_one_down_node());

    topology.set_node_state("10.0.0.2", NodeState::Down);
    assert!(topology.has_at_least_one_down_node());
    assert!(!topology.set_node_state("10.9.9.9", NodeState::Down));
}

#[test]
fn primary_up_nodes_track_node_states() {
    let mut topology = three_node_db();
    topology.add_hosts(&hosts(&["10.0.0.4"]), "").unwrap();
    for host in hosts(&["10.0.0.1", "10.0.0.3", "10.0.0.4"]) {
        topology.set_node_state(&host, NodeState::Up);
    }
    topology.set_node_state("10.0.0.2", NodeState::Down);

    topology.refresh_primary_up_nodes();
    assert_eq!(
        topology.primary_up_nodes,
        vec!["v_vdb_node0001".to_string(), "v_vdb_node0003".to_string()]
    );
    assert_eq!(topology.copy(&[]).primary_up_nodes, topology.primary_up_nodes);
}
