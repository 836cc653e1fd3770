use std::collections::HashMap;
use std::path::Path;

const CATALOG_SUFFIX: &str = "_catalog";
const DATA_SUFFIX: &str = "_data";
const DEPOT_SUFFIX: &str = "_depot";

fn join_node_path(prefix: &str, db_name: &str, node_name: &str, suffix: &str) -> String {
    Path::new(prefix)
        .join(db_name)
        .join(format!("{}{}", node_name, suffix))
        .to_string_lossy()
        .into_owned()
}

/// `<prefix>/<db_name>/<node_name>_catalog`
pub fn catalog_path(prefix: &str, db_name: &str, node_name: &str) -> String {
    join_node_path(prefix, db_name, node_name, CATALOG_SUFFIX)
}

/// `<prefix>/<db_name>/<node_name>_data`
pub fn data_path(prefix: &str, db_name: &str, node_name: &str) -> String {
    join_node_path(prefix, db_name, node_name, DATA_SUFFIX)
}

/// `<prefix>/<db_name>/<node_name>_depot`
pub fn depot_path(prefix: &str, db_name: &str, node_name: &str) -> String {
    join_node_path(prefix, db_name, node_name, DEPOT_SUFFIX)
}

/// Formats the node name for a 1-based index, e.g. `v_sales_node0003`.
pub fn node_name_for_index(db_name: &str, index: usize) -> String {
    format!("v_{}_node{:04}", db_name.to_lowercase(), index)
}

/// Picks the lowest-indexed node name in `1..=host_count` that is not a key
/// of `existing` (node name -> host).
///
/// Returns `None` when every candidate is taken.
pub fn gen_node_name(
    existing: &HashMap<String, String>,
    db_name: &str,
    host_count: usize,
) -> Option<String> {
    (1..=host_count)
        .map(|index| node_name_for_index(db_name, index))
        .find(|name| !existing.contains_key(name))
}

/// Generates `count` fresh names, each unique against `existing` and against
/// the names generated before it.
pub fn gen_node_names(
    existing: &HashMap<String, String>,
    db_name: &str,
    host_count: usize,
    count: usize,
) -> Option<Vec<String>> {
    let mut taken = existing.clone();
    let mut names = Vec::with_capacity(count);
    for _ in 0..count {
        let name = gen_node_name(&taken, db_name, host_count)?;
        taken.insert(name.clone(), String::new());
        names.push(name);
    }
    Some(names)
}
