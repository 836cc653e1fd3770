use crate::core::{ClusterOpsError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

/// A per-host metadata map whose keys must line up with a host list.
pub trait HostKeyed {
    fn host_keys(&self) -> Vec<&str>;
}

impl<V> HostKeyed for HashMap<String, V> {
    fn host_keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

impl<V> HostKeyed for BTreeMap<String, V> {
    fn host_keys(&self) -> Vec<&str> {
        self.keys().map(String::as_str).collect()
    }
}

/// Checks that every map is keyed by exactly the hosts in `hosts`.
///
/// Fails with `ConfigMismatch` on a duplicated host, or on any map with a
/// missing or extra key.
pub fn validate_host_maps(hosts: &[String], maps: &[&dyn HostKeyed]) -> Result<()> {
    let host_set: HashSet<&str> = hosts.iter().map(String::as_str).collect();
    if host_set.len() != hosts.len() {
        return Err(ClusterOpsError::ConfigMismatch(format!(
            "host list contains duplicates: {:?}",
            hosts
        )));
    }

    for (index, map) in maps.iter().enumerate() {
        let keys: HashSet<&str> = map.host_keys().into_iter().collect();
        if keys == host_set {
            continue;
        }

        let missing: BTreeSet<&str> = host_set.difference(&keys).copied().collect();
        let extra: BTreeSet<&str> = keys.difference(&host_set).copied().collect();
        return Err(ClusterOpsError::ConfigMismatch(format!(
            "host map #{} does not match the host list: missing {:?}, unexpected {:?}",
            index, missing, extra
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hosts(list: &[&str]) -> Vec<String> {
        list.iter().map(|h| h.to_string()).collect()
    }

    fn map(list: &[&str]) -> HashMap<String, String> {
        list.iter()
            .map(|h| (h.to_string(), format!("/catalog/{}", h)))
            .collect()
    }

    #[test]
    fn test_matching_maps_pass() {
        let hosts = hosts(&["h1", "h2"]);
        let names = map(&["h2", "h1"]);
        let paths = map(&["h1", "h2"]);
        assert!(validate_host_maps(&hosts, &[&names, &paths]).is_ok());
    }

    #[test]
    fn test_missing_key_fails() {
        let hosts = hosts(&["h1", "h2"]);
        let names = map(&["h1"]);
        let err = validate_host_maps(&hosts, &[&names]).unwrap_err();
        assert!(matches!(err, ClusterOpsError::ConfigMismatch(msg) if msg.contains("h2")));
    }

    #[test]
    fn test_extra_key_fails() {
        let hosts = hosts(&["h1"]);
        let names = map(&["h1"]);
        let paths = map(&["h1", "h3"]);
        assert!(validate_host_maps(&hosts, &[&names, &paths]).is_err());
    }

    #[test]
    fn test_duplicate_host_fails() {
        let hosts = hosts(&["h1", "h1"]);
        let names = map(&["h1"]);
        assert!(validate_host_maps(&hosts, &[&names]).is_err());
    }

    #[test]
    fn test_no_maps_is_trivially_valid() {
        assert!(validate_host_maps(&hosts(&["h1"]), &[]).is_ok());
    }
}
