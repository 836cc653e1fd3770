use crate::core::{ClusterOpsError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;
use std::net::IpAddr;

use super::node::DEFAULT_CLIENT_PORT;

pub const AWS_ACCESS_KEY_ID_ENV: &str = "AWS_ACCESS_KEY_ID";
pub const AWS_SECRET_ACCESS_KEY_ENV: &str = "AWS_SECRET_ACCESS_KEY";

const MAX_DB_NAME_LEN: usize = 30;

lazy_static! {
    static ref DB_NAME_RE: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").unwrap();
    static ref DEPOT_SIZE_PERCENT_RE: Regex = Regex::new(r"^(\d+)%$").unwrap();
    static ref DEPOT_SIZE_UNIT_RE: Regex = Regex::new(r"^\d+[KMGT]$").unwrap();
}

/// Options for creating a new database.
///
/// Hosts are expected to be resolved already; the order of `hosts` decides
/// node numbering.
#[derive(Debug, Clone)]
pub struct CreateDatabaseOptions {
    pub db_name: String,
    pub hosts: Vec<String>,
    pub catalog_prefix: String,
    pub data_prefix: String,
    pub depot_prefix: String,
    pub communal_storage_location: String,
    pub depot_size: String,
    pub shard_count: u32,
    pub client_port: u16,
    pub ipv6: bool,
    pub license_path_on_node: String,
    pub credentials_from_env: bool,
}

impl CreateDatabaseOptions {
    /// Create options for an enterprise (non-eon) database.
    pub fn new(db_name: &str, hosts: Vec<String>) -> Self {
        Self {
            db_name: db_name.to_string(),
            hosts,
            catalog_prefix: "/catalog".to_string(),
            data_prefix: "/data".to_string(),
            depot_prefix: String::new(),
            communal_storage_location: String::new(),
            depot_size: String::new(),
            shard_count: 0,
            client_port: DEFAULT_CLIENT_PORT,
            ipv6: false,
            license_path_on_node: String::new(),
            credentials_from_env: false,
        }
    }

    /// Set the catalog and data prefixes
    pub fn prefixes(mut self, catalog_prefix: &str, data_prefix: &str) -> Self {
        self.catalog_prefix = catalog_prefix.to_string();
        self.data_prefix = data_prefix.to_string();
        self
    }

    /// Switch to eon mode with the given communal storage and depot prefix
    pub fn eon(mut self, communal_storage_location: &str, depot_prefix: &str, shard_count: u32) -> Self {
        self.communal_storage_location = communal_storage_location.to_string();
        self.depot_prefix = depot_prefix.to_string();
        self.shard_count = shard_count;
        self
    }

    /// Set the depot size, e.g. `"40%"` or `"200G"`
    pub fn depot_size(mut self, depot_size: &str) -> Self {
        self.depot_size = depot_size.to_string();
        self
    }

    /// Set the client port
    pub fn client_port(mut self, port: u16) -> Self {
        self.client_port = port;
        self
    }

    /// Use IPv6 control addresses
    pub fn ipv6(mut self, ipv6: bool) -> Self {
        self.ipv6 = ipv6;
        self
    }

    /// Read the communal storage credentials from the environment
    pub fn credentials_from_env(mut self, enabled: bool) -> Self {
        self.credentials_from_env = enabled;
        self
    }

    pub fn is_eon(&self) -> bool {
        !self.communal_storage_location.is_empty()
    }

    /// Checks the options for consistency and normalizes the path prefixes.
    pub fn validate(&mut self) -> Result<()> {
        validate_db_name(&self.db_name)?;
        self.validate_hosts()?;

        self.catalog_prefix = clean_prefix(&self.catalog_prefix);
        self.data_prefix = clean_prefix(&self.data_prefix);
        self.depot_prefix = clean_prefix(&self.depot_prefix);

        require_absolute("catalog prefix", &self.catalog_prefix)?;
        require_absolute("data prefix", &self.data_prefix)?;
        if !self.depot_prefix.is_empty() {
            require_absolute("depot prefix", &self.depot_prefix)?;
        }

        self.validate_storage_mode()
    }

    fn validate_hosts(&self) -> Result<()> {
        if self.hosts.is_empty() {
            return Err(ClusterOpsError::Validation(
                "must specify at least one host".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for host in &self.hosts {
            if host.trim().is_empty() {
                return Err(ClusterOpsError::Validation(
                    "host must not be empty".to_string(),
                ));
            }
            if !seen.insert(host.as_str()) {
                return Err(ClusterOpsError::Validation(format!(
                    "host {} is specified more than once",
                    host
                )));
            }
            if let Ok(ip) = host.parse::<IpAddr>() {
                if ip.is_ipv6() != self.ipv6 {
                    return Err(ClusterOpsError::Validation(format!(
                        "host {} does not match the requested {} address family",
                        host,
                        if self.ipv6 { "IPv6" } else { "IPv4" }
                    )));
                }
            }
        }
        Ok(())
    }

    fn validate_storage_mode(&self) -> Result<()> {
        if !self.depot_prefix.is_empty() && !self.is_eon() {
            return Err(ClusterOpsError::Validation(
                "when depot prefix is given, communal storage location cannot be empty".to_string(),
            ));
        }
        if !self.is_eon() {
            return Ok(());
        }

        if self.depot_prefix.is_empty() {
            return Err(ClusterOpsError::Validation(
                "must specify a depot prefix with eon mode".to_string(),
            ));
        }
        if self.shard_count == 0 {
            return Err(ClusterOpsError::Validation(
                "must specify a shard count greater than 0 with eon mode".to_string(),
            ));
        }
        if !self.depot_size.is_empty() {
            validate_depot_size(&self.depot_size)?;
        }
        Ok(())
    }
}

pub fn validate_db_name(db_name: &str) -> Result<()> {
    if db_name.is_empty() {
        return Err(ClusterOpsError::Validation(
            "must specify a database name".to_string(),
        ));
    }
    if db_name.len() > MAX_DB_NAME_LEN {
        return Err(ClusterOpsError::Validation(format!(
            "database name {} is longer than {} characters",
            db_name, MAX_DB_NAME_LEN
        )));
    }
    if !DB_NAME_RE.is_match(db_name) {
        return Err(ClusterOpsError::Validation(format!(
            "database name {} must start with a letter and contain only letters, digits and underscores",
            db_name
        )));
    }
    Ok(())
}

/// Accepts `N%` with `0 < N <= 100`, or `N` followed by one of `K`, `M`, `G`, `T`.
pub fn validate_depot_size(size: &str) -> Result<()> {
    if let Some(caps) = DEPOT_SIZE_PERCENT_RE.captures(size) {
        let percent: u64 = caps[1].parse().map_err(|_| {
            ClusterOpsError::Validation(format!("depot size {} is not a valid percentage", size))
        })?;
        if percent == 0 || percent > 100 {
            return Err(ClusterOpsError::Validation(format!(
                "depot size {} must be between 1% and 100%",
                size
            )));
        }
        return Ok(());
    }
    if DEPOT_SIZE_UNIT_RE.is_match(size) {
        return Ok(());
    }
    Err(ClusterOpsError::Validation(format!(
        "depot size {} must be a percentage or a number with a K, M, G or T suffix",
        size
    )))
}

fn clean_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim();
    if trimmed.len() > 1 {
        trimmed.trim_end_matches('/').to_string()
    } else {
        trimmed.to_string()
    }
}

fn require_absolute(what: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ClusterOpsError::Validation(format!("must specify a {}", what)));
    }
    if !path.starts_with('/') {
        return Err(ClusterOpsError::Validation(format!(
            "{} {} must be an absolute path",
            what, path
        )));
    }
    Ok(())
}

/// Communal storage access keys.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessKeys {
    pub id_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for AccessKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessKeys")
            .field("id_key", &self.id_key)
            .field("secret_key", &"***")
            .finish()
    }
}

/// Reads the access key pair from the environment. Both values are required.
pub fn credentials_from_env() -> Result<AccessKeys> {
    let id_key = read_required_env(AWS_ACCESS_KEY_ID_ENV)?;
    let secret_key = read_required_env(AWS_SECRET_ACCESS_KEY_ENV)?;
    Ok(AccessKeys { id_key, secret_key })
}

fn read_required_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(ClusterOpsError::MissingCredential(format!(
            "unable to read {} from the environment",
            name
        ))),
    }
}
