use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Smallest subnet that still has two usable host addresses
pub const MAX_SUBNET_PREFIX: u8 = 30;

/// Top-level configuration structure that mirrors the YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub network: NetworkConfig,
    #[serde(default)]
    pub grouping: GroupingConfig,
    pub wireguard: WireGuardConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    pub storage: StorageConfig,
}

/// Address space that client subnets are carved from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Base block in CIDR notation (e.g., "10.20.0.0/16")
    pub base_network: String,
    /// Prefix length of each client subnet
    pub subnet_prefix: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Maximum number of records packed into one generated group
    #[serde(default = "default_group_size")]
    pub group_size: usize,
}

/// Parameters written into every peer profile
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireGuardConfig {
    pub endpoint_host: String,
    #[serde(default = "default_endpoint_port")]
    pub endpoint_port: u16,
    /// Public key of the hub router every site peers with
    pub router_public_key: String,
    /// (Optional) DNS server pushed to peers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<String>,
    #[serde(default)]
    pub key_backend: KeyBackend,
    /// Path or name of the `wg` utility (only used by the `wg` backend)
    #[serde(default = "default_wg_path")]
    pub wg_path: String,
}

/// Where fresh key material comes from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
    /// External `wg genkey` / `wg pubkey`
    #[default]
    Wg,
    /// In-process Curve25519
    Native,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default)]
    pub on_collision: CollisionPolicy,
}

/// What to do when two sites normalize to the same peer name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollisionPolicy {
    /// Append `_2`, `_3`, ... until the name is free
    #[default]
    Suffix,
    /// Abort the run
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// CSV record store read at the start of a run
    pub database_path: PathBuf,
    /// (Optional) Where the updated store is written (default: database_path)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    /// Directory holding one `<peer_name>.conf` per peer
    pub profiles_dir: PathBuf,
    /// (Optional) Plain list of allocated addresses, one per line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_list_path: Option<PathBuf>,
}

fn default_group_size() -> usize {
    4
}

fn default_endpoint_port() -> u16 {
    51820
}

fn default_wg_path() -> String {
    "wg".to_string()
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            group_size: default_group_size(),
        }
    }
}

impl Config {
    /// Validate the configuration before any allocation begins
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.network.base_net()?;
        self.network.validate_prefix()?;

        if self.grouping.group_size == 0 {
            return Err(ConfigError::InvalidGroupSize(self.grouping.group_size));
        }

        if self.wireguard.endpoint_host.trim().is_empty() {
            return Err(ConfigError::EmptyField("wireguard.endpoint_host"));
        }
        if self.wireguard.endpoint_port == 0 {
            return Err(ConfigError::InvalidEndpointPort);
        }
        if self.wireguard.router_public_key.trim().is_empty() {
            return Err(ConfigError::EmptyField("wireguard.router_public_key"));
        }
        if self.wireguard.key_backend == KeyBackend::Wg && self.wireguard.wg_path.trim().is_empty() {
            return Err(ConfigError::EmptyField("wireguard.wg_path"));
        }

        Ok(())
    }

    /// Path the updated record store is written to
    pub fn output_path(&self) -> &PathBuf {
        self.storage
            .output_path
            .as_ref()
            .unwrap_or(&self.storage.database_path)
    }

    /// `host:port` as written into peer profiles
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.wireguard.endpoint_host, self.wireguard.endpoint_port)
    }
}

impl NetworkConfig {
    /// Parse the base block, rejecting addresses with host bits set
    pub fn base_net(&self) -> Result<Ipv4Net, ConfigError> {
        let net: Ipv4Net = self
            .base_network
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidBaseNetwork(self.base_network.clone()))?;
        if net.trunc() != net {
            return Err(ConfigError::InvalidBaseNetwork(format!(
                "{} has host bits set (did you mean {}?)",
                self.base_network,
                net.trunc()
            )));
        }
        Ok(net)
    }

    fn validate_prefix(&self) -> Result<(), ConfigError> {
        let base = self.base_net()?;
        if self.subnet_prefix < base.prefix_len() || self.subnet_prefix > MAX_SUBNET_PREFIX {
            return Err(ConfigError::InvalidSubnetPrefix {
                prefix: self.subnet_prefix,
                base_prefix: base.prefix_len(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("base_network '{0}' is not a valid IPv4 CIDR block")]
    InvalidBaseNetwork(String),
    #[error("subnet_prefix /{prefix} must be between the base prefix /{base_prefix} and /30")]
    InvalidSubnetPrefix { prefix: u8, base_prefix: u8 },
    #[error("group_size must be a positive integer, got {0}")]
    InvalidGroupSize(usize),
    #[error("wireguard.endpoint_port must be non-zero")]
    InvalidEndpointPort,
    #[error("{0} cannot be empty")]
    EmptyField(&'static str),
}
