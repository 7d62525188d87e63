//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use peerforge::config::Config;
use peerforge::error::{EngineError, Result};
use peerforge::keys::generator::{decode_key, KeyGenerator};
use std::cell::Cell;
use std::fs;
use std::path::{Path, PathBuf};

pub const ROUTER_KEY: &str = "cm91dGVyLXB1YmxpYy1rZXktcGxhY2Vob2xkZXIhIQ==";

pub const HEADER: &str = "group,subnet,client_name,site_label,peer_name,address,public_key,private_key";

/// Configuration with every path under `root`
pub fn config(root: &Path, base_network: &str, subnet_prefix: u8, group_size: usize) -> Config {
    let yaml = format!(
        r#"
network:
  base_network: "{base_network}"
  subnet_prefix: {subnet_prefix}
grouping:
  group_size: {group_size}
wireguard:
  endpoint_host: "vpn.example.net"
  router_public_key: "{ROUTER_KEY}"
  dns: "10.255.255.1"
  key_backend: native
storage:
  database_path: "{root}/db/sites.csv"
  profiles_dir: "{root}/tunnels"
  address_list_path: "{root}/out/addresses.txt"
"#,
        root = root.display()
    );
    let config: Config = serde_yaml::from_str(&yaml).unwrap();
    config.validate().unwrap();
    config
}

/// Write a store with the given data lines under the standard header
pub fn write_store(config: &Config, lines: &[&str]) -> PathBuf {
    let path = config.storage.database_path.clone();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let mut text = String::from(HEADER);
    text.push('\n');
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs::write(&path, text).unwrap();
    path
}

/// Deterministic key generator: the n-th private key is 32 bytes of `n`, and
/// public keys are the bitwise complement of the private bytes
#[derive(Debug, Default)]
pub struct SequenceKeys {
    issued: Cell<u8>,
}

impl SequenceKeys {
    pub fn issued(&self) -> u8 {
        self.issued.get()
    }
}

impl KeyGenerator for SequenceKeys {
    fn name(&self) -> &str {
        "sequence"
    }

    fn generate_private_key(&self) -> Result<String> {
        let n = self.issued.get().wrapping_add(1);
        self.issued.set(n);
        Ok(STANDARD.encode([n; 32]))
    }

    fn derive_public_key(&self, private_key: &str) -> Result<String> {
        let bytes = decode_key(private_key).map_err(|reason| EngineError::tool(self.name(), reason))?;
        Ok(STANDARD.encode(bytes.map(|b| !b)))
    }
}
