//! Shared fixtures for unit tests.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::keys::generator::{decode_key, KeyGenerator};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::cell::Cell;
use std::path::Path;

/// Configuration rooted in a temporary directory
pub fn sample_config(root: &Path) -> Config {
    let yaml = format!(
        r#"
network:
  base_network: "10.0.0.0/24"
  subnet_prefix: 27
wireguard:
  endpoint_host: "vpn.example.net"
  router_public_key: "cm91dGVyLXB1YmxpYy1rZXktcGxhY2Vob2xkZXIhIQ=="
  key_backend: native
storage:
  database_path: "{root}/sites.csv"
  profiles_dir: "{root}/tunnels"
"#,
        root = root.display()
    );
    serde_yaml::from_str(&yaml).unwrap()
}

/// Deterministic generator that counts how often it is asked for keys
#[derive(Debug, Default)]
pub struct CountingKeys {
    generated: Cell<usize>,
    derived: Cell<usize>,
    fail: bool,
}

impl CountingKeys {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn generated(&self) -> usize {
        self.generated.get()
    }

    pub fn derived(&self) -> usize {
        self.derived.get()
    }
}

impl KeyGenerator for CountingKeys {
    fn name(&self) -> &str {
        "counting"
    }

    fn generate_private_key(&self) -> Result<String> {
        if self.fail {
            return Err(EngineError::tool(self.name(), "simulated failure"));
        }
        let n = self.generated.get() + 1;
        self.generated.set(n);
        Ok(STANDARD.encode([n as u8; 32]))
    }

    fn derive_public_key(&self, private_key: &str) -> Result<String> {
        let bytes = decode_key(private_key).map_err(|reason| EngineError::tool(self.name(), reason))?;
        self.derived.set(self.derived.get() + 1);
        Ok(STANDARD.encode(bytes.map(|b| !b)))
    }
}
