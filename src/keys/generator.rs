//! Key generation port.
//!
//! The engine only needs two operations: make a private key, and derive the
//! public key that belongs to it. Both return base64 text tokens as produced
//! by `wg genkey` / `wg pubkey`.

use crate::config::{KeyBackend, WireGuardConfig};
use crate::error::{EngineError, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use log::debug;
use rand::rngs::OsRng;
use std::io::Write;
use std::process::{Command, Stdio};
use x25519_dalek::{PublicKey, StaticSecret};

/// Curve25519 key length in bytes
pub const KEY_LENGTH: usize = 32;

pub trait KeyGenerator {
    /// Short name used in error messages and logs
    fn name(&self) -> &str;

    fn generate_private_key(&self) -> Result<String>;

    fn derive_public_key(&self, private_key: &str) -> Result<String>;
}

/// Decode a base64 key token and check its length
pub fn decode_key(token: &str) -> std::result::Result<[u8; KEY_LENGTH], String> {
    let bytes = STANDARD
        .decode(token.trim())
        .map_err(|e| format!("key is not valid base64: {}", e))?;
    bytes
        .try_into()
        .map_err(|bytes: Vec<u8>| format!("key must be {} bytes, got {}", KEY_LENGTH, bytes.len()))
}

/// Build the generator selected in the configuration
pub fn from_config(config: &WireGuardConfig) -> Box<dyn KeyGenerator> {
    match config.key_backend {
        KeyBackend::Wg => Box::new(WgCommand::new(config.wg_path.clone())),
        KeyBackend::Native => Box::new(NativeKeys),
    }
}

/// Runs the external `wg` utility
#[derive(Debug, Clone)]
pub struct WgCommand {
    wg_path: String,
}

impl WgCommand {
    pub fn new(wg_path: impl Into<String>) -> Self {
        Self {
            wg_path: wg_path.into(),
        }
    }

    /// Execute `wg <subcommand>`, feeding `input` on stdin, and return the
    /// validated key printed on stdout
    fn exec(&self, subcommand: &str, input: Option<&str>) -> Result<String> {
        let tool = format!("{} {}", self.wg_path, subcommand);
        debug!("Executing {}", tool);

        let mut child = Command::new(&self.wg_path)
            .arg(subcommand)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::tool(&tool, format!("failed to start: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Some(input) = input {
                writeln!(stdin, "{}", input)
                    .map_err(|e| EngineError::tool(&tool, format!("failed to write stdin: {}", e)))?;
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| EngineError::tool(&tool, format!("failed to wait: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EngineError::tool(
                &tool,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let key = String::from_utf8_lossy(&output.stdout).trim().to_string();
        decode_key(&key).map_err(|reason| EngineError::tool(&tool, format!("unparseable output: {}", reason)))?;
        Ok(key)
    }
}

impl KeyGenerator for WgCommand {
    fn name(&self) -> &str {
        "wg"
    }

    fn generate_private_key(&self) -> Result<String> {
        self.exec("genkey", None)
    }

    fn derive_public_key(&self, private_key: &str) -> Result<String> {
        self.exec("pubkey", Some(private_key))
    }
}

/// In-process Curve25519 via x25519-dalek
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKeys;

impl KeyGenerator for NativeKeys {
    fn name(&self) -> &str {
        "native"
    }

    fn generate_private_key(&self) -> Result<String> {
        let secret = StaticSecret::random_from_rng(OsRng);
        Ok(STANDARD.encode(secret.to_bytes()))
    }

    fn derive_public_key(&self, private_key: &str) -> Result<String> {
        let bytes = decode_key(private_key).map_err(|reason| EngineError::tool(self.name(), reason))?;
        let secret = StaticSecret::from(bytes);
        Ok(STANDARD.encode(PublicKey::from(&secret).as_bytes()))
    }
}
