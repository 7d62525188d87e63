//! Peer profile files.
//!
//! One WireGuard client configuration per peer, named `<peer_name>.conf`.
//! Profiles are never rewritten once they exist, since operators edit them by
//! hand.

use crate::config::Config;
use crate::error::{EngineError, Result};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Keepalive interval written into every new profile, in seconds
pub const PERSISTENT_KEEPALIVE: u16 = 30;

/// Fields read from or written to a profile. Everything is optional because
/// hand-edited files may lack any of them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerProfile {
    pub private_key: Option<String>,
    pub address: Option<String>,
    pub dns: Option<String>,
    pub peer_public_key: Option<String>,
    pub allowed_ips: Option<String>,
    pub endpoint: Option<String>,
    pub persistent_keepalive: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Interface,
    Peer,
    Other,
}

impl PeerProfile {
    /// Profile for a newly provisioned peer
    pub fn for_peer(private_key: &str, address: &str, subnet: &str, config: &Config) -> Self {
        Self {
            private_key: Some(private_key.to_string()),
            address: Some(address.to_string()),
            dns: config.wireguard.dns.clone(),
            peer_public_key: Some(config.wireguard.router_public_key.clone()),
            allowed_ips: Some(subnet.to_string()),
            endpoint: Some(config.endpoint()),
            persistent_keepalive: Some(PERSISTENT_KEEPALIVE.to_string()),
        }
    }

    /// Scan a profile for known keys, ignoring anything unrecognised
    pub fn parse(text: &str) -> Self {
        let mut profile = PeerProfile::default();
        let mut section = Section::None;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }
            if line.starts_with('[') && line.ends_with(']') {
                section = match line[1..line.len() - 1].trim().to_ascii_lowercase().as_str() {
                    "interface" => Section::Interface,
                    "peer" => Section::Peer,
                    _ => Section::Other,
                };
                continue;
            }
            // Base64 keys end in '=' padding, so split on the first '=' only
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = Some(value.trim().to_string());

            match (section, key.trim()) {
                (Section::Interface, "PrivateKey") => profile.private_key = value,
                (Section::Interface, "Address") => profile.address = value,
                (Section::Interface, "DNS") => profile.dns = value,
                (Section::Peer, "PublicKey") => profile.peer_public_key = value,
                (Section::Peer, "AllowedIPs") => profile.allowed_ips = value,
                (Section::Peer, "Endpoint") => profile.endpoint = value,
                (Section::Peer, "PersistentKeepalive") => profile.persistent_keepalive = value,
                _ => {}
            }
        }

        profile
    }

    pub fn render(&self) -> String {
        let mut out = String::from("[Interface]\n");
        push_line(&mut out, "PrivateKey", &self.private_key);
        push_line(&mut out, "Address", &self.address);
        push_line(&mut out, "DNS", &self.dns);
        out.push_str("\n[Peer]\n");
        push_line(&mut out, "PublicKey", &self.peer_public_key);
        push_line(&mut out, "AllowedIPs", &self.allowed_ips);
        push_line(&mut out, "Endpoint", &self.endpoint);
        push_line(&mut out, "PersistentKeepalive", &self.persistent_keepalive);
        out
    }
}

fn push_line(out: &mut String, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push('\n');
    }
}

pub fn profile_path(profiles_dir: &Path, peer_name: &str) -> PathBuf {
    profiles_dir.join(format!("{}.conf", peer_name))
}

/// Read a profile if one exists
pub fn read_profile(path: &Path) -> Result<Option<PeerProfile>> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(PeerProfile::parse(&text))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(EngineError::io(path, e)),
    }
}

/// Write a profile that must not exist yet. Returns `false` if one appeared in
/// the meantime, which is left untouched.
pub fn write_new_profile(path: &Path, contents: &str) -> Result<bool> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| EngineError::io(dir, e))?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = match options.open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(EngineError::io(path, e)),
    };
    file.write_all(contents.as_bytes())
        .map_err(|e| EngineError::io(path, e))?;
    Ok(true)
}
