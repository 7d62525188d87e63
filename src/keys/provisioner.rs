//! Keypair provisioning.
//!
//! Precedence for each addressed, named record:
//! 1. both keys already in the store are kept as they are;
//! 2. an existing profile on disk supplies the private key;
//! 3. a lone private key in the store gets its public half derived;
//! 4. otherwise a fresh keypair is generated.
//!
//! New profiles are staged, not written, so that a failure later in the run
//! leaves the disk untouched.

use super::generator::{decode_key, KeyGenerator};
use super::profile::{profile_path, read_profile, write_new_profile, PeerProfile};
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::naming::is_normalized;
use crate::record::ClientRecord;
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// A profile waiting to be written once the whole run has succeeded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedProfile {
    pub row: usize,
    pub peer_name: String,
    pub path: PathBuf,
    pub contents: String,
}

#[derive(Debug, Default)]
pub struct ProvisionOutcome {
    pub generated: usize,
    pub adopted_from_profile: usize,
    pub derived_public: usize,
    pub staged: Vec<StagedProfile>,
}

/// How a record ended up with its keypair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeySource {
    Store,
    Profile,
    Derived,
    Generated,
}

pub struct KeyProvisioner<'a> {
    config: &'a Config,
    generator: &'a dyn KeyGenerator,
}

impl<'a> KeyProvisioner<'a> {
    pub fn new(config: &'a Config, generator: &'a dyn KeyGenerator) -> Self {
        Self { config, generator }
    }

    fn profiles_dir(&self) -> &Path {
        &self.config.storage.profiles_dir
    }

    pub fn provision(&self, records: &mut [ClientRecord]) -> Result<ProvisionOutcome> {
        let mut outcome = ProvisionOutcome::default();

        for record in records.iter_mut() {
            let (Some(subnet), Some(address), Some(peer_name)) = (
                record.subnet.clone(),
                record.address.clone(),
                record.peer_name.clone(),
            ) else {
                continue;
            };

            if !is_normalized(&peer_name) {
                return Err(EngineError::malformed(
                    record.row,
                    format!("peer name '{}' is not a valid profile name", peer_name),
                ));
            }
            let path = profile_path(self.profiles_dir(), &peer_name);
            let existing = read_profile(&path)?;

            match self.resolve_keys(record, existing.as_ref(), &path)? {
                KeySource::Store => debug!("Row {}: keeping stored keypair for {}", record.row, peer_name),
                KeySource::Profile => outcome.adopted_from_profile += 1,
                KeySource::Derived => outcome.derived_public += 1,
                KeySource::Generated => outcome.generated += 1,
            }

            if existing.is_none() {
                let private_key = record.private_key.as_deref().unwrap_or_default();
                let profile = PeerProfile::for_peer(private_key, &address, &subnet, self.config);
                debug!("Row {}: staging profile {:?}", record.row, path);
                outcome.staged.push(StagedProfile {
                    row: record.row,
                    peer_name,
                    path,
                    contents: profile.render(),
                });
            }
        }

        Ok(outcome)
    }

    fn resolve_keys(
        &self,
        record: &mut ClientRecord,
        existing: Option<&PeerProfile>,
        path: &Path,
    ) -> Result<KeySource> {
        if record.has_keypair() {
            return Ok(KeySource::Store);
        }

        if let Some(profile) = existing {
            let private_key = profile.private_key.clone().ok_or_else(|| {
                EngineError::malformed(
                    record.row,
                    format!("profile {} has no [Interface] PrivateKey", path.display()),
                )
            })?;
            self.check_key(record.row, &private_key, "profile PrivateKey")?;
            if record.private_key.as_deref().is_some_and(|stored| stored != private_key) {
                warn!(
                    "Row {}: stored private key differs from {}, using the profile",
                    record.row,
                    path.display()
                );
            }
            let public_key = self.generator.derive_public_key(&private_key)?;
            info!("Row {}: adopted keypair from {}", record.row, path.display());
            record.private_key = Some(private_key);
            record.public_key = Some(public_key);
            return Ok(KeySource::Profile);
        }

        match (record.private_key.clone(), record.public_key.is_some()) {
            (Some(private_key), false) => {
                self.check_key(record.row, &private_key, "private_key")?;
                let public_key = self.generator.derive_public_key(&private_key)?;
                info!("Row {}: derived missing public key", record.row);
                record.public_key = Some(public_key);
                Ok(KeySource::Derived)
            }
            (None, true) => Err(EngineError::malformed(
                record.row,
                "public_key is set without private_key and no profile exists to recover it; \
                 clear public_key to generate a new keypair",
            )),
            _ => {
                let private_key = self.generator.generate_private_key()?;
                let public_key = self.generator.derive_public_key(&private_key)?;
                info!(
                    "Row {}: generated keypair with {} backend",
                    record.row,
                    self.generator.name()
                );
                record.private_key = Some(private_key);
                record.public_key = Some(public_key);
                Ok(KeySource::Generated)
            }
        }
    }

    fn check_key(&self, row: usize, key: &str, what: &str) -> Result<()> {
        decode_key(key)
            .map(|_| ())
            .map_err(|reason| EngineError::malformed(row, format!("{}: {}", what, reason)))
    }
}

/// Write staged profiles, returning how many files were created
pub fn commit_profiles(staged: &[StagedProfile]) -> Result<usize> {
    let mut written = 0;
    for profile in staged {
        if write_new_profile(&profile.path, &profile.contents)? {
            info!("Wrote profile for {} to {:?}", profile.peer_name, profile.path);
            written += 1;
        } else {
            warn!(
                "Profile {:?} appeared during the run, leaving it untouched",
                profile.path
            );
        }
    }
    Ok(written)
}
