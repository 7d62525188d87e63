//! Provisioning orchestrator.
//!
//! This module coordinates one run, from loading the record store through
//! group, subnet, address, name and key assignment to persisting the results.
//! Every stage works on an in-memory copy of the records; nothing touches the
//! disk until all stages have succeeded.

use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::group::GroupAssigner;
use crate::ip::{AddressAllocator, SubnetAllocator};
use crate::keys::{commit_profiles, KeyGenerator, KeyProvisioner, StagedProfile};
use crate::naming::PeerNamer;
use crate::record::ClientRecord;
use crate::store::{write_address_list, RecordSet};
use crate::utils::validation::validate_records;
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::Serialize;
use std::path::PathBuf;

/// What a run did, written as JSON when requested on the command line
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub records: usize,
    pub groups_assigned: usize,
    pub subnets_allocated: usize,
    pub addresses_allocated: usize,
    pub peer_names_derived: usize,
    pub keys_generated: usize,
    pub keys_adopted_from_profiles: usize,
    pub public_keys_derived: usize,
    pub profiles_staged: usize,
    pub profiles_written: usize,
    pub dry_run: bool,
    /// Store the updated records were written to (absent on a dry run)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    fn new(records: usize) -> Self {
        Self {
            records,
            groups_assigned: 0,
            subnets_allocated: 0,
            addresses_allocated: 0,
            peer_names_derived: 0,
            keys_generated: 0,
            keys_adopted_from_profiles: 0,
            public_keys_derived: 0,
            profiles_staged: 0,
            profiles_written: 0,
            dry_run: false,
            output_path: None,
            finished_at: Utc::now(),
        }
    }

    /// Whether the run filled anything at all
    pub fn changed(&self) -> bool {
        self.groups_assigned
            + self.subnets_allocated
            + self.addresses_allocated
            + self.peer_names_derived
            + self.keys_generated
            + self.keys_adopted_from_profiles
            + self.public_keys_derived
            + self.profiles_written
            > 0
    }

    pub fn log_summary(&self) {
        info!("=== Run summary ===");
        info!("Records:                 {}", self.records);
        info!("Groups assigned:         {}", self.groups_assigned);
        info!("Subnets allocated:       {}", self.subnets_allocated);
        info!("Addresses allocated:     {}", self.addresses_allocated);
        info!("Peer names derived:      {}", self.peer_names_derived);
        info!("Keypairs generated:      {}", self.keys_generated);
        info!("Keys adopted (profiles): {}", self.keys_adopted_from_profiles);
        info!("Public keys derived:     {}", self.public_keys_derived);
        if self.dry_run {
            info!("Profiles to write:       {}", self.profiles_staged);
            info!("Dry run: nothing was persisted");
        } else {
            info!("Profiles written:        {}", self.profiles_written);
        }
    }
}

/// Records after a full in-memory pass, with the profiles still to be written
#[derive(Debug)]
pub struct Allocation {
    pub records: Vec<ClientRecord>,
    pub staged: Vec<StagedProfile>,
    pub report: RunReport,
}

/// Run every stage against a copy of `records`
pub fn allocate(config: &Config, generator: &dyn KeyGenerator, records: &[ClientRecord]) -> Result<Allocation> {
    validate_records(records)?;

    let mut working = records.to_vec();
    let mut report = RunReport::new(working.len());

    report.groups_assigned = GroupAssigner::new(config.grouping.group_size).assign(&mut working)?;

    let base = config.network.base_net()?;
    let mut subnets = SubnetAllocator::from_records(base, config.network.subnet_prefix, &working)?;
    report.subnets_allocated = subnets.assign(&mut working)?;

    let mut addresses = AddressAllocator::from_records(&working)?;
    report.addresses_allocated = addresses.assign(&mut working)?;

    let mut namer = PeerNamer::new(config.naming.on_collision, &working);
    report.peer_names_derived = namer.assign(&mut working)?;

    let outcome = KeyProvisioner::new(config, generator).provision(&mut working)?;
    report.keys_generated = outcome.generated;
    report.keys_adopted_from_profiles = outcome.adopted_from_profile;
    report.public_keys_derived = outcome.derived_public;
    report.profiles_staged = outcome.staged.len();

    // The filled set must satisfy the same rules as the input
    validate_records(&working).map_err(|e| match e {
        EngineError::MalformedRecord { row, reason } => {
            EngineError::malformed(row, format!("allocation produced an inconsistent record: {}", reason))
        }
        other => other,
    })?;

    debug!(
        "Allocation pass complete: {} record(s), {} profile(s) staged",
        working.len(),
        outcome.staged.len()
    );
    Ok(Allocation {
        records: working,
        staged: outcome.staged,
        report,
    })
}

/// Load the store, fill every missing value and persist the result.
///
/// Profiles are written before the store so that a failure while saving
/// leaves keys on disk that the next run adopts.
pub fn run(config: &Config, generator: &dyn KeyGenerator, dry_run: bool) -> Result<RunReport> {
    let mut store = RecordSet::load(&config.storage.database_path)?;
    let Allocation {
        records,
        staged,
        mut report,
    } = allocate(config, generator, &store.records)?;
    report.dry_run = dry_run;

    if dry_run {
        for profile in &staged {
            info!("Dry run: would write profile for {} to {:?}", profile.peer_name, profile.path);
        }
        report.finished_at = Utc::now();
        return Ok(report);
    }

    report.profiles_written = commit_profiles(&staged)?;

    store.records = records;
    let output = config.output_path();
    store.save(output)?;
    report.output_path = Some(output.clone());

    if let Some(path) = &config.storage.address_list_path {
        write_address_list(path, &store.records)?;
    }

    report.finished_at = Utc::now();
    Ok(report)
}
