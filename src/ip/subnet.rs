//! Client subnet allocation.
//!
//! The base block is split into fixed-size subnets in ascending order of
//! network address. Each client key is bound to exactly one subnet; bindings
//! found in the store are honoured first, and new clients draw the next
//! candidate that does not overlap anything already in use.

use crate::error::{EngineError, ResourceClass, Result};
use crate::record::ClientRecord;
use crate::utils::ip_utils::{blocks_overlap, parse_subnet};
use ipnet::{Ipv4Net, Ipv4Subnets};
use log::{debug, info, warn};
use std::collections::HashMap;

/// Lazy, ascending sequence of candidate subnets inside a base block
#[derive(Debug, Clone)]
pub struct SubnetCandidates {
    inner: Ipv4Subnets,
}

impl SubnetCandidates {
    /// Returns `None` when `prefix` is shorter than the base block's prefix
    pub fn new(base: Ipv4Net, prefix: u8) -> Option<Self> {
        base.subnets(prefix).ok().map(|inner| Self { inner })
    }
}

impl Iterator for SubnetCandidates {
    type Item = Ipv4Net;

    fn next(&mut self) -> Option<Ipv4Net> {
        self.inner.next()
    }
}

/// Subnet allocator for one run
#[derive(Debug)]
pub struct SubnetAllocator {
    base: Ipv4Net,
    prefix: u8,
    candidates: SubnetCandidates,
    /// Every subnet already handed out, including ones outside the base block
    used: Vec<Ipv4Net>,
    /// client key -> bound subnet
    bindings: HashMap<String, Ipv4Net>,
}

impl SubnetAllocator {
    pub fn new(base: Ipv4Net, prefix: u8) -> Option<Self> {
        Some(Self {
            base,
            prefix,
            candidates: SubnetCandidates::new(base, prefix)?,
            used: Vec::new(),
            bindings: HashMap::new(),
        })
    }

    /// Build an allocator seeded with the subnets and bindings in the store
    pub fn from_records(base: Ipv4Net, prefix: u8, records: &[ClientRecord]) -> Result<Self> {
        let mut allocator = Self::new(base, prefix).ok_or_else(|| {
            EngineError::InvalidConfig(crate::config::ConfigError::InvalidSubnetPrefix {
                prefix,
                base_prefix: base.prefix_len(),
            })
        })?;

        for record in records {
            let Some(value) = record.subnet.as_deref() else {
                continue;
            };
            let net = parse_subnet(value).map_err(|reason| EngineError::malformed(record.row, reason))?;
            allocator.mark_used(net);
            if let Some(key) = record.client_key() {
                allocator.bind(key, net, record.row);
            }
        }

        debug!(
            "Subnet allocator seeded with {} used subnets and {} client bindings",
            allocator.used.len(),
            allocator.bindings.len()
        );
        Ok(allocator)
    }

    pub fn mark_used(&mut self, net: Ipv4Net) {
        if !self.used.contains(&net) {
            if !self.base.contains(&net.network()) {
                warn!("Subnet {} lies outside the base block {}", net, self.base);
            }
            self.used.push(net);
        }
    }

    /// Record an existing binding; the first subnet seen for a client wins
    fn bind(&mut self, key: &str, net: Ipv4Net, row: usize) {
        match self.bindings.get(key) {
            Some(bound) if *bound != net => {
                warn!(
                    "Row {}: client '{}' is bound to {} but this row holds {}; keeping both",
                    row, key, bound, net
                );
            }
            Some(_) => {}
            None => {
                self.bindings.insert(key.to_string(), net);
            }
        }
    }

    pub fn binding(&self, client_key: &str) -> Option<Ipv4Net> {
        self.bindings.get(client_key).copied()
    }

    fn is_free(&self, candidate: &Ipv4Net) -> bool {
        !self.used.iter().any(|used| blocks_overlap(used, candidate))
    }

    /// Draw the next unused candidate, marking it used
    pub fn next_free(&mut self) -> Option<Ipv4Net> {
        while let Some(candidate) = self.candidates.next() {
            if self.is_free(&candidate) {
                self.used.push(candidate);
                return Some(candidate);
            }
        }
        None
    }

    /// Subnet for a client: its existing binding, or a fresh one
    pub fn subnet_for(&mut self, client_key: &str) -> Option<(Ipv4Net, bool)> {
        if let Some(bound) = self.binding(client_key) {
            return Some((bound, false));
        }
        let fresh = self.next_free()?;
        self.bindings.insert(client_key.to_string(), fresh);
        Some((fresh, true))
    }

    /// Fill the subnet of every record that lacks one, returning how many new
    /// subnets were drawn from the base block
    pub fn assign(&mut self, records: &mut [ClientRecord]) -> Result<usize> {
        let mut drawn = 0;

        for record in records.iter_mut() {
            if record.subnet.is_some() {
                continue;
            }
            let Some(key) = record.client_key().map(str::to_string) else {
                warn!(
                    "Row {}: no explicit group or client name, cannot bind a subnet",
                    record.row
                );
                continue;
            };

            let (net, fresh) = self.subnet_for(&key).ok_or_else(|| {
                EngineError::exhausted(
                    ResourceClass::Subnet,
                    record.row,
                    format!(
                        "client '{}' needs a subnet but {} has no free /{} left",
                        key,
                        self.base,
                        self.prefix
                    ),
                )
            })?;

            if fresh {
                drawn += 1;
                info!("Row {}: allocated subnet {} to client '{}'", record.row, net, key);
            } else {
                debug!("Row {}: reusing subnet {} of client '{}'", record.row, net, key);
            }
            record.subnet = Some(net.to_string());
        }

        Ok(drawn)
    }
}
