//! Host address allocation inside client subnets.
//!
//! First fit, ascending, against one used-address set shared by every subnet
//! in the run.

use crate::error::{EngineError, ResourceClass, Result};
use crate::record::ClientRecord;
use crate::utils::ip_utils::{host_bounds, parse_address, parse_subnet};
use ipnet::Ipv4Net;
use log::{debug, info};
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Usable hosts of a subnet in ascending order (network and broadcast excluded)
#[derive(Debug, Clone)]
pub struct HostCandidates {
    next: u32,
    last: u32,
    done: bool,
}

impl HostCandidates {
    pub fn new(net: &Ipv4Net) -> Self {
        match host_bounds(net) {
            Some((first, last)) => Self {
                next: first,
                last,
                done: false,
            },
            None => Self {
                next: 0,
                last: 0,
                done: true,
            },
        }
    }
}

impl Iterator for HostCandidates {
    type Item = Ipv4Addr;

    fn next(&mut self) -> Option<Ipv4Addr> {
        if self.done {
            return None;
        }
        let current = self.next;
        if current == self.last {
            self.done = true;
        } else {
            self.next += 1;
        }
        Some(Ipv4Addr::from(current))
    }
}

/// Address allocator for one run
#[derive(Debug, Default)]
pub struct AddressAllocator {
    used: HashSet<Ipv4Addr>,
}

impl AddressAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an allocator that treats every address in the store as taken
    pub fn from_records(records: &[ClientRecord]) -> Result<Self> {
        let mut allocator = Self::new();
        for record in records {
            if let Some(value) = record.address.as_deref() {
                let addr = parse_address(value).map_err(|reason| EngineError::malformed(record.row, reason))?;
                allocator.used.insert(addr);
            }
        }
        debug!("Address allocator seeded with {} used addresses", allocator.used.len());
        Ok(allocator)
    }

    /// Take the lowest free host of `net`
    pub fn allocate(&mut self, net: &Ipv4Net) -> Option<Ipv4Addr> {
        let addr = HostCandidates::new(net).find(|addr| !self.used.contains(addr))?;
        self.used.insert(addr);
        Some(addr)
    }

    /// Fill the address of every record that has a subnet but no address
    pub fn assign(&mut self, records: &mut [ClientRecord]) -> Result<usize> {
        let mut assigned = 0;

        for record in records.iter_mut() {
            if record.address.is_some() {
                continue;
            }
            let Some(value) = record.subnet.as_deref() else {
                continue;
            };
            let net = parse_subnet(value).map_err(|reason| EngineError::malformed(record.row, reason))?;

            let addr = self.allocate(&net).ok_or_else(|| {
                EngineError::exhausted(
                    ResourceClass::Address,
                    record.row,
                    format!("every usable host of {} is already assigned", net),
                )
            })?;

            info!("Row {}: allocated address {} in {}", record.row, addr, net);
            record.address = Some(addr.to_string());
            assigned += 1;
        }

        Ok(assigned)
    }
}
