//! Record store validation.
//!
//! Runs once before any allocation so that a bad cell aborts the run with the
//! offending row instead of surfacing halfway through a pass.

use crate::error::{EngineError, Result};
use crate::naming::is_normalized;
use crate::record::ClientRecord;
use crate::utils::ip_utils::{blocks_overlap, is_usable_host, parse_address, parse_subnet};
use ipnet::Ipv4Net;
use log::debug;
use std::collections::HashMap;
use std::net::Ipv4Addr;

/// Subnet held by a client, and the first row it was seen on
struct SubnetOwner<'a> {
    net: Ipv4Net,
    client_key: &'a str,
    row: usize,
}

/// Validate the values already present in the store
///
/// Checks for:
/// - Subnets that do not parse or have host bits set
/// - Addresses that do not parse, lack a subnet, or are not a usable host of it
/// - The same address on two rows
/// - One subnet (or overlapping subnets) held by two different clients
/// - Peer names outside `[A-Z0-9_]`
/// - The same peer name on two rows
///
/// # Returns
/// * `Ok(())` if validation succeeds
/// * `Err(EngineError::MalformedRecord)` naming the first offending row
pub fn validate_records(records: &[ClientRecord]) -> Result<()> {
    let mut owners: Vec<SubnetOwner> = Vec::new();
    let mut addresses: HashMap<Ipv4Addr, usize> = HashMap::new();
    let mut peer_names: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let row = record.row;

        let subnet = match record.subnet.as_deref() {
            Some(value) => Some(parse_subnet(value).map_err(|reason| EngineError::malformed(row, reason))?),
            None => None,
        };

        if let (Some(net), Some(client_key)) = (subnet, record.client_key()) {
            check_subnet_owner(&owners, net, client_key, row)?;
            if !owners.iter().any(|owner| owner.net == net && owner.client_key == client_key) {
                owners.push(SubnetOwner { net, client_key, row });
            }
        }

        if let Some(value) = record.address.as_deref() {
            let addr = parse_address(value).map_err(|reason| EngineError::malformed(row, reason))?;
            let Some(net) = subnet else {
                return Err(EngineError::malformed(
                    row,
                    format!("address {} has no subnet", addr),
                ));
            };
            if !is_usable_host(&net, addr) {
                return Err(EngineError::malformed(
                    row,
                    format!("address {} is not a usable host of {}", addr, net),
                ));
            }
            if let Some(first) = addresses.insert(addr, row) {
                return Err(EngineError::malformed(
                    row,
                    format!("address {} is already assigned on row {}", addr, first),
                ));
            }
        }

        if let Some(name) = record.peer_name.as_deref() {
            if !is_normalized(name) {
                return Err(EngineError::malformed(
                    row,
                    format!("peer name '{}' may only contain A-Z, 0-9 and '_'", name),
                ));
            }
            if let Some(first) = peer_names.insert(name, row) {
                return Err(EngineError::malformed(
                    row,
                    format!("peer name {} is already used on row {}", name, first),
                ));
            }
        }
    }

    debug!(
        "Validated {} record(s): {} subnet binding(s), {} address(es)",
        records.len(),
        owners.len(),
        addresses.len()
    );
    Ok(())
}

fn check_subnet_owner(owners: &[SubnetOwner], net: Ipv4Net, client_key: &str, row: usize) -> Result<()> {
    let clash = owners
        .iter()
        .find(|owner| owner.client_key != client_key && blocks_overlap(&owner.net, &net));

    match clash {
        Some(owner) if owner.net == net => Err(EngineError::malformed(
            row,
            format!(
                "subnet {} belongs to '{}' (row {}) but this row is for '{}'",
                net, owner.client_key, owner.row, client_key
            ),
        )),
        Some(owner) => Err(EngineError::malformed(
            row,
            format!(
                "subnet {} overlaps {} held by '{}' (row {})",
                net, owner.net, owner.client_key, owner.row
            ),
        )),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row: usize, client: &str, subnet: Option<&str>, address: Option<&str>) -> ClientRecord {
        let mut record = ClientRecord::new(row);
        record.client_name = Some(client.to_string());
        record.subnet = subnet.map(str::to_string);
        record.address = address.map(str::to_string);
        record
    }

    fn malformed_row(result: Result<()>) -> usize {
        match result {
            Err(EngineError::MalformedRecord { row, .. }) => row,
            other => panic!("expected MalformedRecord, got {:?}", other),
        }
    }

    #[test]
    fn test_consistent_store_passes() {
        let records = vec![
            record(2, "Acme", Some("10.0.0.0/27"), Some("10.0.0.1")),
            record(3, "Acme", Some("10.0.0.0/27"), Some("10.0.0.2")),
            record(4, "Beta", Some("10.0.0.32/27"), None),
            record(5, "Gamma", None, None),
        ];
        assert!(validate_records(&records).is_ok());
    }

    #[test]
    fn test_bad_subnet() {
        let records = vec![record(2, "Acme", Some("10.0.0.5/27"), None)];
        assert_eq!(malformed_row(validate_records(&records)), 2);
    }

    #[test]
    fn test_address_without_subnet() {
        let records = vec![record(2, "Acme", None, Some("10.0.0.1"))];
        assert_eq!(malformed_row(validate_records(&records)), 2);
    }

    #[test]
    fn test_address_outside_subnet_or_reserved() {
        for address in ["10.0.0.40", "10.0.0.0", "10.0.0.31", "nope"] {
            let records = vec![record(2, "Acme", Some("10.0.0.0/27"), Some(address))];
            assert_eq!(malformed_row(validate_records(&records)), 2, "{}", address);
        }
    }

    #[test]
    fn test_duplicate_address() {
        let records = vec![
            record(2, "Acme", Some("10.0.0.0/27"), Some("10.0.0.1")),
            record(3, "Acme", Some("10.0.0.0/27"), Some("10.0.0.1")),
        ];
        assert_eq!(malformed_row(validate_records(&records)), 3);
    }

    #[test]
    fn test_subnet_shared_by_two_clients() {
        let records = vec![
            record(2, "Acme", Some("10.0.0.0/27"), None),
            record(3, "Beta", Some("10.0.0.0/27"), None),
        ];
        assert_eq!(malformed_row(validate_records(&records)), 3);
    }

    #[test]
    fn test_overlapping_subnets_of_two_clients() {
        let records = vec![
            record(2, "Acme", Some("10.0.0.0/26"), None),
            record(3, "Beta", Some("10.0.0.32/27"), None),
        ];
        assert_eq!(malformed_row(validate_records(&records)), 3);
    }

    #[test]
    fn test_peer_name_outside_charset() {
        for name in ["../escaped", "shop-1", "Depot", "A/B", "SITE 1"] {
            let mut first = record(2, "Acme", None, None);
            first.peer_name = Some(name.to_string());
            assert_eq!(malformed_row(validate_records(&[first])), 2, "{}", name);
        }
    }

    #[test]
    fn test_duplicate_peer_name() {
        let mut first = record(2, "Acme", None, None);
        first.peer_name = Some("DEPOT".to_string());
        let mut second = record(3, "Beta", None, None);
        second.peer_name = Some("DEPOT".to_string());
        assert_eq!(malformed_row(validate_records(&[first, second])), 3);
    }
}
