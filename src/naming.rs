//! Peer name derivation.
//!
//! Site labels are typed by people ("Coffee Shop #3", " north  branch ") and
//! end up as file names and router peer names, so they are reduced to
//! `[A-Z0-9_]`.

use crate::config::CollisionPolicy;
use crate::error::{EngineError, Result};
use crate::record::ClientRecord;
use log::{info, warn};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Name given to sites without a usable label
pub const DEFAULT_PEER_NAME: &str = "VPN_DEFAULT";

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Normalize a free-text label into a peer identifier.
///
/// # Examples
/// ```
/// use peerforge::naming::{normalize, DEFAULT_PEER_NAME};
///
/// assert_eq!(normalize(Some(" Coffee Shop #3 ")), "COFFEE_SHOP_3");
/// assert_eq!(normalize(Some("   ")), DEFAULT_PEER_NAME);
/// assert_eq!(normalize(None), DEFAULT_PEER_NAME);
/// ```
pub fn normalize(label: Option<&str>) -> String {
    let trimmed = match label.map(str::trim) {
        Some(trimmed) if !trimmed.is_empty() => trimmed,
        _ => return DEFAULT_PEER_NAME.to_string(),
    };

    let name: String = WHITESPACE_RUN
        .replace_all(trimmed, "_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    // A label made only of punctuation has nothing left to name the peer by
    if name.is_empty() {
        DEFAULT_PEER_NAME.to_string()
    } else {
        name
    }
}

/// Whether `name` is already in normalized form (`[A-Z0-9_]`, non-empty).
/// Peer names become profile file names, so nothing else is accepted.
pub fn is_normalized(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Assigns unique peer names to records that have an address but no name
#[derive(Debug)]
pub struct PeerNamer {
    policy: CollisionPolicy,
    /// peer name -> row that holds it
    taken: HashMap<String, usize>,
}

impl PeerNamer {
    /// Seed the namer with every peer name already present in the store
    pub fn new(policy: CollisionPolicy, records: &[ClientRecord]) -> Self {
        let taken = records
            .iter()
            .filter_map(|record| record.peer_name.as_ref().map(|name| (name.clone(), record.row)))
            .collect();
        Self { policy, taken }
    }

    /// Fill missing peer names, returning how many were derived
    pub fn assign(&mut self, records: &mut [ClientRecord]) -> Result<usize> {
        let mut derived = 0;

        for record in records.iter_mut() {
            if record.peer_name.is_some() || record.address.is_none() {
                continue;
            }

            let base = normalize(record.site_label.as_deref());
            let name = self.resolve(&base, record.row)?;
            info!("Row {}: derived peer name {}", record.row, name);
            self.taken.insert(name.clone(), record.row);
            record.peer_name = Some(name);
            derived += 1;
        }

        Ok(derived)
    }

    fn resolve(&self, base: &str, row: usize) -> Result<String> {
        let Some(&holder) = self.taken.get(base) else {
            return Ok(base.to_string());
        };

        match self.policy {
            CollisionPolicy::Fail => Err(EngineError::malformed(
                row,
                format!("peer name {} is already used by row {}", base, holder),
            )),
            CollisionPolicy::Suffix => {
                let name = (2u32..)
                    .map(|n| format!("{}_{}", base, n))
                    .find(|candidate| !self.taken.contains_key(candidate))
                    .unwrap_or_else(|| base.to_string());
                warn!(
                    "Row {}: peer name {} is already used by row {}, using {}",
                    row, base, holder, name
                );
                Ok(name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site(row: usize, label: Option<&str>, address: Option<&str>) -> ClientRecord {
        let mut record = ClientRecord::new(row);
        record.site_label = label.map(str::to_string);
        record.address = address.map(str::to_string);
        record
    }

    #[test]
    fn test_normalize_examples() {
        assert_eq!(normalize(Some(" Coffee Shop #3 ")), "COFFEE_SHOP_3");
        assert_eq!(normalize(Some("north\t\tbranch")), "NORTH_BRANCH");
        assert_eq!(normalize(Some("Café-Centro")), "CAFCENTRO");
        assert_eq!(normalize(Some("already_OK_1")), "ALREADY_OK_1");
    }

    #[test]
    fn test_normalize_blank_labels() {
        assert_eq!(normalize(None), DEFAULT_PEER_NAME);
        assert_eq!(normalize(Some("")), DEFAULT_PEER_NAME);
        assert_eq!(normalize(Some("   ")), DEFAULT_PEER_NAME);
        assert_eq!(normalize(Some("#!?")), DEFAULT_PEER_NAME);
    }

    #[test]
    fn test_normalize_output_charset() {
        for label in ["a b c", "Shop-1", "  x\ny  ", "ñandú 42", "UPPER lower"] {
            let name = normalize(Some(label));
            assert!(name
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'));
        }
    }

    #[test]
    fn test_is_normalized() {
        assert!(is_normalized("SHOP_1"));
        assert!(is_normalized(DEFAULT_PEER_NAME));
        assert!(!is_normalized(""));
        assert!(!is_normalized("shop_1"));
        assert!(!is_normalized("SHOP-1"));
        assert!(!is_normalized("../ESCAPED"));
        assert!(is_normalized(&normalize(Some("../escaped"))));
    }

    #[test]
    fn test_assign_only_addressed_records_without_name() {
        let mut records = vec![
            site(2, Some("Main St"), Some("10.0.0.1")),
            site(3, Some("Harbor"), None),
            site(4, Some("Airport"), Some("10.0.0.2")),
        ];
        records[2].peer_name = Some("KEEP_ME".to_string());

        let mut namer = PeerNamer::new(CollisionPolicy::Suffix, &records);
        assert_eq!(namer.assign(&mut records).unwrap(), 1);
        assert_eq!(records[0].peer_name.as_deref(), Some("MAIN_ST"));
        assert_eq!(records[1].peer_name, None);
        assert_eq!(records[2].peer_name.as_deref(), Some("KEEP_ME"));
    }

    #[test]
    fn test_collision_suffix() {
        let mut records = vec![
            site(2, Some("Shop 1"), Some("10.0.0.1")),
            site(3, Some("Shop_1"), Some("10.0.0.2")),
            site(4, None, Some("10.0.0.3")),
            site(5, Some(""), Some("10.0.0.4")),
        ];

        let mut namer = PeerNamer::new(CollisionPolicy::Suffix, &records);
        namer.assign(&mut records).unwrap();
        assert_eq!(records[0].peer_name.as_deref(), Some("SHOP_1"));
        assert_eq!(records[1].peer_name.as_deref(), Some("SHOP_1_2"));
        assert_eq!(records[2].peer_name.as_deref(), Some("VPN_DEFAULT"));
        assert_eq!(records[3].peer_name.as_deref(), Some("VPN_DEFAULT_2"));
    }

    #[test]
    fn test_collision_with_existing_name() {
        let mut records = vec![
            site(2, Some("Depot"), Some("10.0.0.1")),
            site(3, Some("Depot"), Some("10.0.0.2")),
        ];
        records[1].peer_name = Some("DEPOT".to_string());

        let mut namer = PeerNamer::new(CollisionPolicy::Suffix, &records);
        namer.assign(&mut records).unwrap();
        assert_eq!(records[0].peer_name.as_deref(), Some("DEPOT_2"));
        assert_eq!(records[1].peer_name.as_deref(), Some("DEPOT"));
    }

    #[test]
    fn test_collision_fail_policy() {
        let mut records = vec![
            site(2, Some("Shop 1"), Some("10.0.0.1")),
            site(3, Some("shop 1"), Some("10.0.0.2")),
        ];

        let mut namer = PeerNamer::new(CollisionPolicy::Fail, &records);
        let err = namer.assign(&mut records).unwrap_err();
        assert!(matches!(err, EngineError::MalformedRecord { row: 3, .. }));
    }
}
