//! Client record model.
//!
//! One `ClientRecord` per site row in the store. Every field is optional: the
//! engine only fills fields that are absent and never rewrites present ones.

/// Prefix of system-generated group ids (`GROUP1`, `GROUP2`, ...)
pub const GENERATED_GROUP_PREFIX: &str = "GROUP";

/// Columns the engine reads and fills, in the order they are appended to a
/// store that lacks them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Group,
    Subnet,
    ClientName,
    SiteLabel,
    PeerName,
    Address,
    PublicKey,
    PrivateKey,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::Group,
        Field::Subnet,
        Field::ClientName,
        Field::SiteLabel,
        Field::PeerName,
        Field::Address,
        Field::PublicKey,
        Field::PrivateKey,
    ];

    /// Column header used in the store
    pub fn column(&self) -> &'static str {
        match self {
            Field::Group => "group",
            Field::Subnet => "subnet",
            Field::ClientName => "client_name",
            Field::SiteLabel => "site_label",
            Field::PeerName => "peer_name",
            Field::Address => "address",
            Field::PublicKey => "public_key",
            Field::PrivateKey => "private_key",
        }
    }

    pub fn from_column(header: &str) -> Option<Field> {
        let header = header.trim();
        Field::ALL
            .iter()
            .copied()
            .find(|field| field.column().eq_ignore_ascii_case(header))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientRecord {
    /// 1-based data row as the operator sees it (header is row 1, so the
    /// first record is row 2)
    pub row: usize,
    pub group: Option<String>,
    pub subnet: Option<String>,
    pub client_name: Option<String>,
    pub site_label: Option<String>,
    pub peer_name: Option<String>,
    pub address: Option<String>,
    pub public_key: Option<String>,
    pub private_key: Option<String>,
}

impl ClientRecord {
    pub fn new(row: usize) -> Self {
        Self {
            row,
            ..Default::default()
        }
    }

    pub fn get(&self, field: Field) -> Option<&str> {
        match field {
            Field::Group => self.group.as_deref(),
            Field::Subnet => self.subnet.as_deref(),
            Field::ClientName => self.client_name.as_deref(),
            Field::SiteLabel => self.site_label.as_deref(),
            Field::PeerName => self.peer_name.as_deref(),
            Field::Address => self.address.as_deref(),
            Field::PublicKey => self.public_key.as_deref(),
            Field::PrivateKey => self.private_key.as_deref(),
        }
    }

    /// Set a field from a raw cell; blank cells become absent
    pub fn set(&mut self, field: Field, value: &str) {
        let value = non_blank(value);
        match field {
            Field::Group => self.group = value,
            Field::Subnet => self.subnet = value,
            Field::ClientName => self.client_name = value,
            Field::SiteLabel => self.site_label = value,
            Field::PeerName => self.peer_name = value,
            Field::Address => self.address = value,
            Field::PublicKey => self.public_key = value,
            Field::PrivateKey => self.private_key = value,
        }
    }

    /// Stable identity binding this record to a subnet.
    ///
    /// An explicit group wins; a generated `GROUP<n>` placeholder does not
    /// identify a client, so the client name is used instead.
    pub fn client_key(&self) -> Option<&str> {
        match self.group.as_deref() {
            Some(group) if !is_generated_group(group) => Some(group),
            _ => self.client_name.as_deref(),
        }
    }

    pub fn has_keypair(&self) -> bool {
        self.public_key.is_some() && self.private_key.is_some()
    }
}

/// Parse the number out of a generated group id, e.g. `GROUP12` -> 12
pub fn generated_group_number(group: &str) -> Option<u32> {
    let digits = group.strip_prefix(GENERATED_GROUP_PREFIX)?;
    // Only canonical spellings count, so `GROUP01` stays an explicit group
    if digits.is_empty() || digits.starts_with('0') || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

pub fn is_generated_group(group: &str) -> bool {
    generated_group_number(group).is_some()
}

pub fn generated_group(n: u32) -> String {
    format!("{}{}", GENERATED_GROUP_PREFIX, n)
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
