//! Shared utilities: IP parsing helpers and record validation.

pub mod ip_utils;
pub mod validation;

pub use ip_utils::{blocks_overlap, host_bounds, is_usable_host, parse_address, parse_subnet};
pub use validation::validate_records;
