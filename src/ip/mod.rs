//! IP address allocation and management module.
//!
//! This module hands out client subnets carved from the configured base block
//! and host addresses inside those subnets. Both allocators are built per run
//! from the record set, so their used-sets never outlive a run.

pub mod host;
pub mod subnet;

// Re-export commonly used types
pub use host::{AddressAllocator, HostCandidates};
pub use subnet::{SubnetAllocator, SubnetCandidates};
