//! WireGuard key material and peer profiles.

pub mod generator;
pub mod profile;
pub mod provisioner;

pub use generator::{from_config, KeyGenerator, NativeKeys, WgCommand};
pub use profile::{profile_path, PeerProfile};
pub use provisioner::{commit_profiles, KeyProvisioner, ProvisionOutcome, StagedProfile};
