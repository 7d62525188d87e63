//! # Peerforge - Subnet, address and WireGuard key provisioning for remote sites
//!
//! This library fills in the network identity of every site in a hand-edited
//! record store: the client's subnet, the site's host address, a peer name,
//! a WireGuard keypair and a ready-to-install peer profile.
//!
//! ## Overview
//!
//! Operators keep one row per site in a CSV file and add rows as new sites
//! come online. Each run fills only what is missing. Existing subnets,
//! addresses, names and keys are never changed, so a run can be repeated at
//! any time and a second run over its own output changes nothing.
//!
//! ## Key Features
//!
//! - **Stable bindings**: every site of a client shares one subnet, drawn from
//!   the base block in ascending order and never reassigned
//! - **First-fit addressing**: the lowest free usable host of the subnet
//! - **Group packing**: ungrouped sites are packed into `GROUP<n>` buckets
//! - **Key reuse**: keys already in the store or in an existing profile are
//!   adopted before anything new is generated
//! - **All or nothing**: a failure at any stage leaves every file untouched
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - `config`: Type-safe configuration structures and YAML parsing
//! - `config_loader`: Configuration file loading and command-line overrides
//! - `record`: The client record model and its store columns
//! - `store`: CSV record store and address list output
//! - `group`: Group assignment for ungrouped sites
//! - `ip`: Subnet and host address allocation
//! - `naming`: Peer name normalization and collision handling
//! - `keys`: Key generation backends, peer profiles and provisioning
//! - `utils`: IP helpers and record validation
//! - `orchestrator`: High-level orchestration of a provisioning run
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use peerforge::{config_loader, keys, orchestrator};
//! use std::path::Path;
//!
//! let config = config_loader::load_config(Path::new("peerforge.yaml"))?;
//! let generator = keys::from_config(&config.wireguard);
//!
//! let report = orchestrator::run(&config, generator.as_ref(), false)?;
//! report.log_summary();
//! # Ok::<(), color_eyre::Report>(())
//! ```
//!
//! ## Error Handling
//!
//! Library functions return [`error::Result`], whose [`error::EngineError`]
//! names the offending row, resource or tool. The binary wraps these with
//! `color_eyre` for context.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod group;
pub mod ip;
pub mod keys;
pub mod naming;
pub mod orchestrator;
pub mod record;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{EngineError, Result};
pub use record::ClientRecord;
