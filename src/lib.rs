// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # keyroll - DNSSEC key rollover for BIND9 key directories
//!
//! keyroll keeps a BIND9 key directory supplied with DNSSEC keys. For every
//! configured key resource it reads the timing metadata of the existing key
//! files, decides whether the zone is covered now and for the configured
//! precreate window, and runs `dnssec-keygen` to create the next key when it
//! is not. Expired keys can be purged, and resources marked absent have their
//! keys removed.
//!
//! ## Modules
//!
//! - [`config`] - YAML configuration file and key resources
//! - [`policy`] - Validation of key resources
//! - [`keyfile`] - Key file names and public key metadata
//! - [`scanner`] - Key directory scanning and purging
//! - [`timeline`] - Validity checks and reference key selection
//! - [`rollover`] - The decision to create a key and its `dnssec-keygen` arguments
//! - [`keygen`] - Key generation through `dnssec-keygen`
//! - [`provider`] - One convergence pass per key resource
//!
//! ## Example
//!
//! ```rust,no_run
//! use chrono::Utc;
//! use keyroll::config::KeyrollConfig;
//! use keyroll::keygen::DnssecKeygen;
//! use keyroll::provider::KeyProvider;
//!
//! let config = KeyrollConfig::load("/etc/keyroll/keyroll.yaml".as_ref()).unwrap();
//! let provider = KeyProvider::new(DnssecKeygen::default());
//!
//! for resource in &config.keys {
//!     let report = provider.converge(resource, Utc::now()).unwrap();
//!     println!("{report}");
//! }
//! ```

pub mod algorithm;
pub mod config;
pub mod constants;
pub mod duration;
pub mod errors;
pub mod keyfile;
pub mod keygen;
pub mod metrics;
pub mod ownership;
pub mod policy;
pub mod provider;
pub mod rollover;
pub mod scanner;
pub mod timeline;

#[cfg(test)]
mod testing;
