// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configuration file for keyroll.
//!
//! The configuration file is YAML with a global `settings` block and a list of
//! key resources, one per key the server should keep rolling:
//!
//! ```yaml
//! settings:
//!   keygen_path: /usr/sbin/dnssec-keygen
//!   keygen_timeout: 2mi
//!   owner: bind
//!   group: bind
//!   metrics_file: /var/lib/node_exporter/keyroll.prom
//!
//! keys:
//!   - name: example.com
//!     key_directory: /etc/bind/keys
//!     ksk: true
//!     algorithm: ECDSAP256SHA256
//!     successor: true
//!     purge: true
//!
//!   - name: ZSK/example.com
//!     zone: example.com
//!     key_directory: /etc/bind/keys
//!     algorithm: ECDSAP256SHA256
//!     prepublish: 2w
//!     active: 1y
//!     delete: 1w
//!     successor: true
//! ```
//!
//! Durations are integers with an optional unit suffix (`y`, `mo`, `w`, `d`,
//! `h`, `mi`); see [`crate::duration::parse_duration`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::constants::{DEFAULT_KEYGEN_PATH, DEFAULT_KEY_GROUP, DEFAULT_KEY_OWNER};

/// Top-level configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyrollConfig {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub keys: Vec<KeyResource>,
}

impl KeyrollConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid YAML for this schema.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse keyroll configuration")
    }

    /// Load the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let yaml = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_yaml(&yaml).with_context(|| format!("Invalid configuration in {}", path.display()))
    }
}

/// Settings shared by all key resources.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Key generation executable
    #[serde(default = "default_keygen_path")]
    pub keygen_path: PathBuf,

    /// Maximum run time of one key generation, as a duration string
    #[serde(default)]
    pub keygen_timeout: Option<DurationValue>,

    /// Owner of generated key files; `null` leaves ownership untouched
    #[serde(default = "default_owner")]
    pub owner: Option<String>,

    /// Group of generated key files; `null` leaves ownership untouched
    #[serde(default = "default_group")]
    pub group: Option<String>,

    /// Write Prometheus metrics to this file after each run
    #[serde(default)]
    pub metrics_file: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            keygen_path: default_keygen_path(),
            keygen_timeout: None,
            owner: default_owner(),
            group: default_group(),
            metrics_file: None,
        }
    }
}

fn default_keygen_path() -> PathBuf {
    PathBuf::from(DEFAULT_KEYGEN_PATH)
}

#[allow(clippy::unnecessary_wraps)]
fn default_owner() -> Option<String> {
    Some(DEFAULT_KEY_OWNER.to_string())
}

#[allow(clippy::unnecessary_wraps)]
fn default_group() -> Option<String> {
    Some(DEFAULT_KEY_GROUP.to_string())
}

/// Whether the keys of a resource should exist.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ensure {
    /// Keep a valid key configuration in place (create and roll keys)
    #[default]
    Present,
    /// Remove every key file matching the resource
    Absent,
}

/// A duration as written in the configuration: either plain seconds or a
/// string with a unit suffix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DurationValue {
    Seconds(u64),
    Text(String),
}

impl fmt::Display for DurationValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DurationValue::Seconds(seconds) => write!(f, "{seconds}"),
            DurationValue::Text(text) => f.write_str(text),
        }
    }
}

impl From<&str> for DurationValue {
    fn from(value: &str) -> Self {
        DurationValue::Text(value.to_string())
    }
}

/// One DNSSEC key resource as configured.
///
/// The resource is validated into a [`crate::policy::KeyPolicy`] before any
/// key directory is touched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyResource {
    /// Resource name; also the zone unless `zone` is set
    pub name: String,

    /// Zone the key is for
    #[serde(default)]
    pub zone: Option<String>,

    /// Directory holding the key files (required)
    #[serde(default)]
    pub key_directory: Option<PathBuf>,

    /// Algorithm mnemonic, `RSASHA1` when unset. Checked per resource, so an
    /// unsupported value only fails the resource that names it.
    #[serde(default)]
    pub algorithm: Option<String>,

    /// Key size; defaults depend on the algorithm
    #[serde(default)]
    pub bits: Option<u32>,

    /// Generate an NSEC3-capable key
    #[serde(default)]
    pub nsec3: bool,

    /// Manage key-signing keys instead of zone-signing keys
    #[serde(default)]
    pub ksk: bool,

    /// Create new keys as explicit successors of the current key
    #[serde(default)]
    pub successor: bool,

    /// Delete key files once their deletion time has passed
    #[serde(default)]
    pub purge: bool,

    /// How far ahead coverage must already exist
    #[serde(default)]
    pub precreate: Option<DurationValue>,

    /// How long a key is published before it becomes active
    #[serde(default, alias = "publish")]
    pub prepublish: Option<DurationValue>,

    /// How long a key signs the zone
    #[serde(default)]
    pub active: Option<DurationValue>,

    /// How long the revoke bit is set after the active phase (KSK only)
    #[serde(default)]
    pub revoke: Option<DurationValue>,

    /// How long the key stays published after it became inactive (KSK only)
    #[serde(default)]
    pub retire: Option<DurationValue>,

    /// How long the key files are kept before deletion
    #[serde(default)]
    pub delete: Option<DurationValue>,

    #[serde(default)]
    pub ensure: Ensure,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
