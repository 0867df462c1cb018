// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for keyroll.
//!
//! This module provides specialized error types for:
//! - Resource configuration validation (fails fast, before touching the filesystem)
//! - Key file parsing (the offending record is skipped, the scan continues)
//! - Key generation through `dnssec-keygen` (the pass degrades, the next pass retries)
//! - Handing generated key files to the service user
//!
//! [`ConvergeError`] collects the hard failures of a resource: invalid
//! configuration, ownership changes and removal of keys with `ensure: absent`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors detected while validating a key resource configuration.
///
/// These are raised before any filesystem or process interaction, so a
/// resource failing validation never causes a partial state change.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The resource has no `key_directory`
    #[error("key_directory is a required attribute of key resource '{name}'")]
    MissingKeyDirectory {
        /// Resource name
        name: String,
    },

    /// `revoke` or `retire` was configured for a zone-signing key
    #[error("{attribute} is only supported if key is a KSK (resource '{name}')")]
    RequiresKsk {
        /// Resource name
        name: String,
        /// The offending attribute (`revoke` or `retire`)
        attribute: &'static str,
    },

    /// The precreate window does not cover the prepublication interval
    #[error(
        "precreate ({precreate_secs}s) must not be shorter than prepublish ({prepublish_secs}s) \
         (resource '{name}')"
    )]
    PrecreateShorterThanPrepublish {
        /// Resource name
        name: String,
        /// Configured precreate window in seconds
        precreate_secs: u64,
        /// Configured prepublish interval in seconds
        prepublish_secs: u64,
    },

    /// A duration string could not be converted
    #[error("Conversion of duration failed: '{value}': {reason}")]
    InvalidDuration {
        /// The raw duration string
        value: String,
        /// Why the conversion failed
        reason: String,
    },

    /// The zone is not a valid domain name
    #[error("Invalid zone name '{zone}'")]
    InvalidZone {
        /// The rejected zone name
        zone: String,
    },

    /// The algorithm mnemonic is not one `dnssec-keygen` understands
    #[error("Unsupported algorithm '{algorithm}'")]
    UnsupportedAlgorithm {
        /// The rejected mnemonic
        algorithm: String,
    },
}

/// Errors raised while parsing a single key file.
///
/// A record that fails to parse is excluded from the snapshot. Excluding it
/// fails safe towards creating a new key rather than trusting corrupt data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyFileError {
    /// File name does not follow `K<zone>.+<alg>+<tag>.key`
    #[error("'{file_name}' is not a key file name")]
    InvalidFileName {
        /// The rejected file name
        file_name: String,
    },

    /// A metadata comment carries a malformed timestamp
    #[error("Malformed {field} timestamp '{value}' in {path}")]
    InvalidTimestamp {
        /// Metadata field (`Activate`, `Inactive`, ...)
        field: &'static str,
        /// The raw timestamp
        value: String,
        /// Public key file
        path: PathBuf,
    },

    /// The DNSKEY resource record line has malformed numeric fields
    #[error("Malformed DNSKEY record in {path}: {line}")]
    InvalidRecord {
        /// Public key file
        path: PathBuf,
        /// The offending line
        line: String,
    },

    /// No DNSKEY resource record line for the zone was found
    #[error("No DNSKEY record for zone '{zone}' in {path}")]
    MissingRecord {
        /// Zone the file was expected to belong to
        zone: String,
        /// Public key file
        path: PathBuf,
    },
}

/// Errors from running the key generation tool.
///
/// None of these abort a convergence pass: the key is simply not created and
/// the next pass tries again.
#[derive(Error, Debug)]
pub enum KeygenError {
    /// The executable could not be started
    #[error("Failed to run {program}: {source}")]
    Spawn {
        /// Executable that was invoked
        program: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The process did not finish in time and was killed
    #[error("{program} did not finish within {timeout:?}")]
    Timeout {
        /// Executable that was invoked
        program: String,
        /// Configured timeout
        timeout: Duration,
    },

    /// The process exited unsuccessfully
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        /// Executable that was invoked
        program: String,
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error
        stderr: String,
    },

    /// The process succeeded but printed no key name
    #[error("{program} produced no output")]
    EmptyOutput {
        /// Executable that was invoked
        program: String,
    },
}

/// Errors handing generated key files to the service user and group.
#[derive(Error, Debug)]
pub enum OwnershipError {
    /// The user does not exist
    #[error("Unable to look up user '{user}'")]
    UnknownUser {
        /// User name
        user: String,
    },

    /// The group does not exist
    #[error("Unable to look up group '{group}'")]
    UnknownGroup {
        /// Group name
        group: String,
    },

    /// `chown` failed
    #[error("Failed to change ownership of {path} to {user}:{group}: {source}")]
    Chown {
        /// Target file
        path: PathBuf,
        /// User name
        user: String,
        /// Group name
        group: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Hard failures of one convergence pass.
#[derive(Error, Debug)]
pub enum ConvergeError {
    /// The resource failed validation
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generated key files could not be handed to the service user
    #[error(transparent)]
    Ownership(#[from] OwnershipError),

    /// A key pair could not be removed while destroying a resource
    #[error("Failed to remove key {base}: {source}")]
    Remove {
        /// Base name of the key pair
        base: String,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
