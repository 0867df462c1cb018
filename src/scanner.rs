// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key directory scanning and purging.
//!
//! The scanner turns a key directory into an immutable [`KeySnapshot`] of the
//! keys a resource cares about. Expired keys are purged during the scan, so
//! they can never influence the validity checks that follow.
//!
//! Filesystem trouble never fails a scan. A missing directory, a file that
//! disappears between listing and reading, or an unreadable or malformed file
//! only removes that entry from the snapshot. The worst outcome is that a new
//! key gets created, which is always safe.

use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::algorithm::Algorithm;
use crate::keyfile::{parse_public_key, KeyFileName, KeyRecord};

/// Which keys of a directory belong to a resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeySelector {
    pub zone: String,
    pub algorithm: Algorithm,
    pub ksk: bool,
}

impl KeySelector {
    #[must_use]
    pub fn matches(&self, record: &KeyRecord) -> bool {
        record.ksk == self.ksk && record.algorithm == self.algorithm
    }
}

/// The keys found by one scan, in deterministic order.
///
/// Records are sorted by activation time, then base name; keys that never
/// activate sort last.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KeySnapshot {
    records: Vec<KeyRecord>,
    purged: Vec<String>,
}

impl KeySnapshot {
    /// Build a snapshot from already parsed records.
    #[must_use]
    pub fn new(mut records: Vec<KeyRecord>, purged: Vec<String>) -> Self {
        records.sort_by(|a, b| {
            (a.activation.is_none(), a.activation, &a.base)
                .cmp(&(b.activation.is_none(), b.activation, &b.base))
        });
        Self { records, purged }
    }

    #[must_use]
    pub fn records(&self) -> &[KeyRecord] {
        &self.records
    }

    /// Base names of the keys deleted by this scan.
    #[must_use]
    pub fn purged(&self) -> &[String] {
        &self.purged
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Scan `directory` for the keys matching `selector`.
///
/// Only files named `K<zone>.+<alg>+<tag>.key` for the selector's zone are
/// read. Keys whose KSK flag or algorithm differ from the selector are skipped
/// entirely, including for purging. When `purge` is set, matching keys whose
/// deletion time lies before `now` have both files removed and are left out of
/// the snapshot.
pub fn scan_keys(
    directory: &Path,
    selector: &KeySelector,
    now: DateTime<Utc>,
    purge: bool,
) -> KeySnapshot {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!(
                "Key directory {} does not exist, no keys found",
                directory.display()
            );
            return KeySnapshot::default();
        }
        Err(e) => {
            warn!(
                "Unable to list key directory {}: {}",
                directory.display(),
                e
            );
            return KeySnapshot::default();
        }
    };

    let mut records = Vec::new();
    let mut purged = Vec::new();

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable directory entry: {}", e);
                continue;
            }
        };

        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            continue;
        };
        let Ok(name) = KeyFileName::parse(file_name) else {
            continue;
        };
        if !name.is_for_zone(&selector.zone) {
            continue;
        }

        let Some(record) = read_key(directory, &name) else {
            continue;
        };

        if !selector.matches(&record) {
            debug!(
                "Skipping key {} (ksk={}, algorithm={}) for zone {}",
                record.base, record.ksk, record.algorithm, selector.zone
            );
            continue;
        }

        info!(
            "Found key {} for zone {}, valid from {} to {}",
            record.base,
            selector.zone,
            record
                .activation
                .map_or_else(|| "never".to_string(), |a| a.to_rfc3339()),
            record.inactivation.to_rfc3339()
        );

        if purge && record.is_expired(now) {
            match remove_key_files(&record) {
                Ok(()) => {
                    info!(
                        "Purged key {} for zone {} (deletion time {})",
                        record.base,
                        selector.zone,
                        record.deletion.to_rfc3339()
                    );
                    purged.push(record.base);
                }
                Err(e) => warn!("Failed to purge key {}: {}", record.base, e),
            }
            continue;
        }

        records.push(record);
    }

    KeySnapshot::new(records, purged)
}

/// Read and parse one public key file, logging instead of failing.
fn read_key(directory: &Path, name: &KeyFileName) -> Option<KeyRecord> {
    let base = name.base();
    let public_path = crate::keyfile::public_key_path(directory, &base);

    match fs::metadata(&public_path) {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => {
            debug!("Skipping {}: not a regular file", public_path.display());
            return None;
        }
        Err(e) => {
            debug!("Skipping {}: {}", public_path.display(), e);
            return None;
        }
    }

    debug!("Checking key file {}", public_path.display());

    let contents = match fs::read_to_string(&public_path) {
        Ok(contents) => contents,
        Err(e) => {
            warn!("Unable to read key file {}: {}", public_path.display(), e);
            return None;
        }
    };

    let record = match parse_public_key(name, directory, &contents) {
        Ok(record) => record,
        Err(e) => {
            warn!("Ignoring key {}: {}", base, e);
            return None;
        }
    };

    if !record.private_path.exists() {
        warn!(
            "Private key {} is missing for key {}",
            record.private_path.display(),
            record.base
        );
    }

    Some(record)
}

/// Remove both files of a key pair. Files that are already gone are ignored.
///
/// # Errors
///
/// Returns the first I/O error other than "not found".
pub fn remove_key_files(record: &KeyRecord) -> io::Result<()> {
    for path in [&record.public_path, &record.private_path] {
        debug!("Removing {}", path.display());
        match fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "scanner_tests.rs"]
mod scanner_tests;
