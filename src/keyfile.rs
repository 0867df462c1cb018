// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key file naming and public key file parsing.
//!
//! `dnssec-keygen` writes each key pair as two files in the key directory:
//!
//! ```text
//! Kexample.com.+008+24680.key       public key, timing metadata, DNSKEY record
//! Kexample.com.+008+24680.private   private key material
//! ```
//!
//! The public key file carries the timing metadata as comment lines followed
//! by the DNSKEY resource record:
//!
//! ```text
//! ; This is a key-signing key, keyid 24680, for example.com.
//! ; Created: 20231201120000 (Fri Dec  1 12:00:00 2023)
//! ; Publish: 20231201120000 (Fri Dec  1 12:00:00 2023)
//! ; Activate: 20240101120000 (Mon Jan  1 12:00:00 2024)
//! ; Inactive: 20250101120000 (Wed Jan  1 12:00:00 2025)
//! ; Delete: 20250201120000 (Sat Feb  1 12:00:00 2025)
//! example.com. IN DNSKEY 257 3 8 AwEAAc...
//! ```
//!
//! Only the metadata timestamps and the first three numeric fields of the
//! record are used. Key material is never decoded.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::algorithm::Algorithm;
use crate::constants::{
    ALGORITHM_FIELD_WIDTH, DNSKEY_FLAG_SEP, FAR_FUTURE_UNIX_SECS, KEY_TAG_FIELD_WIDTH,
    KEY_TIMESTAMP_FORMAT, PRIVATE_KEY_EXTENSION, PUBLIC_KEY_EXTENSION,
};
use crate::errors::KeyFileError;

/// The instant used for missing `Inactive:` and `Delete:` metadata.
///
/// 2038-01-19 03:14:07 UTC, the end of signed 32-bit Unix time.
#[must_use]
pub fn far_future() -> DateTime<Utc> {
    DateTime::from_timestamp(FAR_FUTURE_UNIX_SECS, 0).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Normalize a zone name for comparison: lowercase, no trailing dot.
#[must_use]
pub fn normalize_zone(zone: &str) -> String {
    zone.trim_end_matches('.').to_ascii_lowercase()
}

/// The components of a public key file name `K<zone>.+<alg>+<tag>.key`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyFileName {
    /// Zone as written in the file name, without the trailing dot
    pub zone: String,
    /// Numeric algorithm field
    pub algorithm_id: u8,
    /// Key tag field
    pub key_tag: u16,
}

impl KeyFileName {
    /// Parse a public key file name.
    ///
    /// The algorithm field must be exactly three digits and the key tag
    /// exactly five digits, both zero padded.
    ///
    /// # Errors
    ///
    /// Returns [`KeyFileError::InvalidFileName`] if the name does not follow
    /// the convention.
    pub fn parse(file_name: &str) -> Result<Self, KeyFileError> {
        let invalid = || KeyFileError::InvalidFileName {
            file_name: file_name.to_string(),
        };

        let stem = file_name
            .strip_prefix('K')
            .and_then(|rest| rest.strip_suffix(&format!(".{PUBLIC_KEY_EXTENSION}")))
            .ok_or_else(invalid)?;

        // "<zone>.+<alg>+<tag>": split from the right, zones never contain '+'
        let mut fields = stem.rsplitn(3, '+');
        let key_tag = fields.next().ok_or_else(invalid)?;
        let algorithm = fields.next().ok_or_else(invalid)?;
        let zone = fields
            .next()
            .and_then(|zone| zone.strip_suffix('.'))
            .ok_or_else(invalid)?;

        if zone.is_empty()
            || !is_fixed_width_number(algorithm, ALGORITHM_FIELD_WIDTH)
            || !is_fixed_width_number(key_tag, KEY_TAG_FIELD_WIDTH)
        {
            return Err(invalid());
        }

        Ok(Self {
            zone: zone.to_string(),
            algorithm_id: algorithm.parse().map_err(|_| invalid())?,
            key_tag: key_tag.parse().map_err(|_| invalid())?,
        })
    }

    /// Base name shared by both files of the pair, e.g. `Kexample.com.+008+24680`.
    #[must_use]
    pub fn base(&self) -> String {
        format!(
            "K{}.+{:03}+{:05}",
            self.zone, self.algorithm_id, self.key_tag
        )
    }

    /// Whether this key belongs to `zone` (case-insensitive, trailing dot ignored).
    #[must_use]
    pub fn is_for_zone(&self, zone: &str) -> bool {
        normalize_zone(&self.zone) == normalize_zone(zone)
    }
}

fn is_fixed_width_number(field: &str, width: usize) -> bool {
    field.len() == width && field.bytes().all(|b| b.is_ascii_digit())
}

/// Path of the public key file for `base` inside `directory`.
#[must_use]
pub fn public_key_path(directory: &Path, base: &str) -> PathBuf {
    directory.join(format!("{base}.{PUBLIC_KEY_EXTENSION}"))
}

/// Path of the private key file for `base` inside `directory`.
#[must_use]
pub fn private_key_path(directory: &Path, base: &str) -> PathBuf {
    directory.join(format!("{base}.{PRIVATE_KEY_EXTENSION}"))
}

/// One parsed key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeyRecord {
    /// Base name, e.g. `Kexample.com.+008+24680`
    pub base: String,
    /// Owning zone, without the trailing dot
    pub zone: String,
    pub public_path: PathBuf,
    pub private_path: PathBuf,
    /// Key-signing key (SEP flag set)
    pub ksk: bool,
    /// Raw DNSKEY flags field
    pub flags: u16,
    /// DNSKEY protocol field, carried through uninterpreted
    pub protocol: u8,
    pub algorithm: Algorithm,
    pub key_tag: u16,
    pub created: Option<DateTime<Utc>>,
    pub publish: Option<DateTime<Utc>>,
    /// `None` means the key never becomes active
    pub activation: Option<DateTime<Utc>>,
    pub revoke: Option<DateTime<Utc>>,
    /// Defaults to [`far_future`] when the file has no `Inactive:` line
    pub inactivation: DateTime<Utc>,
    /// Defaults to [`far_future`] when the file has no `Delete:` line
    pub deletion: DateTime<Utc>,
}

impl KeyRecord {
    /// Whether the key is in use at `at`: `activation <= at < inactivation`.
    ///
    /// A key without activation time, or with an inactivation time before its
    /// activation time, is never valid.
    #[must_use]
    pub fn is_valid_at(&self, at: DateTime<Utc>) -> bool {
        self.activation
            .is_some_and(|activation| activation <= at && at < self.inactivation)
    }

    /// Whether the deletion deadline lies strictly before `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deletion < now
    }
}

/// Timing metadata collected from the comment lines of a public key file.
#[derive(Default)]
struct KeyTiming {
    created: Option<DateTime<Utc>>,
    publish: Option<DateTime<Utc>>,
    activate: Option<DateTime<Utc>>,
    revoke: Option<DateTime<Utc>>,
    inactive: Option<DateTime<Utc>>,
    delete: Option<DateTime<Utc>>,
}

/// Numeric fields of the DNSKEY record line.
struct DnskeyFields {
    flags: u16,
    protocol: u8,
    algorithm_id: u8,
}

/// Parse a compact `YYYYMMDDHHMMSS` UTC timestamp.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if value.len() != 14 || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDateTime::parse_from_str(value, KEY_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Format an instant as a compact `YYYYMMDDHHMMSS` UTC timestamp.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(KEY_TIMESTAMP_FORMAT).to_string()
}

/// Parse the contents of a public key file.
///
/// `directory` is where both files of the pair live; it is only used to
/// build the record's paths.
///
/// # Errors
///
/// Returns an error if a metadata timestamp is malformed, or if the file has
/// no well-formed DNSKEY record for the zone in its name.
pub fn parse_public_key(
    name: &KeyFileName,
    directory: &Path,
    contents: &str,
) -> Result<KeyRecord, KeyFileError> {
    let base = name.base();
    let public_path = public_key_path(directory, &base);

    let mut timing = KeyTiming::default();
    let mut record: Option<DnskeyFields> = None;

    for line in contents.lines() {
        let line = line.trim();

        if let Some(comment) = line.strip_prefix(';') {
            parse_metadata_line(comment, &mut timing, &public_path)?;
            continue;
        }

        if record.is_none() {
            record = parse_dnskey_line(line, &name.zone, &public_path)?;
        }
    }

    let record = record.ok_or_else(|| KeyFileError::MissingRecord {
        zone: name.zone.clone(),
        path: public_path.clone(),
    })?;

    Ok(KeyRecord {
        private_path: private_key_path(directory, &base),
        public_path,
        base,
        zone: name.zone.clone(),
        ksk: record.flags & DNSKEY_FLAG_SEP != 0,
        flags: record.flags,
        protocol: record.protocol,
        algorithm: Algorithm::from_id(record.algorithm_id),
        key_tag: name.key_tag,
        created: timing.created,
        publish: timing.publish,
        activation: timing.activate,
        revoke: timing.revoke,
        inactivation: timing.inactive.unwrap_or_else(far_future),
        deletion: timing.delete.unwrap_or_else(far_future),
    })
}

fn parse_metadata_line(
    comment: &str,
    timing: &mut KeyTiming,
    path: &Path,
) -> Result<(), KeyFileError> {
    let Some((label, rest)) = comment.trim().split_once(':') else {
        return Ok(());
    };

    let (field, slot) = match label.trim() {
        "Created" => ("Created", &mut timing.created),
        "Publish" => ("Publish", &mut timing.publish),
        "Activate" => ("Activate", &mut timing.activate),
        "Revoke" => ("Revoke", &mut timing.revoke),
        "Inactive" => ("Inactive", &mut timing.inactive),
        "Delete" => ("Delete", &mut timing.delete),
        _ => return Ok(()),
    };

    let value = rest.split_whitespace().next().unwrap_or_default();
    let at = parse_timestamp(value).ok_or_else(|| KeyFileError::InvalidTimestamp {
        field,
        value: value.to_string(),
        path: path.to_path_buf(),
    })?;
    *slot = Some(at);

    Ok(())
}

/// Parse `<zone>. [ttl] [IN] DNSKEY <flags> <protocol> <algorithm> ...`.
///
/// Returns `Ok(None)` for lines that are not a DNSKEY record for `zone`.
fn parse_dnskey_line(
    line: &str,
    zone: &str,
    path: &Path,
) -> Result<Option<DnskeyFields>, KeyFileError> {
    let mut tokens = line.split_whitespace().peekable();

    let Some(owner) = tokens.next() else {
        return Ok(None);
    };
    if !owner.ends_with('.') || normalize_zone(owner) != normalize_zone(zone) {
        return Ok(None);
    }

    if tokens
        .peek()
        .is_some_and(|t| t.bytes().all(|b| b.is_ascii_digit()))
    {
        tokens.next();
    }
    if tokens.peek().is_some_and(|t| t.eq_ignore_ascii_case("IN")) {
        tokens.next();
    }
    if !tokens.next().is_some_and(|t| t.eq_ignore_ascii_case("DNSKEY")) {
        return Ok(None);
    }

    let invalid = || KeyFileError::InvalidRecord {
        path: path.to_path_buf(),
        line: line.to_string(),
    };

    let flags = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(invalid)?;
    let protocol = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(invalid)?;
    let algorithm_id = tokens.next().and_then(|t| t.parse().ok()).ok_or_else(invalid)?;

    Ok(Some(DnskeyFields {
        flags,
        protocol,
        algorithm_id,
    }))
}

#[cfg(test)]
#[path = "keyfile_tests.rs"]
mod keyfile_tests;
