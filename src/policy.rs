// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation of key resources into key policies.
//!
//! A [`KeyResource`] is what the operator wrote; a [`KeyPolicy`] is the same
//! resource with durations converted, defaults applied and every cross-field
//! rule checked. Validation happens before any filesystem or process
//! interaction, so a rejected resource never leaves partial state behind.

use chrono::TimeDelta;
use std::path::PathBuf;
use std::time::Duration;

use crate::algorithm::Algorithm;
use crate::config::{DurationValue, Ensure, KeyResource};
use crate::constants::{DEFAULT_PRECREATE_SECS, PRECREATE_PREPUBLISH_FACTOR};
use crate::duration::parse_duration;
use crate::errors::ConfigError;
use crate::keyfile::normalize_zone;
use crate::scanner::KeySelector;

/// A validated key resource.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyPolicy {
    pub name: String,
    /// Zone without trailing dot
    pub zone: String,
    pub key_directory: PathBuf,
    pub algorithm: Algorithm,
    /// Explicit size, or the algorithm default
    pub bits: Option<u32>,
    pub nsec3: bool,
    pub ksk: bool,
    pub successor: bool,
    pub purge: bool,
    pub prepublish: Option<Duration>,
    /// Resolved precreate window, see [`resolve_precreate`]
    pub precreate: Duration,
    pub active: Option<Duration>,
    pub revoke: Option<Duration>,
    pub retire: Option<Duration>,
    pub delete: Option<Duration>,
    pub ensure: Ensure,
}

impl KeyPolicy {
    /// Validate a resource.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if:
    /// - `key_directory` is missing
    /// - the zone is not a valid domain name
    /// - the algorithm mnemonic is not supported
    /// - a duration is malformed
    /// - `revoke` or `retire` is set on a zone-signing key
    /// - `precreate` is shorter than `prepublish`
    pub fn from_resource(resource: &KeyResource) -> Result<Self, ConfigError> {
        let name = resource.name.clone();

        let key_directory =
            resource
                .key_directory
                .clone()
                .ok_or_else(|| ConfigError::MissingKeyDirectory {
                    name: name.clone(),
                })?;

        let zone = resource.zone.as_deref().unwrap_or(&resource.name);
        validate_zone(zone)?;

        let algorithm = resource
            .algorithm
            .as_deref()
            .map_or(Ok(Algorithm::default()), str::parse::<Algorithm>)?;

        let precreate = duration(resource.precreate.as_ref())?;
        let prepublish = duration(resource.prepublish.as_ref())?;
        let active = duration(resource.active.as_ref())?;
        let revoke = duration(resource.revoke.as_ref())?;
        let retire = duration(resource.retire.as_ref())?;
        let delete = duration(resource.delete.as_ref())?;

        for (attribute, value) in [("revoke", revoke), ("retire", retire)] {
            if value.is_some() && !resource.ksk {
                return Err(ConfigError::RequiresKsk {
                    name: name.clone(),
                    attribute,
                });
            }
        }

        if let (Some(precreate), Some(prepublish)) = (precreate, prepublish) {
            if precreate < prepublish {
                return Err(ConfigError::PrecreateShorterThanPrepublish {
                    name,
                    precreate_secs: precreate.as_secs(),
                    prepublish_secs: prepublish.as_secs(),
                });
            }
        }

        Ok(Self {
            zone: normalize_zone(zone),
            key_directory,
            algorithm,
            bits: resource.bits.or_else(|| algorithm.default_bits()),
            nsec3: resource.nsec3,
            ksk: resource.ksk,
            successor: resource.successor,
            purge: resource.purge,
            prepublish,
            precreate: resolve_precreate(precreate, prepublish),
            active,
            revoke,
            retire,
            delete,
            ensure: resource.ensure,
            name,
        })
    }

    /// Which keys in the key directory belong to this policy.
    #[must_use]
    pub fn selector(&self) -> KeySelector {
        KeySelector {
            zone: self.zone.clone(),
            algorithm: self.algorithm,
            ksk: self.ksk,
        }
    }

    #[must_use]
    pub fn precreate_window(&self) -> TimeDelta {
        to_time_delta(self.precreate)
    }

    #[must_use]
    pub fn key_type(&self) -> &'static str {
        if self.ksk {
            "KSK"
        } else {
            "ZSK"
        }
    }
}

/// Resolve the precreate window.
///
/// 1. An explicit `precreate` wins.
/// 2. Otherwise twice the `prepublish` interval.
/// 3. Otherwise seven days.
#[must_use]
pub fn resolve_precreate(precreate: Option<Duration>, prepublish: Option<Duration>) -> Duration {
    match (precreate, prepublish) {
        (Some(precreate), _) => precreate,
        (None, Some(prepublish)) => prepublish.saturating_mul(PRECREATE_PREPUBLISH_FACTOR),
        (None, None) => Duration::from_secs(DEFAULT_PRECREATE_SECS),
    }
}

/// Convert to a signed delta, saturating at the largest representable delta.
#[must_use]
pub fn to_time_delta(duration: Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn duration(value: Option<&DurationValue>) -> Result<Option<Duration>, ConfigError> {
    value
        .map(|value| match value {
            DurationValue::Seconds(seconds) => Ok(Duration::from_secs(*seconds)),
            DurationValue::Text(text) => parse_duration(text),
        })
        .transpose()
}

/// Check that `zone` looks like a domain name `dnssec-keygen` will accept.
///
/// The name must start with a letter, contain at least two labels, use only
/// letters, digits, `-` and `.`, and end in an alphabetic top-level label. A
/// single trailing dot is allowed.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidZone`] otherwise.
pub fn validate_zone(zone: &str) -> Result<(), ConfigError> {
    let invalid = || ConfigError::InvalidZone {
        zone: zone.to_string(),
    };

    let name = zone.strip_suffix('.').unwrap_or(zone);
    if !name.starts_with(|c: char| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }

    let labels: Vec<&str> = name.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
    {
        return Err(invalid());
    }
    if !labels
        .last()
        .is_some_and(|tld| tld.chars().all(|c| c.is_ascii_alphabetic()))
    {
        return Err(invalid());
    }

    Ok(())
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
