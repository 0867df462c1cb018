// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Convergence of one key resource.
//!
//! A pass validates the resource, scans its key directory (purging expired
//! keys when asked to), decides whether a new key is needed and, if so, runs
//! the key generator and hands the new files to the service user. Resources
//! with `ensure: absent` have all their key files removed instead.
//!
//! Passes are independent: every piece of state is re-read from the key
//! directory, and `now` is fixed for the whole pass.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{error, info, warn};

use crate::config::{Ensure, KeyResource};
use crate::errors::ConvergeError;
use crate::keygen::KeyGenerator;
use crate::metrics;
use crate::ownership::KeyOwnership;
use crate::policy::KeyPolicy;
use crate::rollover::{decide, Decision};
use crate::scanner::{remove_key_files, scan_keys};
use crate::timeline::ValidityTimeline;

/// What a pass did.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Valid now and valid at the end of the precreate window
    Satisfied,
    /// A new key pair was generated
    Created,
    /// A new key pair was needed but generation failed; the next pass retries
    GenerationFailed,
    /// Dry run: a new key pair would have been generated
    WouldCreate,
    /// All key pairs of an absent resource were removed
    Destroyed,
    /// Dry run: the key pairs of an absent resource would have been removed
    WouldDestroy,
}

impl Outcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Satisfied => "satisfied",
            Outcome::Created => "created",
            Outcome::GenerationFailed => "generation_failed",
            Outcome::WouldCreate => "would_create",
            Outcome::Destroyed => "destroyed",
            Outcome::WouldDestroy => "would_destroy",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one convergence pass.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConvergeReport {
    pub name: String,
    pub zone: String,
    pub key_type: &'static str,
    pub valid_now: bool,
    pub valid_later: bool,
    /// Keys matching the resource after purging
    pub keys: usize,
    /// Last key of the coverage chain starting now
    pub reference_key: Option<String>,
    /// End of the coverage chain starting now
    pub covered_until: Option<DateTime<Utc>>,
    pub purged: Vec<String>,
    /// Keys removed (or, in a dry run, to be removed) for an absent resource
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub destroyed: Vec<String>,
    pub created: Option<String>,
    /// Arguments of the key generation that ran or would run
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keygen_args: Vec<String>,
    /// Why key generation failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub outcome: Outcome,
}

impl ConvergeReport {
    fn new(policy: &KeyPolicy, outcome: Outcome) -> Self {
        Self {
            name: policy.name.clone(),
            zone: policy.zone.clone(),
            key_type: policy.key_type(),
            valid_now: false,
            valid_later: false,
            keys: 0,
            reference_key: None,
            covered_until: None,
            purged: Vec::new(),
            destroyed: Vec::new(),
            created: None,
            keygen_args: Vec::new(),
            error: None,
            outcome,
        }
    }
}

impl fmt::Display for ConvergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}): {}",
            self.name, self.zone, self.key_type, self.outcome
        )?;
        match self.outcome {
            Outcome::Destroyed | Outcome::WouldDestroy => {
                return write!(f, ", keys: {}", self.destroyed.join(" "));
            }
            _ => {}
        }
        write!(
            f,
            ", valid now: {}, valid later: {}, keys: {}",
            self.valid_now, self.valid_later, self.keys
        )?;
        if let Some(reference) = &self.reference_key {
            write!(f, ", reference: {reference}")?;
        }
        if let Some(until) = self.covered_until {
            write!(f, ", covered until: {}", until.to_rfc3339())?;
        }
        if !self.purged.is_empty() {
            write!(f, ", purged: {}", self.purged.join(" "))?;
        }
        if let Some(created) = &self.created {
            write!(f, ", created: {created}")?;
        }
        if self.outcome == Outcome::WouldCreate {
            write!(f, ", would run: {}", self.keygen_args.join(" "))?;
        }
        if let Some(error) = &self.error {
            write!(f, ", error: {error}")?;
        }
        Ok(())
    }
}

/// Runs convergence passes with one key generator.
#[derive(Clone, Debug)]
pub struct KeyProvider<G> {
    generator: G,
    ownership: Option<KeyOwnership>,
    dry_run: bool,
}

impl<G: KeyGenerator> KeyProvider<G> {
    #[must_use]
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            ownership: None,
            dry_run: false,
        }
    }

    /// Hand generated key files to `ownership`; `None` leaves them as created.
    #[must_use]
    pub fn with_ownership(mut self, ownership: Option<KeyOwnership>) -> Self {
        self.ownership = ownership;
        self
    }

    /// In a dry run nothing is purged, generated or removed.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    #[must_use]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    /// Run one convergence pass for `resource` at `now`.
    ///
    /// A failed key generation is not an error: it is reported as
    /// [`Outcome::GenerationFailed`] and retried by the next pass.
    ///
    /// # Errors
    ///
    /// Returns a [`ConvergeError`] if the resource is invalid, ownership of an
    /// existing or generated key cannot be changed, or a key of an absent
    /// resource cannot be removed.
    pub fn converge(
        &self,
        resource: &KeyResource,
        now: DateTime<Utc>,
    ) -> Result<ConvergeReport, ConvergeError> {
        let result = KeyPolicy::from_resource(resource)
            .map_err(ConvergeError::from)
            .and_then(|policy| match policy.ensure {
                Ensure::Present => self.ensure_present(&policy, now),
                Ensure::Absent => self.ensure_absent(&policy, now),
            });

        match &result {
            Ok(report) => {
                metrics::record_convergence(&report.zone, report.key_type, report.outcome.as_str());
            }
            Err(e) => {
                error!("Key resource {} failed: {}", resource.name, e);
                let zone = resource.zone.as_deref().unwrap_or(&resource.name);
                let key_type = if resource.ksk { "KSK" } else { "ZSK" };
                metrics::record_convergence(zone, key_type, "error");
            }
        }

        result
    }

    fn ensure_present(
        &self,
        policy: &KeyPolicy,
        now: DateTime<Utc>,
    ) -> Result<ConvergeReport, ConvergeError> {
        info!(
            "Checking {} keys for zone {} in {}",
            policy.key_type(),
            policy.zone,
            policy.key_directory.display()
        );

        let purge = policy.purge && !self.dry_run;
        let snapshot = scan_keys(&policy.key_directory, &policy.selector(), now, purge);
        let timeline = ValidityTimeline::new(&snapshot, now);

        if let Some(ownership) = self.ownership.as_ref().filter(|_| !self.dry_run) {
            ownership.apply_existing(snapshot.records().iter().flat_map(|record| {
                [record.public_path.as_path(), record.private_path.as_path()]
            }))?;
        }

        let mut report = ConvergeReport::new(policy, Outcome::Satisfied);
        report.valid_now = timeline.is_valid_now();
        report.valid_later = timeline.is_valid_until(policy.precreate_window());
        report.keys = snapshot.len();
        report.reference_key = timeline.reference_key().map(|key| key.base.clone());
        report.covered_until = timeline.covered_until();
        report.purged = snapshot.purged().to_vec();

        let valid_keys = snapshot
            .records()
            .iter()
            .filter(|record| record.is_valid_at(now))
            .count();
        metrics::record_valid_keys(&policy.zone, policy.key_type(), valid_keys);
        metrics::record_keys_removed(
            &policy.zone,
            policy.key_type(),
            "purged",
            report.purged.len(),
        );

        let request = match decide(policy, &timeline) {
            Decision::Satisfied => {
                info!(
                    "Zone {} has valid {} keys for at least {}s",
                    policy.zone,
                    policy.key_type(),
                    policy.precreate.as_secs()
                );
                return Ok(report);
            }
            Decision::Create(request) => request,
        };

        report.keygen_args = request.to_args();

        if self.dry_run {
            info!(
                "Dry run: would create a new {} for zone {}",
                policy.key_type(),
                policy.zone
            );
            report.outcome = Outcome::WouldCreate;
            return Ok(report);
        }

        info!(
            "Creating a new {} for zone {}",
            policy.key_type(),
            policy.zone
        );

        let key = match self.generator.generate(&request) {
            Ok(key) => key,
            Err(e) => {
                warn!(
                    "Key generation for zone {} failed, retrying on the next pass: {}",
                    policy.zone, e
                );
                metrics::record_keygen_failure(&policy.zone, policy.key_type());
                report.error = Some(e.to_string());
                report.outcome = Outcome::GenerationFailed;
                return Ok(report);
            }
        };

        if let Some(ownership) = &self.ownership {
            ownership.apply(&key)?;
        }

        info!("Created key {} for zone {}", key.base, policy.zone);
        metrics::record_key_created(&policy.zone, policy.key_type());
        report.created = Some(key.base);
        report.outcome = Outcome::Created;
        Ok(report)
    }

    fn ensure_absent(
        &self,
        policy: &KeyPolicy,
        now: DateTime<Utc>,
    ) -> Result<ConvergeReport, ConvergeError> {
        let snapshot = scan_keys(&policy.key_directory, &policy.selector(), now, false);

        let mut report = ConvergeReport::new(
            policy,
            if self.dry_run {
                Outcome::WouldDestroy
            } else {
                Outcome::Destroyed
            },
        );
        report.destroyed = snapshot
            .records()
            .iter()
            .map(|record| record.base.clone())
            .collect();

        if self.dry_run {
            return Ok(report);
        }

        for record in snapshot.records() {
            remove_key_files(record).map_err(|source| ConvergeError::Remove {
                base: record.base.clone(),
                source,
            })?;
            info!("Removed key {} for zone {}", record.base, policy.zone);
        }

        metrics::record_keys_removed(
            &policy.zone,
            policy.key_type(),
            "destroyed",
            report.destroyed.len(),
        );
        Ok(report)
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod provider_tests;
