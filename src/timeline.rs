// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validity timeline over a key snapshot.
//!
//! A key is valid at an instant `t` when `activation <= t < inactivation`.
//! Keys may overlap; the timeline answers whether the zone is covered now,
//! whether it is still covered at the end of the precreate window, and which
//! key ends the unbroken chain of coverage that starts now.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use crate::keyfile::KeyRecord;
use crate::scanner::KeySnapshot;

/// Validity questions over one snapshot at one fixed instant.
#[derive(Clone, Copy, Debug)]
pub struct ValidityTimeline<'a> {
    records: &'a [KeyRecord],
    now: DateTime<Utc>,
}

impl<'a> ValidityTimeline<'a> {
    #[must_use]
    pub fn new(snapshot: &'a KeySnapshot, now: DateTime<Utc>) -> Self {
        Self::from_records(snapshot.records(), now)
    }

    /// Build a timeline over records already in the desired order.
    #[must_use]
    pub fn from_records(records: &'a [KeyRecord], now: DateTime<Utc>) -> Self {
        Self { records, now }
    }

    /// First record, in snapshot order, that is valid at `at`.
    #[must_use]
    pub fn valid_at(&self, at: DateTime<Utc>) -> Option<&'a KeyRecord> {
        self.records.iter().find(|record| record.is_valid_at(at))
    }

    #[must_use]
    pub fn is_valid_now(&self) -> bool {
        self.valid_at(self.now).is_some()
    }

    /// Whether some record (not necessarily the current one) is valid at `now + window`.
    #[must_use]
    pub fn is_valid_until(&self, window: TimeDelta) -> bool {
        self.now
            .checked_add_signed(window)
            .is_some_and(|at| self.valid_at(at).is_some())
    }

    /// The last key of the unbroken chain of coverage starting now.
    ///
    /// Starting at `now`, the record valid at the reference instant is taken
    /// and the instant moves to its inactivation time, until no record is
    /// valid there. Returns `None` when nothing is valid now.
    #[must_use]
    pub fn reference_key(&self) -> Option<&'a KeyRecord> {
        let mut reference = None;
        let mut at = self.now;

        // Each step moves `at` strictly forward (inactivation > at for a
        // valid record), so the walk ends after at most one step per record.
        while let Some(record) = self.valid_at(at) {
            debug!(
                "Coverage at {} provided by {} until {}",
                at.to_rfc3339(),
                record.base,
                record.inactivation.to_rfc3339()
            );
            reference = Some(record);
            at = record.inactivation;
        }

        reference
    }

    /// End of the unbroken chain of coverage starting now, if anything is valid now.
    #[must_use]
    pub fn covered_until(&self) -> Option<DateTime<Utc>> {
        self.reference_key().map(|record| record.inactivation)
    }
}

#[cfg(test)]
#[path = "timeline_tests.rs"]
mod timeline_tests;
