// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Rollover decision: keep the current keys, or create the next one.
//!
//! A resource is satisfied when a key is valid now and a key (possibly a
//! different one) is still valid at the end of the precreate window.
//! Otherwise a single [`KeygenRequest`] is built:
//!
//! - **Successor mode** (`successor: true` and a reference key exists): the
//!   new key is an explicit successor of the reference key. Algorithm, size
//!   and type are inherited, and activation follows the predecessor's
//!   inactivation.
//! - **Fresh mode** otherwise: the configured algorithm, size and flags are
//!   used and the new key activates immediately. When it follows a reference
//!   key it is published `prepublish` before now.
//!
//! Lifecycle deadlines are offsets from now, chained through the configured
//! phases: `active`, then `revoke`, then inactivation, then `retire` and
//! `delete`, ending at the deletion deadline.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::algorithm::Algorithm;
use crate::keyfile::KeyRecord;
use crate::policy::KeyPolicy;
use crate::timeline::ValidityTimeline;

/// A point in time relative to the moment `dnssec-keygen` runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TimeOffset {
    Now,
    /// Seconds from now
    Seconds(u64),
    /// Seconds before now
    Before(u64),
}

impl TimeOffset {
    #[must_use]
    pub fn from_secs(seconds: u64) -> Self {
        if seconds == 0 {
            TimeOffset::Now
        } else {
            TimeOffset::Seconds(seconds)
        }
    }
}

impl fmt::Display for TimeOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeOffset::Now => f.write_str("now"),
            TimeOffset::Seconds(seconds) => write!(f, "+{seconds}"),
            TimeOffset::Before(seconds) => write!(f, "-{seconds}"),
        }
    }
}

/// How the new key's properties are chosen.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeygenMode {
    /// New key from the configured properties
    Fresh {
        algorithm: Algorithm,
        bits: Option<u32>,
        nsec3: bool,
        ksk: bool,
        publish: TimeOffset,
        activate: TimeOffset,
    },
    /// Explicit successor of an existing key
    Successor {
        /// Base name of the predecessor
        predecessor: String,
        /// Prepublication interval in seconds
        prepublish: Option<u64>,
    },
}

/// Everything the key generator needs to create one key pair.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KeygenRequest {
    pub key_directory: PathBuf,
    pub zone: String,
    pub mode: KeygenMode,
    /// Revoke deadline, seconds from now
    pub revoke: Option<u64>,
    /// Inactivation deadline, seconds from now
    pub inactivate: Option<u64>,
    /// Deletion deadline, seconds from now
    pub delete: Option<u64>,
}

impl KeygenRequest {
    /// Command line arguments for `dnssec-keygen`.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-K".to_string(),
            self.key_directory.display().to_string(),
        ];

        match &self.mode {
            KeygenMode::Successor {
                predecessor,
                prepublish,
            } => {
                args.extend(["-S".to_string(), predecessor.clone()]);
                if let Some(prepublish) = prepublish {
                    args.extend(["-i".to_string(), prepublish.to_string()]);
                }
            }
            KeygenMode::Fresh {
                algorithm,
                bits,
                nsec3,
                ksk,
                publish,
                activate,
            } => {
                args.extend(["-a".to_string(), algorithm.as_str().to_string()]);
                if let Some(bits) = bits {
                    args.extend(["-b".to_string(), bits.to_string()]);
                }
                if *nsec3 {
                    args.push("-3".to_string());
                }
                if *ksk {
                    args.extend(["-f".to_string(), "KSK".to_string()]);
                }
                args.extend(["-n".to_string(), "ZONE".to_string()]);
                args.extend(["-P".to_string(), publish.to_string()]);
                args.extend(["-A".to_string(), activate.to_string()]);
            }
        }

        for (flag, deadline) in [
            ("-R", self.revoke),
            ("-I", self.inactivate),
            ("-D", self.delete),
        ] {
            if let Some(seconds) = deadline {
                args.extend([flag.to_string(), TimeOffset::from_secs(seconds).to_string()]);
            }
        }

        if matches!(self.mode, KeygenMode::Fresh { .. }) {
            args.push(self.zone.clone());
        }

        args
    }
}

/// Outcome of the rollover decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// Valid now and valid at the end of the precreate window
    Satisfied,
    /// A new key must be generated
    Create(KeygenRequest),
}

/// Decide whether `policy` needs a new key, given the timeline of its keys.
#[must_use]
pub fn decide(policy: &KeyPolicy, timeline: &ValidityTimeline<'_>) -> Decision {
    let valid_now = timeline.is_valid_now();
    let valid_later = timeline.is_valid_until(policy.precreate_window());

    debug!(
        "Zone {} {}: valid now={}, valid for next {}s={}",
        policy.zone,
        policy.key_type(),
        valid_now,
        policy.precreate.as_secs(),
        valid_later
    );

    if valid_now && valid_later {
        return Decision::Satisfied;
    }

    let reference = timeline.reference_key();
    if let Some(reference) = reference {
        info!(
            "Using reference key {} for zone {}",
            reference.base, policy.zone
        );
    }

    Decision::Create(build_request(policy, reference))
}

/// Build the generation request for the next key.
#[must_use]
pub fn build_request(policy: &KeyPolicy, reference: Option<&KeyRecord>) -> KeygenRequest {
    let prepublish = policy.prepublish.map(|p| p.as_secs());

    let mode = match reference {
        Some(reference) if policy.successor => KeygenMode::Successor {
            predecessor: reference.base.clone(),
            prepublish,
        },
        _ => KeygenMode::Fresh {
            algorithm: policy.algorithm,
            bits: policy.bits,
            nsec3: policy.nsec3,
            ksk: policy.ksk,
            publish: match (reference, prepublish) {
                (Some(_), Some(seconds)) if seconds > 0 => TimeOffset::Before(seconds),
                _ => TimeOffset::Now,
            },
            activate: TimeOffset::Now,
        },
    };

    let (revoke, inactivate, delete) = deadlines(policy);

    KeygenRequest {
        key_directory: policy.key_directory.clone(),
        zone: policy.zone.clone(),
        mode,
        revoke,
        inactivate,
        delete,
    }
}

/// Revoke, inactivation and deletion offsets from now.
///
/// Each deadline is the sum of the phases configured before it, so the
/// deletion deadline is the sum of every configured phase.
fn deadlines(policy: &KeyPolicy) -> (Option<u64>, Option<u64>, Option<u64>) {
    let mut t = policy.active.map_or(0, |active| active.as_secs());

    let revoke = policy.revoke.map(|revoke| {
        let at = t;
        t = t.saturating_add(revoke.as_secs());
        at
    });

    let inactivate = (policy.active.is_some() || revoke.is_some()).then_some(t);

    for phase in [policy.retire, policy.delete].into_iter().flatten() {
        t = t.saturating_add(phase.as_secs());
    }

    let any_phase = inactivate.is_some() || policy.retire.is_some() || policy.delete.is_some();
    (revoke, inactivate, any_phase.then_some(t))
}

#[cfg(test)]
#[path = "rollover_tests.rs"]
mod rollover_tests;
