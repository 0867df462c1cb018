// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared fixtures for unit tests: key files on disk and in memory.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::fs;
use std::path::Path;

use crate::algorithm::Algorithm;
use crate::keyfile::{far_future, format_timestamp, private_key_path, public_key_path, KeyRecord};

/// Fixed reference instant used throughout the tests.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
}

pub fn days(n: i64) -> TimeDelta {
    TimeDelta::days(n)
}

/// Description of a key file to write.
#[derive(Clone, Debug)]
pub struct KeySpec {
    pub zone: &'static str,
    pub algorithm: Algorithm,
    pub key_tag: u16,
    pub ksk: bool,
    pub activate: Option<DateTime<Utc>>,
    pub inactive: Option<DateTime<Utc>>,
    pub delete: Option<DateTime<Utc>>,
    pub private: bool,
}

impl KeySpec {
    pub fn ksk(key_tag: u16) -> Self {
        Self {
            zone: "example.com",
            algorithm: Algorithm::RsaSha256,
            key_tag,
            ksk: true,
            activate: None,
            inactive: None,
            delete: None,
            private: true,
        }
    }

    pub fn zsk(key_tag: u16) -> Self {
        Self {
            ksk: false,
            ..Self::ksk(key_tag)
        }
    }

    pub fn valid(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.activate = Some(from);
        self.inactive = Some(to);
        self
    }

    pub fn delete_at(mut self, at: DateTime<Utc>) -> Self {
        self.delete = Some(at);
        self
    }

    pub fn base(&self) -> String {
        format!(
            "K{}.+{:03}+{:05}",
            self.zone,
            self.algorithm.id(),
            self.key_tag
        )
    }

    pub fn contents(&self) -> String {
        let mut contents = format!(
            "; This is a {} key, keyid {}, for {}.\n",
            if self.ksk { "key-signing" } else { "zone-signing" },
            self.key_tag,
            self.zone
        );
        for (label, at) in [
            ("Activate", self.activate),
            ("Inactive", self.inactive),
            ("Delete", self.delete),
        ] {
            if let Some(at) = at {
                contents.push_str(&format!("; {label}: {}\n", format_timestamp(at)));
            }
        }
        contents.push_str(&format!(
            "{}. IN DNSKEY {} 3 {} AwEAAcNEU67LJI5GaAgwn\n",
            self.zone,
            if self.ksk { 257 } else { 256 },
            self.algorithm.id()
        ));
        contents
    }

    /// Write the key pair into `directory`.
    pub fn write(&self, directory: &Path) {
        let base = self.base();
        fs::write(public_key_path(directory, &base), self.contents()).unwrap();
        if self.private {
            fs::write(
                private_key_path(directory, &base),
                "Private-key-format: v1.3\n",
            )
            .unwrap();
        }
    }

    /// Build the record the scanner would produce, without touching disk.
    pub fn record(&self, directory: &Path) -> KeyRecord {
        let base = self.base();
        KeyRecord {
            public_path: public_key_path(directory, &base),
            private_path: private_key_path(directory, &base),
            base,
            zone: self.zone.to_string(),
            ksk: self.ksk,
            flags: if self.ksk { 257 } else { 256 },
            protocol: 3,
            algorithm: self.algorithm,
            key_tag: self.key_tag,
            created: None,
            publish: None,
            activation: self.activate,
            revoke: None,
            inactivation: self.inactive.unwrap_or_else(far_future),
            deletion: self.delete.unwrap_or_else(far_future),
        }
    }
}
