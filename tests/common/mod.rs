// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use keyroll::algorithm::Algorithm;
use keyroll::config::KeyResource;
use keyroll::errors::KeygenError;
use keyroll::keyfile::{
    format_timestamp, parse_public_key, private_key_path, public_key_path, KeyFileName,
};
use keyroll::keygen::{GeneratedKey, KeyGenerator};
use keyroll::rollover::{KeygenMode, KeygenRequest, TimeOffset};
use std::cell::{Cell, RefCell};
use std::fs;
use std::path::Path;

/// Fixed start of every scenario
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

pub fn days(n: i64) -> TimeDelta {
    TimeDelta::days(n)
}

/// A KSK resource for `example.com` in `dir`
pub fn ksk_resource(dir: &Path) -> KeyResource {
    KeyResource {
        name: "example.com".to_string(),
        key_directory: Some(dir.to_path_buf()),
        algorithm: Some("ECDSAP256SHA256".to_string()),
        ksk: true,
        ..KeyResource::default()
    }
}

/// Write a key pair the way `dnssec-keygen` lays it out.
pub fn write_key(
    dir: &Path,
    zone: &str,
    algorithm: Algorithm,
    key_tag: u16,
    ksk: bool,
    timing: &[(&str, DateTime<Utc>)],
) -> String {
    let base = format!("K{zone}.+{:03}+{key_tag:05}", algorithm.id());

    let mut contents = format!(
        "; This is a {} key, keyid {key_tag}, for {zone}.\n",
        if ksk { "key-signing" } else { "zone-signing" }
    );
    for (label, at) in timing {
        contents.push_str(&format!(
            "; {label}: {} ({})\n",
            format_timestamp(*at),
            at.format("%a %b %e %H:%M:%S %Y")
        ));
    }
    contents.push_str(&format!(
        "{zone}. 3600 IN DNSKEY {} 3 {} mdsswUyr3DPW132mOi8V9xESWE8jTo0dxCjjnopKl+GqJxpVXckHAeF+KkxLbxILfDLUT0rAK9iUzy1L53eKGQ==\n",
        if ksk { 257 } else { 256 },
        algorithm.id()
    ));

    fs::write(public_key_path(dir, &base), contents).unwrap();
    fs::write(
        private_key_path(dir, &base),
        format!("Private-key-format: v1.3\nAlgorithm: {} ({algorithm})\n", algorithm.id()),
    )
    .unwrap();
    base
}

/// Base names of all public key files in `dir`, sorted
pub fn key_files(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| {
            let name = entry.unwrap().file_name().into_string().unwrap();
            name.strip_suffix(".key").map(str::to_string)
        })
        .collect();
    names.sort();
    names
}

/// In-process stand-in for `dnssec-keygen`.
///
/// Writes a key pair whose timing metadata follows the request, relative to
/// the clock set with [`FakeKeygen::set_now`], so later passes see the key
/// exactly as they would see one from the real tool.
pub struct FakeKeygen {
    now: Cell<DateTime<Utc>>,
    next_tag: Cell<u16>,
    pub requests: RefCell<Vec<KeygenRequest>>,
    pub fail: Cell<bool>,
}

impl FakeKeygen {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
            next_tag: Cell::new(40_000),
            requests: RefCell::new(Vec::new()),
            fail: Cell::new(false),
        }
    }

    pub fn set_now(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn request_count(&self) -> usize {
        self.requests.borrow().len()
    }

    fn at(&self, offset: TimeOffset) -> DateTime<Utc> {
        match offset {
            TimeOffset::Now => self.now.get(),
            TimeOffset::Seconds(seconds) => self.after(seconds),
            TimeOffset::Before(seconds) => {
                self.now.get() - TimeDelta::seconds(i64::try_from(seconds).unwrap())
            }
        }
    }

    fn after(&self, seconds: u64) -> DateTime<Utc> {
        self.now.get() + TimeDelta::seconds(i64::try_from(seconds).unwrap())
    }
}

impl KeyGenerator for FakeKeygen {
    fn generate(&self, request: &KeygenRequest) -> Result<GeneratedKey, KeygenError> {
        self.requests.borrow_mut().push(request.clone());
        if self.fail.get() {
            return Err(KeygenError::Timeout {
                program: "fake-keygen".to_string(),
                timeout: std::time::Duration::from_secs(60),
            });
        }

        let dir = &request.key_directory;
        let now = self.now.get();

        let (algorithm, ksk, publish, activate) = match &request.mode {
            KeygenMode::Fresh {
                algorithm,
                ksk,
                publish,
                activate,
                ..
            } => (*algorithm, *ksk, self.at(*publish), self.at(*activate)),
            KeygenMode::Successor {
                predecessor,
                prepublish,
            } => {
                let name = KeyFileName::parse(&format!("{predecessor}.key")).unwrap();
                let contents = fs::read_to_string(public_key_path(dir, predecessor)).unwrap();
                let predecessor = parse_public_key(&name, dir, &contents).unwrap();
                let activate = predecessor.inactivation;
                let publish = prepublish.map_or(now, |prepublish| {
                    (activate - TimeDelta::seconds(i64::try_from(prepublish).unwrap())).max(now)
                });
                (predecessor.algorithm, predecessor.ksk, publish, activate)
            }
        };

        let mut timing = vec![("Created", now), ("Publish", publish), ("Activate", activate)];
        for (label, deadline) in [
            ("Revoke", request.revoke),
            ("Inactive", request.inactivate),
            ("Delete", request.delete),
        ] {
            if let Some(seconds) = deadline {
                timing.push((label, self.after(seconds)));
            }
        }

        let key_tag = self.next_tag.get();
        self.next_tag.set(key_tag + 1);

        let base = write_key(dir, &request.zone, algorithm, key_tag, ksk, &timing);
        Ok(GeneratedKey::new(dir, &base))
    }
}
