// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Key generation.
//!
//! Key material is never produced here. [`KeyGenerator`] is the seam between
//! the rollover logic and whatever creates key pairs; [`DnssecKeygen`] runs
//! BIND's `dnssec-keygen` with a bounded run time. Tests substitute their
//! own generator.
//!
//! Generation is synchronous for callers. `DnssecKeygen` drives the child
//! process on its own current-thread runtime, so it must not be called from
//! inside an async task; use `spawn_blocking` there.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::constants::{DEFAULT_KEYGEN_PATH, DEFAULT_KEYGEN_TIMEOUT_SECS};
use crate::errors::KeygenError;
use crate::keyfile::{private_key_path, public_key_path};
use crate::rollover::KeygenRequest;

/// The key pair produced by a generator.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedKey {
    /// Base name printed by the generator, e.g. `Kexample.com.+008+24680`
    pub base: String,
    pub public_path: PathBuf,
    pub private_path: PathBuf,
}

impl GeneratedKey {
    #[must_use]
    pub fn new(key_directory: &Path, base: &str) -> Self {
        Self {
            base: base.to_string(),
            public_path: public_key_path(key_directory, base),
            private_path: private_key_path(key_directory, base),
        }
    }
}

/// Something that can create a key pair in a key directory.
pub trait KeyGenerator {
    /// Create one key pair as described by `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`KeygenError`] if no key pair was created.
    fn generate(&self, request: &KeygenRequest) -> Result<GeneratedKey, KeygenError>;
}

/// Runs `dnssec-keygen`.
#[derive(Clone, Debug)]
pub struct DnssecKeygen {
    program: PathBuf,
    timeout: Duration,
}

impl Default for DnssecKeygen {
    fn default() -> Self {
        Self::new(
            PathBuf::from(DEFAULT_KEYGEN_PATH),
            Duration::from_secs(DEFAULT_KEYGEN_TIMEOUT_SECS),
        )
    }
}

impl DnssecKeygen {
    #[must_use]
    pub fn new(program: PathBuf, timeout: Duration) -> Self {
        Self { program, timeout }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }

    fn spawn_error(&self, source: std::io::Error) -> KeygenError {
        KeygenError::Spawn {
            program: self.program_name(),
            source,
        }
    }

    /// Run the program, killing it if it outlives the timeout.
    async fn run(&self, args: &[String]) -> Result<Output, KeygenError> {
        let child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| self.spawn_error(source))?;

        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|source| self.spawn_error(source)),
            Err(_) => {
                // Dropping the wait future drops the child, which kills it
                warn!(
                    "{} did not finish within {:?}, killing it",
                    self.program_name(),
                    self.timeout
                );
                Err(KeygenError::Timeout {
                    program: self.program_name(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

impl KeyGenerator for DnssecKeygen {
    fn generate(&self, request: &KeygenRequest) -> Result<GeneratedKey, KeygenError> {
        let args = request.to_args();
        debug!("Running {} {}", self.program_name(), args.join(" "));

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| self.spawn_error(source))?;
        let output = runtime.block_on(self.run(&args))?;

        if !output.status.success() {
            return Err(KeygenError::Failed {
                program: self.program_name(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let base = parse_keygen_output(&stdout).ok_or_else(|| KeygenError::EmptyOutput {
            program: self.program_name(),
        })?;

        Ok(GeneratedKey::new(&request.key_directory, &base))
    }
}

/// The key base name printed by `dnssec-keygen`: its last non-empty line.
#[must_use]
pub fn parse_keygen_output(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .last()
        .map(str::to_string)
}

#[cfg(test)]
#[path = "keygen_tests.rs"]
mod keygen_tests;
