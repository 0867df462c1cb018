// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Ownership of generated key files.
//!
//! `dnssec-keygen` creates files owned by whoever runs it, usually root. The
//! name server must be able to read the private key, so generated key pairs
//! are handed to the configured service account. Existing keys are handed
//! over again on every pass, which repairs a `chown` that failed after
//! generation.

use std::ffi::CString;
use std::path::Path;
use tracing::debug;

use crate::errors::OwnershipError;
use crate::keygen::GeneratedKey;

/// The user and group generated key files are handed to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyOwnership {
    pub user: String,
    pub group: String,
}

impl KeyOwnership {
    #[must_use]
    pub fn new(user: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            group: group.into(),
        }
    }

    /// Ownership from the optional settings values; `None` unless both are set.
    #[must_use]
    pub fn from_settings(user: Option<&str>, group: Option<&str>) -> Option<Self> {
        match (user, group) {
            (Some(user), Some(group)) => Some(Self::new(user, group)),
            _ => None,
        }
    }

    /// Look up the numeric user and group ids.
    ///
    /// # Errors
    ///
    /// Returns [`OwnershipError::UnknownUser`] or [`OwnershipError::UnknownGroup`]
    /// if a name does not resolve.
    pub fn resolve(&self) -> Result<(libc::uid_t, libc::gid_t), OwnershipError> {
        let unknown_user = || OwnershipError::UnknownUser {
            user: self.user.clone(),
        };
        let unknown_group = || OwnershipError::UnknownGroup {
            group: self.group.clone(),
        };

        let user = CString::new(self.user.as_str()).map_err(|_| unknown_user())?;
        let group = CString::new(self.group.as_str()).map_err(|_| unknown_group())?;

        // Both calls take NUL-terminated names and return NULL when the
        // entry does not exist. The returned structs live in static storage,
        // so the ids are copied out immediately.
        let uid = unsafe {
            let passwd = libc::getpwnam(user.as_ptr());
            if passwd.is_null() {
                return Err(unknown_user());
            }
            (*passwd).pw_uid
        };
        let gid = unsafe {
            let entry = libc::getgrnam(group.as_ptr());
            if entry.is_null() {
                return Err(unknown_group());
            }
            (*entry).gr_gid
        };

        Ok((uid, gid))
    }

    /// Hand both files of `key` to this user and group.
    ///
    /// # Errors
    ///
    /// Returns an [`OwnershipError`] if a name does not resolve or `chown` fails.
    pub fn apply(&self, key: &GeneratedKey) -> Result<(), OwnershipError> {
        let (uid, gid) = self.resolve()?;
        for path in [&key.public_path, &key.private_path] {
            self.chown(path, uid, gid)?;
        }
        Ok(())
    }

    /// Hand every file among `paths` that exists to this user and group.
    ///
    /// # Errors
    ///
    /// Returns an [`OwnershipError`] if a name does not resolve or `chown` fails.
    pub fn apply_existing<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a Path>,
    ) -> Result<(), OwnershipError> {
        let (uid, gid) = self.resolve()?;
        for path in paths.into_iter().filter(|path| path.exists()) {
            self.chown(path, uid, gid)?;
        }
        Ok(())
    }

    fn chown(&self, path: &Path, uid: libc::uid_t, gid: libc::gid_t) -> Result<(), OwnershipError> {
        debug!(
            "Changing ownership of {} to {}:{}",
            path.display(),
            self.user,
            self.group
        );
        std::os::unix::fs::chown(path, Some(uid), Some(gid)).map_err(|source| {
            OwnershipError::Chown {
                path: path.to_path_buf(),
                user: self.user.clone(),
                group: self.group.clone(),
                source,
            }
        })
    }
}

#[cfg(test)]
#[path = "ownership_tests.rs"]
mod ownership_tests;
