// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for keyroll.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Time Constants
// ============================================================================

/// Seconds in a minute (`mi` duration unit)
pub const SECONDS_PER_MINUTE: u64 = 60;

/// Seconds in an hour (`h` duration unit)
pub const SECONDS_PER_HOUR: u64 = 3600;

/// Seconds in a day (`d` duration unit)
pub const SECONDS_PER_DAY: u64 = 86_400;

/// Seconds in a week (`w` duration unit)
pub const SECONDS_PER_WEEK: u64 = 604_800;

/// Seconds in a month (`mo` duration unit, fixed at 30 days)
pub const SECONDS_PER_MONTH: u64 = 2_592_000;

/// Seconds in a year (`y` duration unit, fixed at 365 days)
pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Unix time used when a key file carries no `Inactive:` or `Delete:` line.
///
/// This is the last instant representable as a signed 32-bit Unix time
/// (2038-01-19 03:14:07 UTC) and stands for "practically never".
pub const FAR_FUTURE_UNIX_SECS: i64 = i32::MAX as i64;

/// Precreate window used when neither `precreate` nor `prepublish` is configured (7 days)
pub const DEFAULT_PRECREATE_SECS: u64 = 604_800;

/// Factor applied to `prepublish` to derive the precreate window when `precreate` is unset
pub const PRECREATE_PREPUBLISH_FACTOR: u32 = 2;

// ============================================================================
// Key File Constants
// ============================================================================

/// Extension of the public half of a key pair
pub const PUBLIC_KEY_EXTENSION: &str = "key";

/// Extension of the private half of a key pair
pub const PRIVATE_KEY_EXTENSION: &str = "private";

/// Number of digits of the algorithm field in a key file name
pub const ALGORITHM_FIELD_WIDTH: usize = 3;

/// Number of digits of the key tag field in a key file name
pub const KEY_TAG_FIELD_WIDTH: usize = 5;

/// DNSKEY flag bit marking a key-signing key (Secure Entry Point)
pub const DNSKEY_FLAG_SEP: u16 = 0x0001;

/// Timestamp layout used by `dnssec-keygen` metadata comments
pub const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

// ============================================================================
// Key Generation Constants
// ============================================================================

/// Default key generation executable
pub const DEFAULT_KEYGEN_PATH: &str = "dnssec-keygen";

/// Default timeout for one key generation run (seconds)
pub const DEFAULT_KEYGEN_TIMEOUT_SECS: u64 = 60;

/// Default bit size for RSA family algorithms
pub const DEFAULT_RSA_BITS: u32 = 2048;

/// Default bit size for DSA family algorithms
pub const DEFAULT_DSA_BITS: u32 = 1024;

// ============================================================================
// Ownership Constants
// ============================================================================

/// User that owns generated key files
pub const DEFAULT_KEY_OWNER: &str = "bind";

/// Group that owns generated key files
pub const DEFAULT_KEY_GROUP: &str = "bind";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/keyroll/keyroll.yaml";

/// Default interval between convergence passes in `watch` mode
pub const DEFAULT_WATCH_INTERVAL: &str = "1h";

/// Namespace prefix for all keyroll metrics
pub const METRICS_NAMESPACE: &str = "keyroll";
