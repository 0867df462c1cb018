// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNSSEC algorithm numbers as used in key file names and DNSKEY records.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::{DEFAULT_DSA_BITS, DEFAULT_RSA_BITS};
use crate::errors::ConfigError;

/// Signing algorithm of a DNSSEC key.
///
/// Configuration uses the mnemonic (`RSASHA256`, `ECDSAP256SHA256`, ...).
/// Key files carry the numeric id; ids without a mnemonic parse to
/// [`Algorithm::Unknown`], which never matches a configured algorithm.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Algorithm {
    RsaMd5,
    Dh,
    Dsa,
    #[default]
    RsaSha1,
    Nsec3Dsa,
    Nsec3RsaSha1,
    RsaSha256,
    RsaSha512,
    EccGost,
    EcdsaP256Sha256,
    EcdsaP384Sha384,
    Ed25519,
    Ed448,
    HmacMd5,
    HmacSha1,
    HmacSha224,
    HmacSha256,
    HmacSha384,
    HmacSha512,
    /// An id found in a key file that has no known mnemonic
    Unknown(u8),
}

/// Every known algorithm with its id and mnemonic.
const ALGORITHMS: &[(Algorithm, u8, &str)] = &[
    (Algorithm::RsaMd5, 1, "RSAMD5"),
    (Algorithm::Dh, 2, "DH"),
    (Algorithm::Dsa, 3, "DSA"),
    (Algorithm::RsaSha1, 5, "RSASHA1"),
    (Algorithm::Nsec3Dsa, 6, "NSEC3DSA"),
    (Algorithm::Nsec3RsaSha1, 7, "NSEC3RSASHA1"),
    (Algorithm::RsaSha256, 8, "RSASHA256"),
    (Algorithm::RsaSha512, 10, "RSASHA512"),
    (Algorithm::EccGost, 12, "ECCGOST"),
    (Algorithm::EcdsaP256Sha256, 13, "ECDSAP256SHA256"),
    (Algorithm::EcdsaP384Sha384, 14, "ECDSAP384SHA384"),
    (Algorithm::Ed25519, 15, "ED25519"),
    (Algorithm::Ed448, 16, "ED448"),
    (Algorithm::HmacMd5, 157, "HMAC_MD5"),
    (Algorithm::HmacSha1, 161, "HMAC_SHA1"),
    (Algorithm::HmacSha224, 162, "HMAC_SHA224"),
    (Algorithm::HmacSha256, 163, "HMAC_SHA256"),
    (Algorithm::HmacSha384, 164, "HMAC_SHA384"),
    (Algorithm::HmacSha512, 165, "HMAC_SHA512"),
];

impl Algorithm {
    /// Map a numeric algorithm id to an algorithm.
    #[must_use]
    pub fn from_id(id: u8) -> Self {
        ALGORITHMS
            .iter()
            .find(|(_, known, _)| *known == id)
            .map_or(Algorithm::Unknown(id), |(algorithm, _, _)| *algorithm)
    }

    /// Numeric algorithm id.
    #[must_use]
    pub fn id(self) -> u8 {
        match self {
            Algorithm::Unknown(id) => id,
            known => ALGORITHMS
                .iter()
                .find(|(algorithm, _, _)| *algorithm == known)
                .map_or(0, |(_, id, _)| *id),
        }
    }

    /// Mnemonic as accepted by `dnssec-keygen -a`, or `UNKNOWN` for unmapped ids.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        ALGORITHMS
            .iter()
            .find(|(algorithm, _, _)| *algorithm == self)
            .map_or("UNKNOWN", |(_, _, name)| *name)
    }

    /// Key size used when the resource does not configure `bits`.
    ///
    /// RSA family keys default to 2048 bits and DSA family keys to 1024 bits.
    /// Elliptic curve and other algorithms have no size parameter.
    #[must_use]
    pub fn default_bits(self) -> Option<u32> {
        match self {
            Algorithm::Nsec3RsaSha1
            | Algorithm::RsaMd5
            | Algorithm::RsaSha1
            | Algorithm::RsaSha256
            | Algorithm::RsaSha512 => Some(DEFAULT_RSA_BITS),
            Algorithm::Dsa | Algorithm::Nsec3Dsa => Some(DEFAULT_DSA_BITS),
            _ => None,
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Unknown(id) => write!(f, "UNKNOWN({id})"),
            known => f.write_str(known.as_str()),
        }
    }
}

impl FromStr for Algorithm {
    type Err = ConfigError;

    /// Parse a mnemonic. Matching ignores case and treats `-` like `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        ALGORITHMS
            .iter()
            .find(|(_, _, name)| *name == normalized)
            .map(|(algorithm, _, _)| *algorithm)
            .ok_or_else(|| ConfigError::UnsupportedAlgorithm {
                algorithm: s.to_string(),
            })
    }
}

impl TryFrom<String> for Algorithm {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Algorithm> for String {
    fn from(value: Algorithm) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
#[path = "algorithm_tests.rs"]
mod algorithm_tests;
