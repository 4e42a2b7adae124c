// src/fingerprint.rs

//! Content fingerprints for change detection and cache addressing.
//!
//! Two algorithms, picked per use case:
//!
//! | Use case | Algorithm | Why |
//! |----------|-----------|-----|
//! | Manifest fingerprints | SHA-256 | stable across releases, collision-safe |
//! | Source-cache keys | XXH128 | fast, deduplication only |
//!
//! A [`Fingerprint`] over several files is order-independent: the per-file
//! digests are paired with their file names, sorted, and digested again, so a
//! re-scan that visits files in a different order produces the same value.

use sha2::{Digest, Sha256};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128;

/// A hex-encoded SHA-256 fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a single byte buffer.
    pub fn of_bytes(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Fingerprint(hex::encode(hasher.finalize()))
    }

    /// Combined fingerprint over a set of named byte buffers.
    ///
    /// Order-independent: `(name, bytes)` pairs hash to the same value in any
    /// iteration order. Names participate so a byte-identical file moving to a
    /// different slot still counts as a change.
    pub fn combined<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        let mut digests: Vec<(String, String)> = parts
            .into_iter()
            .map(|(name, bytes)| (name.to_string(), Self::of_bytes(bytes).into_hex()))
            .collect();
        digests.sort();

        let mut outer = Sha256::new();
        for (name, digest) in &digests {
            outer.update(name.as_bytes());
            outer.update(b"\0");
            outer.update(digest.as_bytes());
            outer.update(b"\0");
        }
        Fingerprint(hex::encode(outer.finalize()))
    }

    /// Re-wrap a stored hex value without recomputation.
    ///
    /// Accepts whatever was persisted; comparison is string equality, so a
    /// malformed stored value simply never matches.
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into().to_lowercase())
    }

    #[inline]
    pub fn as_hex(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn into_hex(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Short non-cryptographic digest for cache directory naming.
pub fn cache_key(data: &[u8]) -> String {
    format!("{:032x}", xxh3_128(data))
}
