//! Decision cache for registry trust outcomes.
//!
//! Keyed by the trust-relevant identity of the evidence, never by request
//! content, so unrelated requests under the same delegation share an entry.
//! Entries are whole values returned by the registry; concurrent misses for
//! the same key resolve last-write-wins.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use ishare_pep_sdk::DelegationMask;
use sha2::{Digest, Sha256};

/// Cache key derived from a delegation mask.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrustKey {
    pub policy_issuer: String,
    pub access_subject: String,
    /// Hex SHA-256 of the serialized mask.
    pub mask_fingerprint: String,
}

impl TrustKey {
    /// Derive the key for a mask.
    ///
    /// # Errors
    ///
    /// Returns an error if the mask cannot be serialized.
    pub fn for_mask(mask: &DelegationMask) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(mask)?;
        Ok(Self {
            policy_issuer: mask.policy_issuer().to_owned(),
            access_subject: mask.access_subject().to_owned(),
            mask_fingerprint: hex::encode(Sha256::digest(&bytes)),
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct CacheEntry {
    trusted: bool,
    expires_at: Instant,
}

/// TTL-bounded map from [`TrustKey`] to a trust outcome.
///
/// A zero TTL disables caching: nothing is stored and every lookup misses.
#[derive(Debug)]
pub struct DecisionCache {
    entries: DashMap<TrustKey, CacheEntry>,
    ttl: Duration,
}

impl DecisionCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached outcome for `key`, if present and unexpired.
    #[must_use]
    pub fn get(&self, key: &TrustKey) -> Option<bool> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if now < entry.expires_at {
                return Some(entry.trusted);
            }
        }
        self.entries.remove_if(key, |_, entry| entry.expires_at <= now);
        None
    }

    /// Store an outcome returned by the registry.
    pub fn insert(&self, key: TrustKey, trusted: bool) {
        if self.ttl.is_zero() {
            return;
        }
        let now = Instant::now();
        let Some(expires_at) = now.checked_add(self.ttl) else {
            return;
        };
        self.entries.insert(
            key,
            CacheEntry {
                trusted,
                expires_at,
            },
        );
    }

    /// Drop every entry. In-flight lookups are unaffected beyond missing next time.
    pub fn flush(&self) {
        self.entries.clear();
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| entry.expires_at > now);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
