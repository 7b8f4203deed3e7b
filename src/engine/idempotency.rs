use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{OrdexError, Result};

/// Cached outcome of one execution attempt.
#[derive(Debug, Clone)]
pub struct IdempotencyRecord {
    pub key: String,
    pub user_id: i64,
    pub result: Value,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Deterministic dedup of execution requests.
///
/// A `check` hit returns the cached result instead of re-executing; an
/// expired record counts as a miss and is deleted lazily, so no background
/// sweep is required for correctness ([`IdempotencyGuard::sweep_expired`]
/// exists for space reclamation only).
pub struct IdempotencyGuard {
    records: DashMap<String, IdempotencyRecord>,
    default_ttl: Duration,
}

impl IdempotencyGuard {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            records: DashMap::new(),
            default_ttl,
        }
    }

    /// Derive a deterministic key from the operation inputs.
    ///
    /// Params are sorted by name before hashing so argument order never
    /// changes the key; the canonical encoding is hashed and truncated.
    pub fn key(user_id: i64, operation: &str, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let mut hasher = Sha256::new();
        for (name, value) in &sorted {
            hasher.update(name.as_bytes());
            hasher.update(b"=");
            hasher.update(value.as_bytes());
            hasher.update(b"\n");
        }
        let digest = hex::encode(hasher.finalize());

        format!("{}:{}:{}", user_id, operation, &digest[..16])
    }

    /// Look up a cached result for `key`.
    ///
    /// A hit whose record belongs to a different user is a fatal integrity
    /// error: the wrong user's cached result must never be returned.
    pub fn check(&self, key: &str, user_id: i64) -> Result<Option<IdempotencyRecord>> {
        let Some(record) = self.records.get(key).map(|r| r.clone()) else {
            return Ok(None);
        };

        if record.user_id != user_id {
            return Err(OrdexError::IdempotencyConflict {
                key: key.to_string(),
                record_user: record.user_id,
                caller_user: user_id,
            });
        }

        if record.expires_at <= Utc::now() {
            // Lazy expiry: treat as a miss, drop the stale record
            self.records.remove(key);
            debug!(key, "expired idempotency record removed on check");
            return Ok(None);
        }

        warn!(key, status = %record.status, "duplicate execution detected, returning cached result");
        Ok(Some(record))
    }

    /// Store (or overwrite) the result under `key`.
    ///
    /// Storing twice replaces the prior result and refreshes the expiry: the
    /// most recent terminal outcome wins, which matters when a retried
    /// execution ends with a different fill amount.
    pub fn store(
        &self,
        key: &str,
        user_id: i64,
        result: Value,
        status: &str,
        ttl: Option<Duration>,
    ) {
        let now = Utc::now();
        let record = IdempotencyRecord {
            key: key.to_string(),
            user_id,
            result,
            status: status.to_string(),
            created_at: now,
            expires_at: now + ttl.unwrap_or(self.default_ttl),
        };
        self.records.insert(key.to_string(), record);
        debug!(key, status, "idempotency record stored");
    }

    /// Periodic space reclamation; correctness never depends on it.
    pub fn sweep_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.records.len();
        self.records.retain(|_, record| record.expires_at > now);
        let removed = before - self.records.len();
        if removed > 0 {
            info!(removed, "swept expired idempotency records");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
