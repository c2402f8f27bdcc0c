// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! Idempotency deduplication for commands.
//!
//! Entries are keyed `"idem:" + command_id + ":" + user_key` and hold the
//! sha256 of the canonicalized user input next to the cached response.  A
//! replay with the same key and the same input returns the cached response;
//! the same key with different input is a conflict.

use async_trait::async_trait;
use fg_core::CommandResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Outcome of an idempotency pre-check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// No entry for this key.
    Miss,
    /// Same key, same input: replay the cached response.
    Hit(CommandResponse),
    /// Same key, different input.
    Conflict,
}

/// A deduplication store.
#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Check a key against the stored input hash.
    async fn check(&self, key: &str, input_hash: &str) -> CheckOutcome;

    /// Upsert an entry with a TTL.
    async fn store(&self, key: &str, input_hash: &str, response: &CommandResponse, ttl: Duration);
}

/// Build the full store key for a command execution.
pub fn entry_key(command_id: &str, user_key: &str) -> String {
    format!("idem:{command_id}:{user_key}")
}

/// Hex-encoded sha256 over the canonical JSON form of the user input.
///
/// Canonicalization sorts object keys recursively, so logically equal inputs
/// hash equally regardless of field order.
pub fn input_hash(input: &Map<String, Value>) -> String {
    let canonical = canonicalize(&Value::Object(input.clone()));
    let mut hasher = Sha256::new();
    hasher.update(canonical.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
            sorted.sort_by_key(|(k, _)| k.as_str());
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), canonicalize(v));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct MemoryEntry {
    input_hash: String,
    response: CommandResponse,
    expires_at: Instant,
}

/// TTL-map store for single-process deployments and tests.
#[derive(Default)]
pub struct MemoryIdempotencyStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryIdempotencyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (expired entries may still be counted until
    /// their next check).
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// `true` when no entries are stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl IdempotencyStore for MemoryIdempotencyStore {
    async fn check(&self, key: &str, input_hash: &str) -> CheckOutcome {
        // Lazy expiry: drop the entry on first sight past its deadline.
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return CheckOutcome::Miss,
                Some(entry) if entry.expires_at <= Instant::now() => true,
                Some(entry) if entry.input_hash == input_hash => {
                    return CheckOutcome::Hit(entry.response.clone());
                }
                Some(_) => return CheckOutcome::Conflict,
            }
        };
        if expired {
            self.entries.write().await.remove(key);
        }
        CheckOutcome::Miss
    }

    async fn store(&self, key: &str, input_hash: &str, response: &CommandResponse, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            MemoryEntry {
                input_hash: input_hash.to_string(),
                response: response.clone(),
                expires_at: Instant::now() + ttl,
            },
        );
    }
}

// ---------------------------------------------------------------------------
// Key-value-backed store
// ---------------------------------------------------------------------------

/// Minimal key-value contract a Redis (or similar) client implements.
///
/// Values are opaque JSON blobs; the backing store owns TTL enforcement.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a value; `None` when absent or expired.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: String, ttl: Duration);
}

/// Serialized entry format for [`KvIdempotencyStore`].
#[derive(Debug, Serialize, Deserialize)]
struct KvEntry {
    input_hash: String,
    response: CommandResponse,
}

/// Idempotency store over any [`KeyValueStore`].
pub struct KvIdempotencyStore<K> {
    kv: K,
}

impl<K: KeyValueStore> KvIdempotencyStore<K> {
    /// Wrap a key-value client.
    pub fn new(kv: K) -> Self {
        Self { kv }
    }
}

#[async_trait]
impl<K: KeyValueStore> IdempotencyStore for KvIdempotencyStore<K> {
    async fn check(&self, key: &str, input_hash: &str) -> CheckOutcome {
        let Some(raw) = self.kv.get(key).await else {
            return CheckOutcome::Miss;
        };
        let Ok(entry) = serde_json::from_str::<KvEntry>(&raw) else {
            tracing::warn!(key, "dropping undecodable idempotency entry");
            return CheckOutcome::Miss;
        };
        if entry.input_hash == input_hash {
            CheckOutcome::Hit(entry.response)
        } else {
            CheckOutcome::Conflict
        }
    }

    async fn store(&self, key: &str, input_hash: &str, response: &CommandResponse, ttl: Duration) {
        let entry = KvEntry {
            input_hash: input_hash.to_string(),
            response: response.clone(),
        };
        match serde_json::to_string(&entry) {
            Ok(raw) => self.kv.set(key, raw, ttl).await,
            Err(err) => tracing::warn!(key, error = %err, "failed to encode idempotency entry"),
        }
    }
}
