// src/cache/store.rs
//
// Size-aware, expiring key-value store over SQLite
//
// RULES:
// - Errors never escape this boundary: every failure path degrades to a
//   cache miss (read) or a dropped write (write), logged and swallowed
// - Entries expire 24h after storage; expired entries are deleted on the
//   next read, not proactively swept
// - Writes that exceed the per-entry ceiling fall back to a reduced
//   payload; writes that exceed the total budget evict the oldest slice
//   of the same key namespace and retry once
// - Eviction never crosses key namespaces

use std::sync::Arc;

use chrono::Utc;
use log::{debug, warn};
use rusqlite::params;

use crate::cache::connection::{ConnectionPool, PooledConn};
use crate::cache::key::CacheKey;
use crate::cache::payload::{CacheEnvelope, CachedPayload};
use crate::error::{AppError, AppResult};

/// Marker used internally to route budget overruns into the quota path
const QUOTA_EXCEEDED: &str = "cache quota exceeded";

/// Tunables for the cache store. Defaults mirror the constraints of a
/// browser-profile-sized cache: 24h TTL, ~50KB entries, ~5MB total.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Entry lifetime in milliseconds
    pub ttl_ms: i64,

    /// Per-entry ceiling on the serialized payload, in bytes
    pub max_entry_bytes: usize,

    /// Total budget across all entries, in bytes
    pub max_total_bytes: u64,

    /// Share of same-prefix entries evicted when the budget is exceeded
    pub eviction_fraction: f64,

    /// Nested-list cap applied by payload reduction
    pub max_list_items: usize,

    /// Provenance cap applied by payload reduction
    pub max_contributing_items: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 24 * 60 * 60 * 1000,
            max_entry_bytes: 50 * 1024,
            max_total_bytes: 5 * 1024 * 1024,
            eviction_fraction: 0.25,
            max_list_items: 25,
            max_contributing_items: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CachePrefixStats {
    pub prefix: String,
    pub entry_count: u64,
    pub total_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct CacheStats {
    pub entry_count: u64,
    pub total_bytes: u64,
    pub prefixes: Vec<CachePrefixStats>,
}

/// The durable cache. The only persistence layer in the system.
pub struct CacheStore {
    pool: Arc<ConnectionPool>,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self::with_config(pool, CacheConfig::default())
    }

    pub fn with_config(pool: Arc<ConnectionPool>, config: CacheConfig) -> Self {
        Self { pool, config }
    }

    /// Create the backing table (idempotent)
    pub fn initialize(&self) -> AppResult<()> {
        let conn = self.pool.get()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS cache_entries (
                cache_key TEXT PRIMARY KEY,
                prefix    TEXT NOT NULL,
                payload   TEXT NOT NULL,
                stored_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_cache_entries_prefix_age
                ON cache_entries (prefix, stored_at);",
        )?;
        Ok(())
    }

    // ========================================================================
    // PUBLIC API (never fails past this boundary)
    // ========================================================================

    /// Store a payload under a key. Failures are logged and swallowed; the
    /// worst outcome is that the next read falls back to the source.
    pub fn save(&self, key: &CacheKey, payload: &CachedPayload) {
        if let Err(e) = self.save_at(key, payload, Self::now_ms()) {
            debug!("cache save failed for {}: {}", key.storage_key(), e);
        }
    }

    /// Look up a payload. Expired, corrupt, and type-mismatched entries are
    /// deleted and reported as a miss.
    pub fn load(&self, key: &CacheKey) -> Option<CachedPayload> {
        match self.load_at(key, Self::now_ms()) {
            Ok(hit) => hit,
            Err(e) => {
                debug!("cache load failed for {}: {}", key.storage_key(), e);
                None
            }
        }
    }

    pub fn remove(&self, key: &CacheKey) {
        let result = self
            .pool
            .get()
            .map_err(AppError::from)
            .and_then(|conn| self.delete_key(&conn, key));
        if let Err(e) = result {
            debug!("cache remove failed for {}: {}", key.storage_key(), e);
        }
    }

    /// Delete everything past the TTL. Returns the number of rows removed;
    /// entries with a missing timestamp count as oldest and are removed too.
    pub fn purge_expired(&self) -> usize {
        let cutoff = Self::now_ms() - self.config.ttl_ms;
        let purged = self.pool.get().map_err(AppError::from).and_then(|conn| {
            conn.execute(
                "DELETE FROM cache_entries WHERE COALESCE(stored_at, 0) <= ?1",
                params![cutoff],
            )
            .map_err(AppError::from)
        });
        match purged {
            Ok(n) => n,
            Err(e) => {
                debug!("cache purge failed: {}", e);
                0
            }
        }
    }

    /// Entry counts and payload bytes, overall and per key namespace
    pub fn stats(&self) -> AppResult<CacheStats> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT prefix, COUNT(*), COALESCE(SUM(LENGTH(payload)), 0)
             FROM cache_entries GROUP BY prefix ORDER BY prefix",
        )?;

        let prefixes: Vec<CachePrefixStats> = stmt
            .query_map([], |row| {
                Ok(CachePrefixStats {
                    prefix: row.get(0)?,
                    entry_count: row.get::<_, i64>(1)? as u64,
                    total_bytes: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CacheStats {
            entry_count: prefixes.iter().map(|p| p.entry_count).sum(),
            total_bytes: prefixes.iter().map(|p| p.total_bytes).sum(),
            prefixes,
        })
    }

    // ========================================================================
    // WRITE PATH
    // ========================================================================

    fn save_at(&self, key: &CacheKey, payload: &CachedPayload, now_ms: i64) -> AppResult<()> {
        // Shape validation: a payload that does not match the key's type is
        // a caller bug; refusing the write is safer than poisoning a read.
        if !key.matches_payload(payload) {
            warn!(
                "refusing to cache {} payload under key {}",
                payload.kind(),
                key.storage_key()
            );
            return Ok(());
        }

        let full_body = Self::encode_payload(&CacheEnvelope {
            timestamp: now_ms,
            data: payload.clone(),
        })?;

        let (body, already_reduced) = if full_body.len() > self.config.max_entry_bytes {
            let reduced_body = self.encode_reduced(payload, now_ms)?;
            if reduced_body.len() > self.config.max_entry_bytes {
                debug!(
                    "cache entry {} too large even reduced ({} bytes), skipping",
                    key.storage_key(),
                    reduced_body.len()
                );
                return Ok(());
            }
            (reduced_body, true)
        } else {
            (full_body, false)
        };

        match self.try_write(key, &body, now_ms) {
            Ok(()) => Ok(()),
            Err(e) if Self::is_quota_error(&e) => {
                let evicted = self.evict_oldest(key.prefix())?;
                warn!(
                    "cache quota hit writing {}, evicted {} oldest '{}' entries",
                    key.storage_key(),
                    evicted,
                    key.prefix()
                );

                let retry_body = if already_reduced {
                    body
                } else {
                    self.encode_reduced(payload, now_ms)?
                };

                if let Err(e) = self.try_write(key, &retry_body, now_ms) {
                    warn!("cache write dropped for {}: {}", key.storage_key(), e);
                }
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn encode_reduced(&self, payload: &CachedPayload, now_ms: i64) -> AppResult<String> {
        let reduced = payload.reduced(self.config.max_list_items, self.config.max_contributing_items);
        Self::encode_payload(&CacheEnvelope {
            timestamp: now_ms,
            data: reduced,
        })
    }

    fn try_write(&self, key: &CacheKey, body: &str, now_ms: i64) -> AppResult<()> {
        let conn = self.pool.get()?;

        // Budget check. Replacing an existing entry only counts the delta.
        let existing = self.entry_bytes(&conn, key)?;
        let total = self.total_bytes(&conn)?;
        if total - existing + body.len() as u64 > self.config.max_total_bytes {
            return Err(AppError::Other(QUOTA_EXCEEDED.to_string()));
        }

        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (cache_key, prefix, payload, stored_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![key.storage_key(), key.prefix(), body, now_ms],
        )?;
        Ok(())
    }

    fn is_quota_error(error: &AppError) -> bool {
        match error {
            AppError::Other(msg) => msg == QUOTA_EXCEEDED,
            AppError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
                e.code == rusqlite::ErrorCode::DiskFull
            }
            _ => false,
        }
    }

    /// Evict the oldest slice of entries sharing a prefix. Entries with a
    /// missing timestamp sort first, so unparsable ages go before anything
    /// with a known age. Other prefixes are never touched.
    fn evict_oldest(&self, prefix: &str) -> AppResult<usize> {
        let conn = self.pool.get()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE prefix = ?1",
            params![prefix],
            |row| row.get(0),
        )?;
        if count == 0 {
            return Ok(0);
        }

        let to_evict = ((count as f64) * self.config.eviction_fraction).ceil() as i64;
        let affected = conn.execute(
            "DELETE FROM cache_entries WHERE cache_key IN (
                SELECT cache_key FROM cache_entries
                WHERE prefix = ?1
                ORDER BY COALESCE(stored_at, 0) ASC
                LIMIT ?2
            )",
            params![prefix, to_evict],
        )?;
        Ok(affected)
    }

    // ========================================================================
    // READ PATH
    // ========================================================================

    fn load_at(&self, key: &CacheKey, now_ms: i64) -> AppResult<Option<CachedPayload>> {
        let conn = self.pool.get()?;

        let body = match conn.query_row(
            "SELECT payload FROM cache_entries WHERE cache_key = ?1",
            params![key.storage_key()],
            |row| row.get::<_, String>(0),
        ) {
            Ok(body) => body,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(AppError::Database(e)),
        };

        let envelope = match Self::decode_payload(&body) {
            Ok(envelope) => envelope,
            Err(e) => {
                debug!(
                    "corrupt cache entry {}, deleting: {}",
                    key.storage_key(),
                    e
                );
                self.delete_key(&conn, key)?;
                return Ok(None);
            }
        };

        if now_ms - envelope.timestamp >= self.config.ttl_ms {
            self.delete_key(&conn, key)?;
            return Ok(None);
        }

        // A mismatched type is corruption, never handed back to the caller
        if !key.matches_payload(&envelope.data) {
            warn!(
                "cache entry {} holds a {} payload, deleting",
                key.storage_key(),
                envelope.data.kind()
            );
            self.delete_key(&conn, key)?;
            return Ok(None);
        }

        Ok(Some(envelope.data))
    }

    fn delete_key(&self, conn: &PooledConn, key: &CacheKey) -> AppResult<()> {
        conn.execute(
            "DELETE FROM cache_entries WHERE cache_key = ?1",
            params![key.storage_key()],
        )?;
        Ok(())
    }

    fn entry_bytes(&self, conn: &PooledConn, key: &CacheKey) -> AppResult<u64> {
        let bytes: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM cache_entries WHERE cache_key = ?1",
            params![key.storage_key()],
            |row| row.get(0),
        )?;
        Ok(bytes as u64)
    }

    fn total_bytes(&self, conn: &PooledConn) -> AppResult<u64> {
        let bytes: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(payload)), 0) FROM cache_entries",
            [],
            |row| row.get(0),
        )?;
        Ok(bytes as u64)
    }

    // ========================================================================
    // ENCODING SEAM
    // ========================================================================

    // Payloads are stored as plain JSON text. These two functions are the
    // seam where a real compression codec would slot in; today they are an
    // explicit pass-through.

    fn encode_payload(envelope: &CacheEnvelope) -> AppResult<String> {
        Ok(serde_json::to_string(envelope)?)
    }

    fn decode_payload(body: &str) -> AppResult<CacheEnvelope> {
        Ok(serde_json::from_str(body)?)
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }
}

// ============================================================================
// TESTS
// ============================================================================
