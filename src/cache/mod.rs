// src/cache/mod.rs
//
// Cache module
//
// Provides:
// - Connection pooling for the cache database
// - Discriminated cache keys
// - The size-aware, expiring key-value store

pub mod connection;
pub mod key;
pub mod payload;
pub mod store;

pub use connection::{
    create_connection_pool, create_memory_pool, get_cache_db_path, ConnectionPool, PooledConn,
};

pub use key::CacheKey;

pub use payload::{CacheEnvelope, CachedPayload};

pub use store::{CacheConfig, CachePrefixStats, CacheStats, CacheStore};
