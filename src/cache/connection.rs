// src/cache/connection.rs
//
// Cache database connection management
//
// PRINCIPLES:
// - Explicit connection pooling
// - No hidden connection creation
// - Clear error propagation
// - Thread-safe access

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};

/// Type alias for connection pool
pub type ConnectionPool = Pool<SqliteConnectionManager>;

/// Type alias for a pooled connection
pub type PooledConn = PooledConnection<SqliteConnectionManager>;

/// Get the cache database file path
///
/// The cache is stored in the application data directory.
/// Path structure: {APP_DATA}/aniscout/cache.db
pub fn get_cache_db_path() -> AppResult<PathBuf> {
    let app_data_dir = dirs::data_dir()
        .ok_or_else(|| AppError::Other("Could not determine app data directory".to_string()))?;

    let aniscout_dir = app_data_dir.join("aniscout");

    // Ensure directory exists
    std::fs::create_dir_all(&aniscout_dir).map_err(AppError::Io)?;

    Ok(aniscout_dir.join("cache.db"))
}

/// Create a connection pool for the on-disk cache
///
/// Pool configuration:
/// - Max 8 connections (the cache is the only writer)
/// - SQLite in WAL mode for better concurrency
/// - Busy timeout set to avoid immediate errors
pub fn create_connection_pool() -> AppResult<ConnectionPool> {
    let db_path = get_cache_db_path()?;

    let manager = SqliteConnectionManager::file(&db_path).with_init(|conn| {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(8)
        .build(manager)
        .map_err(|e| AppError::Other(format!("Failed to create connection pool: {}", e)))?;

    Ok(pool)
}

/// Create an in-memory pool (for unit tests)
///
/// Capped at a single connection: every in-memory connection is its own
/// database, so a larger pool would hand out empty databases.
pub fn create_memory_pool() -> AppResult<ConnectionPool> {
    let manager = SqliteConnectionManager::memory();

    let pool = Pool::builder()
        .max_size(1)
        .build(manager)
        .map_err(|e| AppError::Other(format!("Failed to create in-memory pool: {}", e)))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_pool_works() {
        let pool = create_memory_pool().unwrap();
        let conn = pool.get().unwrap();

        let result: i32 = conn.query_row("SELECT 1 + 1", [], |row| row.get(0)).unwrap();
        assert_eq!(result, 2);
    }

    #[test]
    fn test_file_pool_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = SqliteConnectionManager::file(dir.path().join("cache.db"));
        let pool = Pool::builder().max_size(2).build(manager).unwrap();

        let conn = pool.get().unwrap();
        let result: i32 = conn.query_row("SELECT 2 + 2", [], |row| row.get(0)).unwrap();
        assert_eq!(result, 4);
    }
}
