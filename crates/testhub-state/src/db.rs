use rusqlite::Connection;
use std::path::Path;
use testhub_core::config::StorageConfig;
use testhub_core::error::StateError;
use tracing::info;

/// Tables reported by [`table_counts`], parents before children.
pub const TABLES: [&str; 7] = [
    "commits",
    "branches",
    "branch_memberships",
    "test_cases",
    "test_case_commits",
    "submissions",
    "test_instances",
];

/// Open the store with default storage settings.
pub fn open_connection(db_path: &Path) -> Result<Connection, StateError> {
    open_with_storage(db_path, &StorageConfig::default())
}

/// Open the store, creating parent directories, and apply the storage pragmas.
///
/// Foreign keys are switched on so deleting a commit cascades to its
/// memberships, test-case commits, submissions and instances.
pub fn open_with_storage(db_path: &Path, storage: &StorageConfig) -> Result<Connection, StateError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(db_path).map_err(StateError::sqlite)?;
    conn.execute_batch(&format!(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = {};
         PRAGMA cache_size = {};",
        storage.busy_timeout_ms, storage.cache_size
    ))
    .map_err(StateError::sqlite)?;

    info!(db = %db_path.display(), "Store opened");
    Ok(conn)
}

/// `PRAGMA quick_check`. `None` means healthy, otherwise the first problem reported.
pub fn quick_check(conn: &Connection) -> Result<Option<String>, StateError> {
    let result: String = conn
        .query_row("PRAGMA quick_check", [], |row| row.get(0))
        .map_err(StateError::sqlite)?;
    Ok((result != "ok").then_some(result))
}

/// Row count of every store table.
pub fn table_counts(conn: &Connection) -> Result<Vec<(&'static str, i64)>, StateError> {
    TABLES
        .iter()
        .map(|table| {
            conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })
            .map(|n| (*table, n))
            .map_err(StateError::sqlite)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use tempfile::tempdir;

    #[test]
    fn test_store_pragmas() {
        let dir = tempdir().unwrap();
        let storage = StorageConfig {
            busy_timeout_ms: 1500,
            ..StorageConfig::default()
        };
        let conn = open_with_storage(&dir.path().join("data/acme_stellar/state.db"), &storage).unwrap();

        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
        let timeout: i64 = conn
            .query_row("PRAGMA busy_timeout", [], |row| row.get(0))
            .unwrap();
        assert_eq!(timeout, 1500);
        assert_eq!(quick_check(&conn).unwrap(), None);
    }

    #[test]
    fn test_table_counts_on_fresh_store() {
        let dir = tempdir().unwrap();
        let conn = open_connection(&dir.path().join("state.db")).unwrap();
        schema::create_tables(&conn).unwrap();
        let counts = table_counts(&conn).unwrap();
        assert_eq!(counts.len(), TABLES.len());
        assert!(counts.iter().all(|(_, n)| *n == 0));
    }
}
