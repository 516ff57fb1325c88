use rusqlite::Connection;
use testhub_core::error::StateError;
use tracing::info;

/// Current schema version. Bump this when adding a new migration step.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Create all required SQLite tables and run any pending migrations.
pub fn create_tables(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(SCHEMA_SQL).map_err(StateError::sqlite)?;
    migrate(conn)?;
    info!("SQLite schema created (version {})", CURRENT_SCHEMA_VERSION);
    Ok(())
}

/// Run incremental schema migrations up to `CURRENT_SCHEMA_VERSION`.
///
/// The `schema_migrations` table tracks which version has been applied.
pub fn migrate(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )
    .map_err(StateError::sqlite)?;

    let current = applied_version(conn)?;
    if current > CURRENT_SCHEMA_VERSION {
        return Err(StateError::SchemaMigrationRequired {
            current,
            required: CURRENT_SCHEMA_VERSION,
        });
    }

    type MigrationFn = fn(&Connection) -> Result<(), StateError>;

    let migrations: &[MigrationFn] = &[
        // V1: baseline, tables already created by SCHEMA_SQL
        |_conn| Ok(()),
        // V2: last_tested on test_case_commits for databases created before it existed.
        |conn| {
            let has_column: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM pragma_table_info('test_case_commits') WHERE name = 'last_tested'",
                    [],
                    |row| row.get(0),
                )
                .map_err(StateError::sqlite)?;
            if !has_column {
                conn.execute_batch("ALTER TABLE test_case_commits ADD COLUMN last_tested TEXT;")
                    .map_err(StateError::sqlite)?;
            }
            Ok(())
        },
    ];

    for version in (current + 1)..=CURRENT_SCHEMA_VERSION {
        let idx = (version - 1) as usize;
        if idx < migrations.len() {
            migrations[idx](conn)?;
        }
        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [version],
        )
        .map_err(StateError::sqlite)?;
        info!(version, "Applied schema migration");
    }

    Ok(())
}

/// Highest applied migration version, 0 for a fresh database.
pub fn applied_version(conn: &Connection) -> Result<u32, StateError> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
        [],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS commits (
    id INTEGER PRIMARY KEY,
    sha TEXT NOT NULL UNIQUE,
    short_sha TEXT NOT NULL UNIQUE,
    author TEXT NOT NULL,
    author_email TEXT NOT NULL,
    message TEXT NOT NULL,
    commit_time INTEGER NOT NULL,
    github_url TEXT,
    pull_request INTEGER NOT NULL DEFAULT 0,
    open INTEGER NOT NULL DEFAULT 0,
    test_case_count INTEGER NOT NULL DEFAULT 0,
    passed_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    mixed_count INTEGER NOT NULL DEFAULT 0,
    checksum_count INTEGER NOT NULL DEFAULT 0,
    untested_count INTEGER NOT NULL DEFAULT 0,
    computer_count INTEGER NOT NULL DEFAULT 0,
    complete_computer_count INTEGER NOT NULL DEFAULT 0,
    status INTEGER NOT NULL DEFAULT -1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_commits_commit_time ON commits(commit_time);
CREATE INDEX IF NOT EXISTS idx_commits_pull_request ON commits(pull_request, open);

CREATE TABLE IF NOT EXISTS branches (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    head_id INTEGER REFERENCES commits(id) ON DELETE SET NULL,
    merged INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS branch_memberships (
    id INTEGER PRIMARY KEY,
    branch_id INTEGER NOT NULL REFERENCES branches(id) ON DELETE CASCADE,
    commit_id INTEGER NOT NULL REFERENCES commits(id) ON DELETE CASCADE,
    position INTEGER,
    UNIQUE(branch_id, commit_id)
);

CREATE INDEX IF NOT EXISTS idx_branch_memberships_position
    ON branch_memberships(branch_id, position);
CREATE INDEX IF NOT EXISTS idx_branch_memberships_commit
    ON branch_memberships(commit_id);

CREATE TABLE IF NOT EXISTS test_cases (
    id INTEGER PRIMARY KEY,
    module TEXT NOT NULL,
    name TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE(module, name)
);

CREATE TABLE IF NOT EXISTS test_case_commits (
    id INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL REFERENCES commits(id) ON DELETE CASCADE,
    test_case_id INTEGER NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
    status INTEGER NOT NULL DEFAULT -1,
    passed_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    checksum_count INTEGER NOT NULL DEFAULT 0,
    computer_count INTEGER NOT NULL DEFAULT 0,
    last_tested TEXT,
    UNIQUE(commit_id, test_case_id)
);

CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY,
    commit_id INTEGER NOT NULL REFERENCES commits(id) ON DELETE CASCADE,
    computer TEXT NOT NULL,
    platform_version TEXT,
    sdk_version TEXT,
    math_backend TEXT,
    compiler TEXT,
    compiler_version TEXT,
    compiled INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_submissions_commit ON submissions(commit_id);

CREATE TABLE IF NOT EXISTS test_instances (
    id INTEGER PRIMARY KEY,
    test_case_commit_id INTEGER NOT NULL REFERENCES test_case_commits(id) ON DELETE CASCADE,
    submission_id INTEGER NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
    passed INTEGER NOT NULL,
    checksum TEXT,
    failure_type TEXT,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_test_instances_tcc ON test_instances(test_case_commit_id);
CREATE INDEX IF NOT EXISTS idx_test_instances_submission ON test_instances(submission_id);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use tempfile::tempdir;

    #[test]
    fn create_tables_is_idempotent() {
        let dir = tempdir().unwrap();
        let conn = db::open_connection(&dir.path().join("test.db")).unwrap();
        create_tables(&conn).unwrap();
        create_tables(&conn).unwrap();

        assert_eq!(applied_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
    }

    #[test]
    fn all_tables_exist() {
        let dir = tempdir().unwrap();
        let conn = db::open_connection(&dir.path().join("test.db")).unwrap();
        create_tables(&conn).unwrap();

        for table in [
            "commits",
            "branches",
            "branch_memberships",
            "test_cases",
            "test_case_commits",
            "submissions",
            "test_instances",
        ] {
            let exists: bool = conn
                .query_row(
                    "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert!(exists, "missing table {table}");
        }
    }

    #[test]
    fn newer_database_is_rejected() {
        let dir = tempdir().unwrap();
        let conn = db::open_connection(&dir.path().join("test.db")).unwrap();
        create_tables(&conn).unwrap();
        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [CURRENT_SCHEMA_VERSION + 5],
        )
        .unwrap();
        assert!(matches!(
            migrate(&conn),
            Err(StateError::SchemaMigrationRequired { .. })
        ));
    }
}
