use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use testhub_core::error::StateError;
use testhub_core::time::now_iso8601;
use testhub_core::types::{TestCase, TestCaseCommit, TestStatus};

const TCC_COLUMNS: &str = "tcc.id, tcc.commit_id, tcc.test_case_id, tcc.status, tcc.passed_count, tcc.failed_count, tcc.checksum_count, tcc.computer_count, tcc.last_tested";

fn row_to_test_case_commit(row: &rusqlite::Row) -> rusqlite::Result<TestCaseCommit> {
    let status: i64 = row.get(3)?;
    Ok(TestCaseCommit {
        id: row.get(0)?,
        commit_id: row.get(1)?,
        test_case_id: row.get(2)?,
        status: TestStatus::from_code(status).unwrap_or(TestStatus::Untested),
        passed_count: row.get(4)?,
        failed_count: row.get(5)?,
        checksum_count: row.get(6)?,
        computer_count: row.get(7)?,
        last_tested: row.get(8)?,
    })
}

/// A test-case commit joined with its catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestCaseCommitEntry {
    pub module: String,
    pub name: String,
    #[serde(flatten)]
    pub outcome: TestCaseCommit,
}

/// Counts of a commit's test-case commits, grouped the way the commit rollup needs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub total: i64,
    /// Passing or checksum-mismatch-only.
    pub passed: i64,
    pub failed: i64,
    pub mixed: i64,
    pub untested: i64,
    /// Test-case commits that saw more than one distinct checksum.
    pub checksum: i64,
}

/// Find or create a catalog entry, returning its id.
pub fn ensure_test_case(conn: &Connection, module: &str, name: &str) -> Result<i64, StateError> {
    conn.execute(
        "INSERT INTO test_cases (module, name, created_at) VALUES (?1, ?2, ?3)
         ON CONFLICT(module, name) DO NOTHING",
        params![module, name, now_iso8601()],
    )
    .map_err(StateError::sqlite)?;
    conn.query_row(
        "SELECT id FROM test_cases WHERE module = ?1 AND name = ?2",
        params![module, name],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

/// Catalog entries, optionally limited to one module, ordered by module then name.
pub fn catalog(conn: &Connection, module: Option<&str>) -> Result<Vec<TestCase>, StateError> {
    let mut stmt = conn
        .prepare(
            "SELECT id, module, name FROM test_cases
             WHERE (?1 IS NULL OR module = ?1)
             ORDER BY module, name",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![module], |row| {
            Ok(TestCase {
                id: row.get(0)?,
                module: row.get(1)?,
                name: row.get(2)?,
            })
        })
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Insert untested rows for each test case at a commit, skipping existing pairs.
pub fn insert_test_case_commits(
    conn: &Connection,
    commit_id: i64,
    test_case_ids: &[i64],
) -> Result<usize, StateError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO test_case_commits (commit_id, test_case_id, status)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(commit_id, test_case_id) DO NOTHING",
        )
        .map_err(StateError::sqlite)?;
    let mut inserted = 0;
    for test_case_id in test_case_ids {
        inserted += stmt
            .execute(params![commit_id, test_case_id, TestStatus::Untested.code()])
            .map_err(StateError::sqlite)?;
    }
    Ok(inserted)
}

/// Find or create the row for one `(commit, test case)` pair, returning its id.
pub fn ensure_test_case_commit(
    conn: &Connection,
    commit_id: i64,
    test_case_id: i64,
) -> Result<i64, StateError> {
    insert_test_case_commits(conn, commit_id, &[test_case_id])?;
    conn.query_row(
        "SELECT id FROM test_case_commits WHERE commit_id = ?1 AND test_case_id = ?2",
        params![commit_id, test_case_id],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

pub fn get_test_case_commit(
    conn: &Connection,
    id: i64,
) -> Result<Option<TestCaseCommit>, StateError> {
    let sql = format!("SELECT {TCC_COLUMNS} FROM test_case_commits tcc WHERE tcc.id = ?1");
    conn.query_row(&sql, params![id], row_to_test_case_commit)
        .optional()
        .map_err(StateError::sqlite)
}

/// Every test-case commit of a commit with its module and name.
pub fn list_for_commit(
    conn: &Connection,
    commit_id: i64,
) -> Result<Vec<TestCaseCommitEntry>, StateError> {
    let sql = format!(
        "SELECT {TCC_COLUMNS}, tc.module, tc.name FROM test_case_commits tcc
         JOIN test_cases tc ON tc.id = tcc.test_case_id
         WHERE tcc.commit_id = ?1
         ORDER BY tc.module, tc.name"
    );
    let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![commit_id], |row| {
            Ok(TestCaseCommitEntry {
                outcome: row_to_test_case_commit(row)?,
                module: row.get(9)?,
                name: row.get(10)?,
            })
        })
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Persist the derived fields of a test-case commit.
pub fn update_test_case_commit_counts(
    conn: &Connection,
    outcome: &TestCaseCommit,
) -> Result<(), StateError> {
    conn.execute(
        "UPDATE test_case_commits SET status = ?2, passed_count = ?3, failed_count = ?4,
           checksum_count = ?5, computer_count = ?6, last_tested = ?7
         WHERE id = ?1",
        params![
            outcome.id,
            outcome.status.code(),
            outcome.passed_count,
            outcome.failed_count,
            outcome.checksum_count,
            outcome.computer_count,
            outcome.last_tested,
        ],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

pub fn count_for_commit(conn: &Connection, commit_id: i64) -> Result<i64, StateError> {
    conn.query_row(
        "SELECT COUNT(*) FROM test_case_commits WHERE commit_id = ?1",
        params![commit_id],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

/// Tally a commit's test-case commit statuses in one pass.
pub fn status_tally(conn: &Connection, commit_id: i64) -> Result<StatusTally, StateError> {
    conn.query_row(
        "SELECT COUNT(*),
                COALESCE(SUM(status IN (0, 2)), 0),
                COALESCE(SUM(status = 1), 0),
                COALESCE(SUM(status = 3), 0),
                COALESCE(SUM(status = -1), 0),
                COALESCE(SUM(checksum_count NOT IN (0, 1)), 0)
         FROM test_case_commits WHERE commit_id = ?1",
        params![commit_id],
        |row| {
            Ok(StatusTally {
                total: row.get(0)?,
                passed: row.get(1)?,
                failed: row.get(2)?,
                mixed: row.get(3)?,
                untested: row.get(4)?,
                checksum: row.get(5)?,
            })
        },
    )
    .map_err(StateError::sqlite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commits::{self, tests::sample_commit, tests::setup_test_db};

    #[test]
    fn test_catalog_is_unique_per_module() {
        let (_dir, conn) = setup_test_db();
        let a = ensure_test_case(&conn, "star", "1M_pre_ms_to_core_he").unwrap();
        let b = ensure_test_case(&conn, "star", "1M_pre_ms_to_core_he").unwrap();
        let c = ensure_test_case(&conn, "binary", "1M_pre_ms_to_core_he").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);

        assert_eq!(catalog(&conn, None).unwrap().len(), 2);
        let star = catalog(&conn, Some("star")).unwrap();
        assert_eq!(star.len(), 1);
        assert_eq!(star[0].module, "star");
    }

    #[test]
    fn test_insert_test_case_commits_is_idempotent() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("abcdef01", 1)]).unwrap()[0];
        let ids = vec![
            ensure_test_case(&conn, "star", "a").unwrap(),
            ensure_test_case(&conn, "star", "b").unwrap(),
        ];
        assert_eq!(insert_test_case_commits(&conn, commit_id, &ids).unwrap(), 2);
        assert_eq!(insert_test_case_commits(&conn, commit_id, &ids).unwrap(), 0);
        assert_eq!(count_for_commit(&conn, commit_id).unwrap(), 2);

        let tcc_id = ensure_test_case_commit(&conn, commit_id, ids[0]).unwrap();
        let tcc = get_test_case_commit(&conn, tcc_id).unwrap().unwrap();
        assert_eq!(tcc.status, TestStatus::Untested);
        assert_eq!(count_for_commit(&conn, commit_id).unwrap(), 2);
    }

    #[test]
    fn test_list_and_tally() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("abcdef02", 1)]).unwrap()[0];
        let names = ["a", "b", "c", "d", "e"];
        let ids: Vec<i64> = names
            .iter()
            .map(|n| ensure_test_case(&conn, "star", n).unwrap())
            .collect();
        insert_test_case_commits(&conn, commit_id, &ids).unwrap();

        let entries = list_for_commit(&conn, commit_id).unwrap();
        assert_eq!(entries.len(), 5);
        assert_eq!(entries[0].name, "a");

        let statuses = [
            (TestStatus::Passing, 1),
            (TestStatus::ChecksumMismatch, 2),
            (TestStatus::Failing, 1),
            (TestStatus::Mixed, 1),
        ];
        for (entry, (status, checksums)) in entries.iter().zip(statuses) {
            let mut outcome = entry.outcome.clone();
            outcome.status = status;
            outcome.checksum_count = checksums;
            update_test_case_commit_counts(&conn, &outcome).unwrap();
        }

        let tally = status_tally(&conn, commit_id).unwrap();
        assert_eq!(
            tally,
            StatusTally {
                total: 5,
                passed: 2,
                failed: 1,
                mixed: 1,
                untested: 1,
                checksum: 1,
            }
        );
    }
}
