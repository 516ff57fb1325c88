use rusqlite::{Connection, params};
use testhub_core::error::StateError;
use testhub_core::time::now_iso8601;
use testhub_core::types::{NewTestInstance, TestInstance};

pub fn insert_instance(
    conn: &Connection,
    test_case_commit_id: i64,
    submission_id: i64,
    instance: &NewTestInstance,
) -> Result<i64, StateError> {
    conn.execute(
        "INSERT INTO test_instances (test_case_commit_id, submission_id, passed, checksum, failure_type, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            test_case_commit_id,
            submission_id,
            instance.passed,
            instance.checksum,
            instance.failure_type,
            now_iso8601(),
        ],
    )
    .map_err(StateError::sqlite)?;
    Ok(conn.last_insert_rowid())
}

/// Instances of one test-case commit with the reporting computer, oldest first.
pub fn list_for_test_case_commit(
    conn: &Connection,
    test_case_commit_id: i64,
) -> Result<Vec<TestInstance>, StateError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT ti.id, ti.test_case_commit_id, ti.submission_id, s.computer, ti.passed,
                    ti.checksum, ti.failure_type, ti.created_at
             FROM test_instances ti
             JOIN submissions s ON s.id = ti.submission_id
             WHERE ti.test_case_commit_id = ?1
             ORDER BY ti.id",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![test_case_commit_id], |row| {
            Ok(TestInstance {
                id: row.get(0)?,
                test_case_commit_id: row.get(1)?,
                submission_id: row.get(2)?,
                computer: row.get(3)?,
                passed: row.get(4)?,
                checksum: row.get(5)?,
                failure_type: row.get(6)?,
                created_at: row.get(7)?,
            })
        })
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commits::{self, tests::sample_commit, tests::setup_test_db};
    use crate::{submissions, test_cases};
    use testhub_core::types::{ComputerSpec, NewSubmission};

    #[test]
    fn test_insert_and_list() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("7ab7ab7ab", 1)]).unwrap()[0];
        let tc = test_cases::ensure_test_case(&conn, "binary", "evolve_both_stars").unwrap();
        let tcc = test_cases::ensure_test_case_commit(&conn, commit_id, tc).unwrap();
        let sub = submissions::insert_submission(
            &conn,
            commit_id,
            &NewSubmission {
                computer: "cosmos".into(),
                spec: ComputerSpec::default(),
                compiled: Some(true),
            },
        )
        .unwrap();

        insert_instance(
            &conn,
            tcc,
            sub,
            &NewTestInstance {
                module: "binary".into(),
                test_case: "evolve_both_stars".into(),
                passed: false,
                checksum: Some("deadbeef".into()),
                failure_type: Some("run_test_string".into()),
            },
        )
        .unwrap();

        let listed = list_for_test_case_commit(&conn, tcc).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].computer, "cosmos");
        assert!(!listed[0].passed);
        assert_eq!(listed[0].checksum.as_deref(), Some("deadbeef"));
        assert_eq!(listed[0].failure_type.as_deref(), Some("run_test_string"));
    }
}
