use rusqlite::{Connection, params};
use testhub_core::error::StateError;
use testhub_core::time::now_iso8601;
use testhub_core::types::{ComputerSpec, NewSubmission};

/// One `(computer, spec)` combination that reported on a commit, with the
/// number of distinct test cases its instances cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputerGroup {
    pub computer: String,
    pub spec: ComputerSpec,
    pub tested_cases: i64,
}

pub fn insert_submission(
    conn: &Connection,
    commit_id: i64,
    submission: &NewSubmission,
) -> Result<i64, StateError> {
    conn.execute(
        "INSERT INTO submissions (commit_id, computer, platform_version, sdk_version, math_backend,
           compiler, compiler_version, compiled, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            commit_id,
            submission.computer,
            submission.spec.platform_version,
            submission.spec.sdk_version,
            submission.spec.math_backend,
            submission.spec.compiler,
            submission.spec.compiler_version,
            submission.compiled,
            now_iso8601(),
        ],
    )
    .map_err(StateError::sqlite)?;
    Ok(conn.last_insert_rowid())
}

/// Non-null `compiled` flags of a commit's submissions, optionally for one computer.
pub fn compiled_flags(
    conn: &Connection,
    commit_id: i64,
    computer: Option<&str>,
) -> Result<Vec<bool>, StateError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT compiled FROM submissions
             WHERE commit_id = ?1 AND compiled IS NOT NULL AND (?2 IS NULL OR computer = ?2)
             ORDER BY id",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![commit_id, computer], |row| row.get::<_, bool>(0))
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

pub fn count_for_commit(conn: &Connection, commit_id: i64) -> Result<i64, StateError> {
    conn.query_row(
        "SELECT COUNT(*) FROM submissions WHERE commit_id = ?1",
        params![commit_id],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

/// Group a commit's submissions by computer and build environment.
pub fn computer_groups(conn: &Connection, commit_id: i64) -> Result<Vec<ComputerGroup>, StateError> {
    let mut stmt = conn
        .prepare(
            "SELECT s.computer, s.platform_version, s.sdk_version, s.math_backend, s.compiler,
                    s.compiler_version,
                    (SELECT COUNT(DISTINCT tcc.test_case_id)
                     FROM test_instances ti
                     JOIN submissions s2 ON s2.id = ti.submission_id
                     JOIN test_case_commits tcc ON tcc.id = ti.test_case_commit_id
                     WHERE tcc.commit_id = ?1
                       AND s2.commit_id = ?1
                       AND s2.computer = s.computer
                       AND s2.platform_version IS s.platform_version
                       AND s2.sdk_version IS s.sdk_version
                       AND s2.math_backend IS s.math_backend
                       AND s2.compiler IS s.compiler
                       AND s2.compiler_version IS s.compiler_version)
             FROM submissions s
             WHERE s.commit_id = ?1
             GROUP BY s.computer, s.platform_version, s.sdk_version, s.math_backend, s.compiler,
                      s.compiler_version
             ORDER BY s.computer, s.platform_version, s.sdk_version, s.math_backend, s.compiler,
                      s.compiler_version",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![commit_id], |row| {
            Ok(ComputerGroup {
                computer: row.get(0)?,
                spec: ComputerSpec {
                    platform_version: row.get(1)?,
                    sdk_version: row.get(2)?,
                    math_backend: row.get(3)?,
                    compiler: row.get(4)?,
                    compiler_version: row.get(5)?,
                },
                tested_cases: row.get(6)?,
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
    use crate::{test_cases, test_instances};
    use testhub_core::types::NewTestInstance;

    fn submission(computer: &str, compiler: &str, compiled: Option<bool>) -> NewSubmission {
        NewSubmission {
            computer: computer.to_string(),
            spec: ComputerSpec {
                platform_version: Some("Linux".into()),
                compiler: Some(compiler.into()),
                ..Default::default()
            },
            compiled,
        }
    }

    #[test]
    fn test_compiled_flags_skip_nulls() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("5ab5ab5ab", 1)]).unwrap()[0];
        insert_submission(&conn, commit_id, &submission("cosmos", "gfortran", Some(true))).unwrap();
        insert_submission(&conn, commit_id, &submission("cosmos", "gfortran", None)).unwrap();
        insert_submission(&conn, commit_id, &submission("hydra", "ifort", Some(false))).unwrap();

        assert_eq!(compiled_flags(&conn, commit_id, None).unwrap(), vec![true, false]);
        assert_eq!(compiled_flags(&conn, commit_id, Some("hydra")).unwrap(), vec![false]);
        assert_eq!(count_for_commit(&conn, commit_id).unwrap(), 3);
    }

    #[test]
    fn test_computer_groups_count_distinct_cases() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("6ab6ab6ab", 1)]).unwrap()[0];
        let a = test_cases::ensure_test_case(&conn, "star", "a").unwrap();
        let b = test_cases::ensure_test_case(&conn, "star", "b").unwrap();
        let tcc_a = test_cases::ensure_test_case_commit(&conn, commit_id, a).unwrap();
        let tcc_b = test_cases::ensure_test_case_commit(&conn, commit_id, b).unwrap();

        let first = insert_submission(&conn, commit_id, &submission("cosmos", "gfortran", Some(true))).unwrap();
        let second = insert_submission(&conn, commit_id, &submission("cosmos", "gfortran", Some(true))).unwrap();
        let other = insert_submission(&conn, commit_id, &submission("cosmos", "ifort", None)).unwrap();

        let instance = |name: &str| NewTestInstance {
            module: "star".into(),
            test_case: name.into(),
            passed: true,
            checksum: None,
            failure_type: None,
        };
        test_instances::insert_instance(&conn, tcc_a, first, &instance("a")).unwrap();
        test_instances::insert_instance(&conn, tcc_a, second, &instance("a")).unwrap();
        test_instances::insert_instance(&conn, tcc_b, second, &instance("b")).unwrap();
        test_instances::insert_instance(&conn, tcc_b, other, &instance("b")).unwrap();

        let groups = computer_groups(&conn, commit_id).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].spec.compiler.as_deref(), Some("gfortran"));
        assert_eq!(groups[0].tested_cases, 2);
        assert_eq!(groups[1].spec.compiler.as_deref(), Some("ifort"));
        assert_eq!(groups[1].tested_cases, 1);
    }
}
