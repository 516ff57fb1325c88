use crate::sql::{IN_CHUNK, is_constraint_violation, placeholders};
use rusqlite::{Connection, params, params_from_iter};
use std::collections::{HashMap, HashSet};
use testhub_core::error::StateError;
use testhub_core::time::{from_unix, now_iso8601};
use testhub_core::types::{Commit, CommitScalars, NewCommit, TestStatus};
use tracing::warn;

pub(crate) const COMMIT_COLUMNS: &str = "c.id, c.sha, c.short_sha, c.author, c.author_email, c.message, c.commit_time, c.github_url, c.pull_request, c.open, c.test_case_count, c.passed_count, c.failed_count, c.mixed_count, c.checksum_count, c.untested_count, c.computer_count, c.complete_computer_count, c.status";

/// Helper to map a row selected with [`COMMIT_COLUMNS`] to a `Commit`.
pub(crate) fn row_to_commit(row: &rusqlite::Row) -> rusqlite::Result<Commit> {
    let status: i64 = row.get(18)?;
    Ok(Commit {
        id: row.get(0)?,
        sha: row.get(1)?,
        short_sha: row.get(2)?,
        author: row.get(3)?,
        author_email: row.get(4)?,
        message: row.get(5)?,
        commit_time: from_unix(row.get(6)?),
        github_url: row.get(7)?,
        pull_request: row.get::<_, i64>(8)? != 0,
        open: row.get::<_, i64>(9)? != 0,
        scalars: CommitScalars {
            test_case_count: row.get(10)?,
            passed_count: row.get(11)?,
            failed_count: row.get(12)?,
            mixed_count: row.get(13)?,
            checksum_count: row.get(14)?,
            untested_count: row.get(15)?,
            computer_count: row.get(16)?,
            complete_computer_count: row.get(17)?,
            status: TestStatus::from_code(status).unwrap_or(TestStatus::Untested),
        },
    })
}

/// Insert new commits or refresh metadata of existing ones, keyed by `sha`.
///
/// Rollup scalars are never touched here. A row that collides on `short_sha`
/// with a different commit is skipped with a warning, so the result can be
/// shorter than `commits`. Returns the ids of the stored rows in input order.
pub fn upsert_commits(conn: &Connection, commits: &[NewCommit]) -> Result<Vec<i64>, StateError> {
    let now = now_iso8601();
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO commits (sha, short_sha, author, author_email, message, commit_time, github_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(sha) DO UPDATE SET
               short_sha = excluded.short_sha,
               author = excluded.author,
               author_email = excluded.author_email,
               message = excluded.message,
               commit_time = excluded.commit_time,
               github_url = COALESCE(excluded.github_url, commits.github_url),
               updated_at = excluded.updated_at
             RETURNING id",
        )
        .map_err(StateError::sqlite)?;

    let mut ids = Vec::with_capacity(commits.len());
    for commit in commits {
        let result = stmt.query_row(
            params![
                commit.sha,
                commit.short_sha,
                commit.author,
                commit.author_email,
                commit.message,
                commit.commit_time.unix_timestamp(),
                commit.github_url,
                now,
            ],
            |row| row.get::<_, i64>(0),
        );
        match result {
            Ok(id) => ids.push(id),
            Err(e) if is_constraint_violation(&e) => {
                warn!(sha = %commit.sha, short_sha = %commit.short_sha, "short sha collision; commit skipped");
            }
            Err(e) => return Err(StateError::sqlite(e)),
        }
    }
    Ok(ids)
}

fn get_one(conn: &Connection, filter: &str, value: &dyn rusqlite::ToSql) -> Result<Option<Commit>, StateError> {
    let sql = format!("SELECT {COMMIT_COLUMNS} FROM commits c WHERE {filter}");
    let result = conn.query_row(&sql, [value], row_to_commit);
    match result {
        Ok(commit) => Ok(Some(commit)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StateError::sqlite(e)),
    }
}

pub fn get_by_sha(conn: &Connection, sha: &str) -> Result<Option<Commit>, StateError> {
    get_one(conn, "c.sha = ?1", &sha)
}

pub fn get_by_short_sha(conn: &Connection, short_sha: &str) -> Result<Option<Commit>, StateError> {
    get_one(conn, "c.short_sha = ?1", &short_sha)
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Commit>, StateError> {
    get_one(conn, "c.id = ?1", &id)
}

/// Map of `sha -> id` for the given hashes that exist locally.
pub fn ids_for_shas(conn: &Connection, shas: &[String]) -> Result<HashMap<String, i64>, StateError> {
    let mut out = HashMap::with_capacity(shas.len());
    for chunk in shas.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT sha, id FROM commits WHERE sha IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(StateError::sqlite)?;
        for row in rows {
            let (sha, id) = row.map_err(StateError::sqlite)?;
            out.insert(sha, id);
        }
    }
    Ok(out)
}

/// Commits among `ids` that have never had their test cases populated.
pub fn with_zero_test_cases(conn: &Connection, ids: &[i64]) -> Result<Vec<Commit>, StateError> {
    let mut out = Vec::new();
    for chunk in ids.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits c WHERE c.test_case_count = 0 AND c.id IN ({}) ORDER BY c.id",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), row_to_commit)
            .map_err(StateError::sqlite)?;
        for row in rows {
            out.push(row.map_err(StateError::sqlite)?);
        }
    }
    Ok(out)
}

/// Ids of every stored commit with no test cases yet, oldest first.
pub fn ids_with_zero_test_cases(conn: &Connection) -> Result<Vec<i64>, StateError> {
    let mut stmt = conn
        .prepare("SELECT id FROM commits WHERE test_case_count = 0 ORDER BY commit_time, id")
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, i64>(0))
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Record the freshly discovered case count without running the aggregator:
/// every case is untested, so the remaining counters keep their defaults.
pub fn set_initial_scalars(
    conn: &Connection,
    id: i64,
    test_case_count: i64,
) -> Result<(), StateError> {
    conn.execute(
        "UPDATE commits SET test_case_count = ?2, untested_count = ?2, status = ?3, updated_at = ?4 WHERE id = ?1",
        params![id, test_case_count, TestStatus::Untested.code(), now_iso8601()],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

/// Persist a full set of rollup scalars.
pub fn update_scalars(conn: &Connection, id: i64, scalars: &CommitScalars) -> Result<(), StateError> {
    conn.execute(
        "UPDATE commits SET test_case_count = ?2, passed_count = ?3, failed_count = ?4, mixed_count = ?5,
           checksum_count = ?6, untested_count = ?7, computer_count = ?8, complete_computer_count = ?9,
           status = ?10, updated_at = ?11
         WHERE id = ?1",
        params![
            id,
            scalars.test_case_count,
            scalars.passed_count,
            scalars.failed_count,
            scalars.mixed_count,
            scalars.checksum_count,
            scalars.untested_count,
            scalars.computer_count,
            scalars.complete_computer_count,
            scalars.status.code(),
            now_iso8601(),
        ],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

/// Flag a commit as an open change request, tagged with the remote title and URL.
pub fn mark_open_pull_request(
    conn: &Connection,
    id: i64,
    title: &str,
    url: Option<&str>,
) -> Result<(), StateError> {
    conn.execute(
        "UPDATE commits SET pull_request = 1, open = 1, message = ?2,
           github_url = COALESCE(?3, github_url), updated_at = ?4
         WHERE id = ?1",
        params![id, title, url, now_iso8601()],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

/// Hashes of every change-request commit currently flagged open.
pub fn open_pull_request_shas(conn: &Connection) -> Result<Vec<String>, StateError> {
    let mut stmt = conn
        .prepare("SELECT sha FROM commits WHERE pull_request = 1 AND open = 1 ORDER BY commit_time")
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Hashes among `shas` already stored as change-request commits.
pub fn pull_request_shas_among(
    conn: &Connection,
    shas: &[String],
) -> Result<HashSet<String>, StateError> {
    let mut out = HashSet::new();
    for chunk in shas.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT sha FROM commits WHERE pull_request = 1 AND sha IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, String>(0))
            .map_err(StateError::sqlite)?;
        for row in rows {
            out.insert(row.map_err(StateError::sqlite)?);
        }
    }
    Ok(out)
}

/// Close every open change-request commit whose hash is not in `still_open`.
/// Returns the number of commits closed.
pub fn close_pull_requests_except(
    conn: &Connection,
    still_open: &HashSet<String>,
) -> Result<usize, StateError> {
    let now = now_iso8601();
    let mut closed = 0;
    for sha in open_pull_request_shas(conn)? {
        if still_open.contains(&sha) {
            continue;
        }
        closed += conn
            .execute(
                "UPDATE commits SET open = 0, updated_at = ?2 WHERE sha = ?1",
                params![sha, now],
            )
            .map_err(StateError::sqlite)?;
    }
    Ok(closed)
}

pub fn count(conn: &Connection) -> Result<i64, StateError> {
    conn.query_row("SELECT COUNT(*) FROM commits", [], |row| row.get(0))
        .map_err(StateError::sqlite)
}

/// Delete the whole mirrored graph. Child rows go with the commits via cascades.
pub fn purge_all(conn: &Connection) -> Result<usize, StateError> {
    conn.execute("UPDATE branches SET head_id = NULL", [])
        .map_err(StateError::sqlite)?;
    conn.execute("DELETE FROM commits", [])
        .map_err(StateError::sqlite)
}
