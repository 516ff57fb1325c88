use crate::commits::{COMMIT_COLUMNS, row_to_commit};
use crate::sql::{IN_CHUNK, placeholders};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::collections::{BTreeSet, HashSet};
use testhub_core::error::StateError;
use testhub_core::time::from_unix;
use testhub_core::types::{Branch, Commit};
use time::OffsetDateTime;

/// Add `(branch, commit)` pairs that do not exist yet. Positions stay null
/// until [`renumber_positions`] runs. Returns the number of new rows.
pub fn insert_memberships(
    conn: &Connection,
    branch_id: i64,
    commit_ids: &[i64],
) -> Result<usize, StateError> {
    let mut stmt = conn
        .prepare_cached(
            "INSERT INTO branch_memberships (branch_id, commit_id)
             VALUES (?1, ?2)
             ON CONFLICT(branch_id, commit_id) DO NOTHING",
        )
        .map_err(StateError::sqlite)?;
    let mut inserted = 0;
    for commit_id in commit_ids {
        inserted += stmt
            .execute(params![branch_id, commit_id])
            .map_err(StateError::sqlite)?;
    }
    Ok(inserted)
}

/// Assign positions `1..n` in `(commit_time, id)` order.
pub fn renumber_positions(conn: &Connection, branch_id: i64) -> Result<(), StateError> {
    conn.execute(
        "UPDATE branch_memberships SET position = ranked.rn
         FROM (
             SELECT bm.id AS membership_id,
                    ROW_NUMBER() OVER (ORDER BY c.commit_time, c.id) AS rn
             FROM branch_memberships bm
             JOIN commits c ON c.id = bm.commit_id
             WHERE bm.branch_id = ?1
         ) AS ranked
         WHERE branch_memberships.id = ranked.membership_id",
        params![branch_id],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

pub fn shas_for_branch(conn: &Connection, branch_id: i64) -> Result<HashSet<String>, StateError> {
    let mut stmt = conn
        .prepare(
            "SELECT c.sha FROM branch_memberships bm
             JOIN commits c ON c.id = bm.commit_id
             WHERE bm.branch_id = ?1",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![branch_id], |row| row.get::<_, String>(0))
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<HashSet<_>, _>>()
        .map_err(StateError::sqlite)
}

pub fn commit_ids_for_branch(conn: &Connection, branch_id: i64) -> Result<Vec<i64>, StateError> {
    let mut stmt = conn
        .prepare("SELECT commit_id FROM branch_memberships WHERE branch_id = ?1 ORDER BY position")
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![branch_id], |row| row.get::<_, i64>(0))
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

fn commit_time_bound(
    conn: &Connection,
    branch_id: i64,
    aggregate: &str,
) -> Result<Option<OffsetDateTime>, StateError> {
    let sql = format!(
        "SELECT {aggregate}(c.commit_time) FROM branch_memberships bm
         JOIN commits c ON c.id = bm.commit_id
         WHERE bm.branch_id = ?1"
    );
    let value: Option<i64> = conn
        .query_row(&sql, params![branch_id], |row| row.get(0))
        .map_err(StateError::sqlite)?;
    Ok(value.map(from_unix))
}

/// Newest commit time in the branch, `None` for a branch with no commits.
pub fn latest_commit_time(
    conn: &Connection,
    branch_id: i64,
) -> Result<Option<OffsetDateTime>, StateError> {
    commit_time_bound(conn, branch_id, "MAX")
}

pub fn earliest_commit_time(
    conn: &Connection,
    branch_id: i64,
) -> Result<Option<OffsetDateTime>, StateError> {
    commit_time_bound(conn, branch_id, "MIN")
}

/// Distinct ids of every branch containing at least one of `commit_ids`.
pub fn branch_ids_for_commits(
    conn: &Connection,
    commit_ids: &[i64],
) -> Result<BTreeSet<i64>, StateError> {
    let mut out = BTreeSet::new();
    for chunk in commit_ids.chunks(IN_CHUNK) {
        let sql = format!(
            "SELECT DISTINCT branch_id FROM branch_memberships WHERE commit_id IN ({})",
            placeholders(chunk.len())
        );
        let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
        let rows = stmt
            .query_map(params_from_iter(chunk.iter()), |row| row.get::<_, i64>(0))
            .map_err(StateError::sqlite)?;
        for row in rows {
            out.insert(row.map_err(StateError::sqlite)?);
        }
    }
    Ok(out)
}

/// Branches containing a commit, ordered by name.
pub fn branches_for_commit(conn: &Connection, commit_id: i64) -> Result<Vec<Branch>, StateError> {
    let mut stmt = conn
        .prepare(
            "SELECT b.id, b.name, b.head_id, b.merged FROM branch_memberships bm
             JOIN branches b ON b.id = bm.branch_id
             WHERE bm.commit_id = ?1
             ORDER BY b.name",
        )
        .map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![commit_id], |row| {
            Ok(Branch {
                id: row.get(0)?,
                name: row.get(1)?,
                head_id: row.get(2)?,
                merged: row.get::<_, i64>(3)? != 0,
            })
        })
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

pub fn is_member(conn: &Connection, branch_id: i64, commit_id: i64) -> Result<bool, StateError> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM branch_memberships WHERE branch_id = ?1 AND commit_id = ?2",
        params![branch_id, commit_id],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

/// The member with the highest position, i.e. the newest placed commit.
pub fn highest_position_commit(
    conn: &Connection,
    branch_id: i64,
) -> Result<Option<Commit>, StateError> {
    let sql = format!(
        "SELECT {COMMIT_COLUMNS} FROM branch_memberships bm
         JOIN commits c ON c.id = bm.commit_id
         WHERE bm.branch_id = ?1
         ORDER BY bm.position DESC NULLS LAST, c.commit_time DESC
         LIMIT 1"
    );
    conn.query_row(&sql, params![branch_id], row_to_commit)
        .optional()
        .map_err(StateError::sqlite)
}

pub fn position_of(
    conn: &Connection,
    branch_id: i64,
    commit_id: i64,
) -> Result<Option<i64>, StateError> {
    let position: Option<Option<i64>> = conn
        .query_row(
            "SELECT position FROM branch_memberships WHERE branch_id = ?1 AND commit_id = ?2",
            params![branch_id, commit_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(StateError::sqlite)?;
    Ok(position.flatten())
}

pub fn count_for_branch(conn: &Connection, branch_id: i64) -> Result<i64, StateError> {
    conn.query_row(
        "SELECT COUNT(*) FROM branch_memberships WHERE branch_id = ?1",
        params![branch_id],
        |row| row.get(0),
    )
    .map_err(StateError::sqlite)
}

/// One page of a branch, newest position first. `page` starts at 1.
pub fn page_for_branch(
    conn: &Connection,
    branch_id: i64,
    page: usize,
    page_size: usize,
) -> Result<Vec<Commit>, StateError> {
    let offset = page.saturating_sub(1).saturating_mul(page_size);
    let sql = format!(
        "SELECT {COMMIT_COLUMNS} FROM branch_memberships bm
         JOIN commits c ON c.id = bm.commit_id
         WHERE bm.branch_id = ?1
         ORDER BY bm.position DESC NULLS LAST, c.commit_time DESC
         LIMIT ?2 OFFSET ?3"
    );
    let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(
            params![branch_id, page_size as i64, offset as i64],
            row_to_commit,
        )
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Branch commits with `from <= commit_time < until`, newest first, at most `limit`.
pub fn commits_before(
    conn: &Connection,
    branch_id: i64,
    from: OffsetDateTime,
    until: OffsetDateTime,
    limit: usize,
) -> Result<Vec<Commit>, StateError> {
    let sql = format!(
        "SELECT {COMMIT_COLUMNS} FROM branch_memberships bm
         JOIN commits c ON c.id = bm.commit_id
         WHERE bm.branch_id = ?1 AND c.commit_time >= ?2 AND c.commit_time < ?3
         ORDER BY c.commit_time DESC, c.id DESC
         LIMIT ?4"
    );
    let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(
            params![
                branch_id,
                from.unix_timestamp(),
                until.unix_timestamp(),
                limit as i64
            ],
            row_to_commit,
        )
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Branch commits with `from <= commit_time <= until` other than `exclude_id`,
/// oldest first, at most `limit`.
pub fn commits_after(
    conn: &Connection,
    branch_id: i64,
    from: OffsetDateTime,
    until: OffsetDateTime,
    exclude_id: i64,
    limit: usize,
) -> Result<Vec<Commit>, StateError> {
    let sql = format!(
        "SELECT {COMMIT_COLUMNS} FROM branch_memberships bm
         JOIN commits c ON c.id = bm.commit_id
         WHERE bm.branch_id = ?1 AND c.commit_time >= ?2 AND c.commit_time <= ?3 AND c.id != ?4
         ORDER BY c.commit_time ASC, c.id ASC
         LIMIT ?5"
    );
    let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(
            params![
                branch_id,
                from.unix_timestamp(),
                until.unix_timestamp(),
                exclude_id,
                limit as i64
            ],
            row_to_commit,
        )
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

/// Open change-request commits of a branch, oldest first.
pub fn open_pull_requests_for_branch(
    conn: &Connection,
    branch_id: i64,
) -> Result<Vec<Commit>, StateError> {
    let sql = format!(
        "SELECT {COMMIT_COLUMNS} FROM branch_memberships bm
         JOIN commits c ON c.id = bm.commit_id
         WHERE bm.branch_id = ?1 AND c.pull_request = 1 AND c.open = 1
         ORDER BY c.commit_time ASC, c.id ASC"
    );
    let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map(params![branch_id], row_to_commit)
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}
