use rusqlite::{Connection, params};
use testhub_core::error::StateError;
use testhub_core::time::now_iso8601;
use testhub_core::types::Branch;

const BRANCH_COLUMNS: &str = "id, name, head_id, merged";

fn row_to_branch(row: &rusqlite::Row) -> rusqlite::Result<Branch> {
    Ok(Branch {
        id: row.get(0)?,
        name: row.get(1)?,
        head_id: row.get(2)?,
        merged: row.get::<_, i64>(3)? != 0,
    })
}

/// Find or create a branch by name, returning the stored row.
pub fn ensure_branch(conn: &Connection, name: &str) -> Result<Branch, StateError> {
    let now = now_iso8601();
    conn.execute(
        "INSERT INTO branches (name, merged, created_at, updated_at)
         VALUES (?1, 0, ?2, ?2)
         ON CONFLICT(name) DO NOTHING",
        params![name, now],
    )
    .map_err(StateError::sqlite)?;
    get_by_name(conn, name)?.ok_or_else(|| StateError::branch_not_found(name))
}

pub fn get_by_name(conn: &Connection, name: &str) -> Result<Option<Branch>, StateError> {
    let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE name = ?1");
    let result = conn.query_row(&sql, params![name], row_to_branch);
    match result {
        Ok(branch) => Ok(Some(branch)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StateError::sqlite(e)),
    }
}

pub fn get_by_id(conn: &Connection, id: i64) -> Result<Option<Branch>, StateError> {
    let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches WHERE id = ?1");
    let result = conn.query_row(&sql, params![id], row_to_branch);
    match result {
        Ok(branch) => Ok(Some(branch)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StateError::sqlite(e)),
    }
}

/// All known branches ordered by name.
pub fn list_branches(conn: &Connection) -> Result<Vec<Branch>, StateError> {
    let sql = format!("SELECT {BRANCH_COLUMNS} FROM branches ORDER BY name");
    let mut stmt = conn.prepare(&sql).map_err(StateError::sqlite)?;
    let rows = stmt
        .query_map([], row_to_branch)
        .map_err(StateError::sqlite)?;
    rows.collect::<Result<Vec<_>, _>>()
        .map_err(StateError::sqlite)
}

pub fn set_merged(conn: &Connection, id: i64, merged: bool) -> Result<(), StateError> {
    conn.execute(
        "UPDATE branches SET merged = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, merged as i64, now_iso8601()],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}

pub fn set_head(conn: &Connection, id: i64, head_id: Option<i64>) -> Result<(), StateError> {
    conn.execute(
        "UPDATE branches SET head_id = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, head_id, now_iso8601()],
    )
    .map_err(StateError::sqlite)?;
    Ok(())
}
