use rusqlite::Connection;
use tempfile::{TempDir, tempdir};
use testhub_core::time::from_unix;
use testhub_core::types::{Branch, Commit, NewCommit, short_sha};
use testhub_state::{branches, commits, db, memberships, schema};

pub(crate) const BASE: i64 = 1_700_000_000;
pub(crate) const HOUR: i64 = 3_600;

pub(crate) fn setup_test_db() -> (TempDir, Connection) {
    let dir = tempdir().unwrap();
    let conn = db::open_connection(&dir.path().join("test.db")).unwrap();
    schema::create_tables(&conn).unwrap();
    (dir, conn)
}

pub(crate) fn hash(n: usize) -> String {
    format!("{n:07x}{}", "a".repeat(33))
}

pub(crate) fn new_commit(n: usize, unix: i64) -> NewCommit {
    let sha = hash(n);
    NewCommit {
        short_sha: short_sha(&sha),
        author: "Bill Paxton".to_string(),
        author_email: "paxton@example.com".to_string(),
        message: format!("Commit number {n}"),
        commit_time: from_unix(unix),
        github_url: None,
        sha,
    }
}

/// `count` hourly commits on `name`, oldest first, with the newest as head.
pub(crate) fn seed_branch(conn: &Connection, name: &str, count: usize) -> (Branch, Vec<Commit>) {
    let branch = branches::ensure_branch(conn, name).unwrap();
    let new: Vec<NewCommit> = (1..=count)
        .map(|n| new_commit(n, BASE + n as i64 * HOUR))
        .collect();
    let ids = commits::upsert_commits(conn, &new).unwrap();
    memberships::insert_memberships(conn, branch.id, &ids).unwrap();
    memberships::renumber_positions(conn, branch.id).unwrap();
    branches::set_head(conn, branch.id, ids.last().copied()).unwrap();
    let stored = ids
        .iter()
        .map(|id| commits::get_by_id(conn, *id).unwrap().unwrap())
        .collect();
    (branches::get_by_id(conn, branch.id).unwrap().unwrap(), stored)
}
