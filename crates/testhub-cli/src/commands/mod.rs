pub mod browse;
pub mod doctor;
pub mod init;
pub mod purge;
pub mod results;
pub mod show;
pub mod sync;

use anyhow::{Context, Result};
use rusqlite::Connection;
use testhub_core::config::Config;
use testhub_core::time::format_iso8601;
use testhub_core::types::{Branch, Commit};
use testhub_query::{resolve_branch, resolve_commit};
use testhub_state::{db, schema};

/// Open the store of the configured repository, creating the schema if needed.
pub(crate) fn open_store(config: &Config) -> Result<Connection> {
    let db_path = config.database_path();
    let conn = db::open_with_storage(&db_path, &config.storage)
        .with_context(|| format!("Failed to open store at {}", db_path.display()))?;
    schema::create_tables(&conn)?;
    Ok(conn)
}

/// Branch and commit named on the command line.
pub(crate) fn resolve(
    conn: &Connection,
    config: &Config,
    revision: &str,
    branch: Option<&str>,
) -> Result<(Branch, Commit)> {
    let branch = resolve_branch(conn, branch, &config.sync.default_branch)?;
    let commit = resolve_commit(conn, revision, &branch)?;
    Ok((branch, commit))
}

pub(crate) fn commit_line(commit: &Commit, marker: &str) -> String {
    let kind = if commit.pull_request {
        if commit.open { " [open PR]" } else { " [PR]" }
    } else {
        ""
    };
    format!(
        "{marker}{} {}  {:<17} {}{}",
        commit.short_sha,
        format_iso8601(commit.commit_time),
        commit.scalars.status.as_str(),
        commit.message_first_line(testhub_core::constants::MESSAGE_FIRST_LINE_MAX),
        kind
    )
}
