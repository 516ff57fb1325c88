use crate::error::QueryError;
use rusqlite::Connection;
use serde::Serialize;
use testhub_core::types::{Branch, Commit};
use testhub_state::memberships;

/// One page of a branch listing, newest position first.
#[derive(Debug, Clone, Serialize)]
pub struct BranchPage {
    pub branch: String,
    pub page: usize,
    pub page_size: usize,
    pub total_commits: i64,
    pub total_pages: usize,
    pub commits: Vec<Commit>,
}

/// `page` starts at 1; 0 is treated as 1.
pub fn commits_in_branch(
    conn: &Connection,
    branch: &Branch,
    page: usize,
    page_size: usize,
) -> Result<BranchPage, QueryError> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_commits = memberships::count_for_branch(conn, branch.id)?;
    let total_pages = (total_commits.max(0) as usize).div_ceil(page_size);
    let commits = memberships::page_for_branch(conn, branch.id, page, page_size)?;
    Ok(BranchPage {
        branch: branch.name.clone(),
        page,
        page_size,
        total_commits,
        total_pages,
        commits,
    })
}
