use crate::error::QueryError;
use rusqlite::Connection;
use testhub_core::constants::{REV_AUTO, REV_HEAD, SHORT_SHA_LEN};
use testhub_core::types::{Branch, Commit};
use testhub_state::{branches, commits, memberships};
use tracing::debug;

/// Look up a branch by name, falling back to the default branch when the name
/// is absent or unknown.
pub fn resolve_branch(
    conn: &Connection,
    name: Option<&str>,
    default_branch: &str,
) -> Result<Branch, QueryError> {
    if let Some(name) = name {
        if let Some(branch) = branches::get_by_name(conn, name)? {
            return Ok(branch);
        }
        debug!(branch = name, fallback = default_branch, "Unknown branch; using default");
    }
    branches::get_by_name(conn, default_branch)?.ok_or_else(|| QueryError::BranchNotFound {
        name: default_branch.to_string(),
    })
}

/// Turn a user-supplied revision into a stored commit.
///
/// `head` and `auto` are resolved against `branch`; anything else is a SHA,
/// abbreviated when it has exactly seven characters.
pub fn resolve_commit(
    conn: &Connection,
    reference: &str,
    branch: &Branch,
) -> Result<Commit, QueryError> {
    let reference = reference.trim();
    let found = if reference.eq_ignore_ascii_case(REV_HEAD) {
        branch_head(conn, branch)?
    } else if reference.eq_ignore_ascii_case(REV_AUTO) {
        match memberships::open_pull_requests_for_branch(conn, branch.id)?
            .into_iter()
            .next()
        {
            Some(pull) => Some(pull),
            None => branch_head(conn, branch)?,
        }
    } else if reference.chars().count() == SHORT_SHA_LEN {
        commits::get_by_short_sha(conn, reference)?
    } else {
        commits::get_by_sha(conn, reference)?
    };
    found.ok_or_else(|| QueryError::commit_not_found(reference))
}

fn branch_head(conn: &Connection, branch: &Branch) -> Result<Option<Commit>, QueryError> {
    if let Some(head_id) = branch.head_id
        && let Some(head) = commits::get_by_id(conn, head_id)?
    {
        return Ok(Some(head));
    }
    Ok(memberships::highest_position_commit(conn, branch.id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{BASE, HOUR, hash, new_commit, seed_branch, setup_test_db};

    #[test]
    fn test_unknown_branch_falls_back_to_default() {
        let (_dir, conn) = setup_test_db();
        let (main, _) = seed_branch(&conn, "main", 1);
        assert_eq!(resolve_branch(&conn, Some("nope"), "main").unwrap().id, main.id);
        assert_eq!(resolve_branch(&conn, None, "main").unwrap().id, main.id);
        assert!(matches!(
            resolve_branch(&conn, None, "trunk"),
            Err(QueryError::BranchNotFound { .. })
        ));
    }

    #[test]
    fn test_head_short_and_full() {
        let (_dir, conn) = setup_test_db();
        let (branch, commits) = seed_branch(&conn, "main", 3);

        let head = resolve_commit(&conn, "HEAD", &branch).unwrap();
        assert_eq!(head.id, commits[2].id);
        let short = resolve_commit(&conn, &commits[0].short_sha, &branch).unwrap();
        assert_eq!(short.id, commits[0].id);
        let full = resolve_commit(&conn, &hash(2), &branch).unwrap();
        assert_eq!(full.id, commits[1].id);
        assert!(matches!(
            resolve_commit(&conn, &hash(99), &branch),
            Err(QueryError::CommitNotFound { .. })
        ));
    }

    #[test]
    fn test_auto_prefers_oldest_open_change_request() {
        let (_dir, conn) = setup_test_db();
        let (branch, seeded) = seed_branch(&conn, "main", 2);
        assert_eq!(resolve_commit(&conn, "auto", &branch).unwrap().id, seeded[1].id);

        let pr_ids = commits::upsert_commits(
            &conn,
            &[new_commit(10, BASE + 10 * HOUR), new_commit(11, BASE + 9 * HOUR)],
        )
        .unwrap();
        memberships::insert_memberships(&conn, branch.id, &pr_ids).unwrap();
        for id in &pr_ids {
            commits::mark_open_pull_request(&conn, *id, "Tweak", None).unwrap();
        }
        assert_eq!(resolve_commit(&conn, "auto", &branch).unwrap().id, pr_ids[1]);
    }

    #[test]
    fn test_head_without_recorded_head_uses_highest_position() {
        let (_dir, conn) = setup_test_db();
        let (branch, commits) = seed_branch(&conn, "main", 3);
        branches::set_head(&conn, branch.id, None).unwrap();
        let branch = branches::get_by_id(&conn, branch.id).unwrap().unwrap();
        assert_eq!(resolve_commit(&conn, "head", &branch).unwrap().id, commits[2].id);
    }
}
