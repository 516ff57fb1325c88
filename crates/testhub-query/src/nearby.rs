use crate::error::QueryError;
use rusqlite::Connection;
use testhub_core::types::{Branch, Commit};
use testhub_state::memberships;
use time::OffsetDateTime;
use tracing::debug;

/// Commits of `branch` around `commit`, oldest first with the branch head last.
///
/// At most `limit` commits are returned and `commit` is always among them.
pub fn nearby_commits(
    conn: &Connection,
    commit: &Commit,
    branch: &Branch,
    limit: usize,
) -> Result<Vec<Commit>, QueryError> {
    nearby_commits_until(conn, commit, branch, limit, OffsetDateTime::now_utc())
}

/// [`nearby_commits`] with an explicit upper bound for the commits after `commit`.
pub fn nearby_commits_until(
    conn: &Connection,
    commit: &Commit,
    branch: &Branch,
    limit: usize,
    now: OffsetDateTime,
) -> Result<Vec<Commit>, QueryError> {
    if limit == 0 {
        return Ok(Vec::new());
    }
    let Some(earliest) = memberships::earliest_commit_time(conn, branch.id)? else {
        return Ok(vec![commit.clone()]);
    };

    let mut before =
        memberships::commits_before(conn, branch.id, earliest, commit.commit_time, limit)?;
    before.reverse();
    let after =
        memberships::commits_after(conn, branch.id, commit.commit_time, now, commit.id, limit)?;

    let mut window: Vec<Commit> = before
        .into_iter()
        .chain(std::iter::once(commit.clone()))
        .chain(after)
        .collect();
    window.sort_by(|a, b| (a.commit_time, &a.message).cmp(&(b.commit_time, &b.message)));

    if let Some(head_id) = branch.head_id
        && let Some(idx) = window.iter().position(|c| c.id == head_id)
    {
        let head = window.remove(idx);
        window.push(head);
    }

    let candidates = window.len();
    let Some(index) = window.iter().position(|c| c.id == commit.id) else {
        window.truncate(limit);
        return Ok(window);
    };
    let window = centered_window(window, index, limit);
    debug!(
        branch = %branch.name,
        sha = %commit.short_sha,
        candidates,
        returned = window.len(),
        "Built nearby window"
    );
    Ok(window)
}

/// Keep at most `limit` items around `index`, growing one step before and then
/// one step after until the limit is reached or both ends are exhausted.
pub fn centered_window<T>(mut items: Vec<T>, index: usize, limit: usize) -> Vec<T> {
    if items.len() <= limit {
        return items;
    }
    if limit == 0 || index >= items.len() {
        items.truncate(limit);
        return items;
    }
    let (mut lo, mut hi) = (index, index + 1);
    while hi - lo < limit {
        let mut grew = false;
        if lo > 0 {
            lo -= 1;
            grew = true;
        }
        if hi - lo < limit && hi < items.len() {
            hi += 1;
            grew = true;
        }
        if !grew {
            break;
        }
    }
    items.truncate(hi);
    items.drain(..lo);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{seed_branch, setup_test_db};
    use testhub_state::branches;

    fn ids(commits: &[Commit]) -> Vec<i64> {
        commits.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_centered_window_middle() {
        let items: Vec<u32> = (0..15).collect();
        assert_eq!(centered_window(items, 7, 7), vec![4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_centered_window_even_limit_leans_earlier() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(centered_window(items, 5, 4), vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_centered_window_edges() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(centered_window(items.clone(), 0, 4), vec![0, 1, 2, 3]);
        assert_eq!(centered_window(items.clone(), 9, 4), vec![6, 7, 8, 9]);
        assert_eq!(centered_window(items, 3, 20).len(), 10);
    }

    #[test]
    fn test_small_branch_returned_whole() {
        let (_dir, conn) = setup_test_db();
        let (branch, commits) = seed_branch(&conn, "main", 4);
        let window = nearby_commits(&conn, &commits[1], &branch, 7).unwrap();
        assert_eq!(ids(&window), ids(&commits));
    }

    #[test]
    fn test_head_rendered_last_regardless_of_time() {
        let (_dir, conn) = setup_test_db();
        let (branch, commits) = seed_branch(&conn, "main", 6);
        branches::set_head(&conn, branch.id, Some(commits[2].id)).unwrap();
        let branch = branches::get_by_id(&conn, branch.id).unwrap().unwrap();

        let window = nearby_commits(&conn, &commits[3], &branch, 10).unwrap();
        assert_eq!(window.len(), 6);
        assert_eq!(window.last().map(|c| c.id), Some(commits[2].id));
        assert_eq!(window[2].id, commits[3].id);
    }

    #[test]
    fn test_identical_times_ordered_by_message() {
        let (_dir, conn) = setup_test_db();
        let branch = branches::ensure_branch(&conn, "main").unwrap();
        let mut zulu = crate::fixtures::new_commit(1, 1_000);
        zulu.message = "zulu".into();
        let mut alpha = crate::fixtures::new_commit(2, 1_000);
        alpha.message = "alpha".into();
        let new_ids = testhub_state::commits::upsert_commits(&conn, &[zulu, alpha]).unwrap();
        memberships::insert_memberships(&conn, branch.id, &new_ids).unwrap();
        let target = testhub_state::commits::get_by_id(&conn, new_ids[0]).unwrap().unwrap();

        let window = nearby_commits(&conn, &target, &branch, 5).unwrap();
        let messages: Vec<&str> = window.iter().map(|c| c.message.as_str()).collect();
        assert_eq!(messages, vec!["alpha", "zulu"]);
    }

    #[test]
    fn test_zero_limit_is_empty() {
        let (_dir, conn) = setup_test_db();
        let (branch, commits) = seed_branch(&conn, "main", 3);
        assert!(nearby_commits(&conn, &commits[0], &branch, 0).unwrap().is_empty());
    }
}
