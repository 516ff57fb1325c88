use crate::error::QueryError;
use crate::nearby::nearby_commits;
use rusqlite::Connection;
use serde::Serialize;
use testhub_core::constants::NAVIGATION_WINDOW;
use testhub_core::types::{Branch, Commit};

/// Neighbours of a commit within a branch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
    /// The next commit in rendering order, i.e. the one shown above.
    pub next: Option<Commit>,
    pub previous: Option<Commit>,
}

pub fn navigation(
    conn: &Connection,
    commit: &Commit,
    branch: &Branch,
) -> Result<Navigation, QueryError> {
    let mut window = nearby_commits(conn, commit, branch, NAVIGATION_WINDOW)?;
    window.reverse();
    Ok(neighbours(&window, commit.id))
}

/// Previous/next around `id` in a newest-first list.
fn neighbours(newest_first: &[Commit], id: i64) -> Navigation {
    let Some(loc) = newest_first.iter().position(|c| c.id == id) else {
        return Navigation::default();
    };
    Navigation {
        next: loc
            .checked_sub(1)
            .and_then(|i| newest_first.get(i))
            .cloned(),
        previous: newest_first.get(loc + 1).cloned(),
    }
}
