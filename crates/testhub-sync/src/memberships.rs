use crate::engine::{SyncEngine, SyncReport};
use rusqlite::Connection;
use testhub_core::error::{StateError, SyncError};
use testhub_core::types::Branch;
use testhub_remote::{CommitQuery, RemoteSource};
use testhub_state::{branches, commits, memberships};
use tracing::{info, warn};

impl<R: RemoteSource + ?Sized> SyncEngine<'_, R> {
    /// Add missing memberships for commits that are already stored, using the
    /// complete remote history of a branch (every listed branch when `None`).
    ///
    /// Returns the number of memberships added.
    pub fn refresh_memberships(
        &self,
        conn: &mut Connection,
        branch: Option<&str>,
    ) -> Result<usize, SyncError> {
        match branch {
            Some(name) => {
                let branch = branches::get_by_name(conn, name)?
                    .ok_or_else(|| StateError::branch_not_found(name))?;
                self.refresh_branch_memberships(conn, &branch)
            }
            None => {
                let listed = self.refresh_branch_names(conn)?;
                let mut added = 0;
                for remote_branch in &listed {
                    if let Some(branch) = branches::get_by_name(conn, &remote_branch.name)? {
                        added += self.refresh_branch_memberships(conn, &branch)?;
                    }
                }
                self.update_branches(conn, &listed, &mut SyncReport::default())?;
                Ok(added)
            }
        }
    }

    fn refresh_branch_memberships(
        &self,
        conn: &mut Connection,
        branch: &Branch,
    ) -> Result<usize, SyncError> {
        let fetched = match self
            .remote
            .list_commits(self.repo(), &CommitQuery::all(&branch.name))
        {
            Ok(fetched) => fetched,
            Err(err) if err.is_not_found() => {
                warn!(branch = %branch.name, "Branch not found on remote; marking merged");
                branches::set_merged(conn, branch.id, true)?;
                return Ok(0);
            }
            Err(err) => return Err(err.into()),
        };

        let shas: Vec<String> = fetched.into_iter().map(|c| c.sha).collect();
        let ids: Vec<i64> = commits::ids_for_shas(conn, &shas)?.into_values().collect();

        let tx = conn.transaction().map_err(StateError::sqlite)?;
        let added = memberships::insert_memberships(&tx, branch.id, &ids)?;
        if added > 0 {
            memberships::renumber_positions(&tx, branch.id)?;
        }
        tx.commit().map_err(StateError::sqlite)?;

        info!(branch = %branch.name, added, "Refreshed memberships");
        Ok(added)
    }
}
