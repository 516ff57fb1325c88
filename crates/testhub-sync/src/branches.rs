use crate::engine::{SyncEngine, SyncReport};
use rusqlite::Connection;
use std::collections::HashMap;
use testhub_core::error::{StateError, SyncError};
use testhub_remote::{RemoteBranch, RemoteSource};
use testhub_state::{branches, commits, memberships};
use tracing::{debug, info};

impl<R: RemoteSource + ?Sized> SyncEngine<'_, R> {
    /// Make sure every branch the remote lists exists locally, and mark known
    /// branches the remote no longer lists as merged. Returns the listing.
    pub fn refresh_branch_names(&self, conn: &Connection) -> Result<Vec<RemoteBranch>, SyncError> {
        let listed = self.remote.list_branches(self.repo())?;
        for remote_branch in &listed {
            branches::ensure_branch(conn, &remote_branch.name)?;
        }
        for branch in branches::list_branches(conn)? {
            if !branch.merged && !listed.iter().any(|b| b.name == branch.name) {
                info!(branch = %branch.name, "Branch no longer on remote; marking merged");
                branches::set_merged(conn, branch.id, true)?;
            }
        }
        debug!(count = listed.len(), "Refreshed branch names");
        Ok(listed)
    }

    /// Derive head and merged state for every known branch.
    ///
    /// A listed branch other than the default branch is merged when its head
    /// is a member of the default branch. On that transition, every commit of
    /// the branch is added to the default branch.
    pub fn update_branches(
        &self,
        conn: &mut Connection,
        listed: &[RemoteBranch],
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let default = branches::ensure_branch(conn, &self.settings.default_branch)?;
        let remote_heads: HashMap<&str, &str> = listed
            .iter()
            .filter_map(|b| b.head_sha().map(|sha| (b.name.as_str(), sha)))
            .collect();

        for branch in branches::list_branches(conn)? {
            let tx = conn.transaction().map_err(StateError::sqlite)?;
            let listed_head = match remote_heads.get(branch.name.as_str()) {
                Some(sha) => commits::get_by_sha(&tx, sha)?.map(|c| c.id),
                None => None,
            };
            let head_id = match listed_head {
                Some(id) => Some(id),
                None => memberships::highest_position_commit(&tx, branch.id)?.map(|c| c.id),
            };
            if head_id != branch.head_id {
                branches::set_head(&tx, branch.id, head_id)?;
            }

            let is_listed = listed.iter().any(|b| b.name == branch.name);
            if branch.id != default.id && is_listed {
                let merged = match head_id {
                    Some(head) => memberships::is_member(&tx, default.id, head)?,
                    None => false,
                };
                if merged && !branch.merged {
                    let ids = memberships::commit_ids_for_branch(&tx, branch.id)?;
                    let added = memberships::insert_memberships(&tx, default.id, &ids)?;
                    memberships::renumber_positions(&tx, default.id)?;
                    info!(
                        branch = %branch.name,
                        into = %default.name,
                        memberships = added,
                        "Branch merged"
                    );
                    report.branches_merged.push(branch.name.clone());
                }
                if merged != branch.merged {
                    branches::set_merged(&tx, branch.id, merged)?;
                }
            }
            tx.commit().map_err(StateError::sqlite)?;
        }
        Ok(())
    }
}
