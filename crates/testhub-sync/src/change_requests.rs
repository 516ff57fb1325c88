use crate::engine::{SyncEngine, SyncReport};
use rusqlite::Connection;
use std::collections::HashSet;
use testhub_core::error::{StateError, SyncError};
use testhub_remote::{RemotePull, RemoteSource};
use testhub_state::{commits, memberships};
use tracing::{debug, info, warn};

impl<R: RemoteSource + ?Sized> SyncEngine<'_, R> {
    /// Close local change requests the remote no longer reports open and
    /// create commits for newly opened ones.
    ///
    /// A new change-request commit joins every branch one of its parents
    /// already belongs to, never the branches its parents would imply remotely.
    pub fn reconcile_pull_requests(
        &self,
        conn: &mut Connection,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let pulls = self.remote.list_open_pulls(self.repo())?;
        let open: Vec<(&str, &RemotePull)> = pulls
            .iter()
            .filter_map(|p| p.merge_commit_sha.as_deref().map(|sha| (sha, p)))
            .filter(|(sha, _)| !sha.trim().is_empty())
            .collect();

        let open_shas: HashSet<String> = open.iter().map(|(sha, _)| sha.to_string()).collect();
        let closed = commits::close_pull_requests_except(conn, &open_shas)?;
        report.pulls_closed += closed;

        let shas: Vec<String> = open_shas.iter().cloned().collect();
        let known = commits::pull_request_shas_among(conn, &shas)?;

        let mut created = HashSet::new();
        let mut to_map = Vec::new();
        for (sha, pull) in open {
            if known.contains(sha) || !created.insert(sha) {
                continue;
            }
            if let Some(id) = self.create_pull_request_commit(conn, sha, pull, report)? {
                to_map.push(id);
            }
        }

        let unmapped: Vec<i64> = commits::with_zero_test_cases(conn, &to_map)?
            .into_iter()
            .map(|c| c.id)
            .collect();
        report.commits_mapped += self.populate_test_cases(conn, &unmapped)?;

        info!(
            open = open_shas.len(),
            opened = to_map.len(),
            closed,
            "Reconciled change requests"
        );
        Ok(())
    }

    fn create_pull_request_commit(
        &self,
        conn: &mut Connection,
        sha: &str,
        pull: &RemotePull,
        report: &mut SyncReport,
    ) -> Result<Option<i64>, SyncError> {
        let remote = match self.remote.get_commit(self.repo(), sha) {
            Ok(remote) => remote,
            Err(err) if err.is_not_found() => {
                warn!(sha, title = %pull.title, "Change-request commit not found on remote; skipped");
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };
        let new_commit = match remote.to_new_commit() {
            Ok(commit) => commit,
            Err(err) => {
                warn!(error = %err, "Rejected change-request commit record");
                report.rejected += 1;
                return Ok(None);
            }
        };

        let tx = conn.transaction().map_err(StateError::sqlite)?;
        let Some(id) = commits::upsert_commits(&tx, &[new_commit])?.first().copied() else {
            return Ok(None);
        };
        let parent_ids: Vec<i64> = commits::ids_for_shas(&tx, &remote.parent_shas())?
            .into_values()
            .collect();
        let branch_ids = memberships::branch_ids_for_commits(&tx, &parent_ids)?;
        for branch_id in &branch_ids {
            report.memberships_added += memberships::insert_memberships(&tx, *branch_id, &[id])?;
            memberships::renumber_positions(&tx, *branch_id)?;
        }
        commits::mark_open_pull_request(&tx, id, &pull.title, pull.html_url.as_deref())?;
        tx.commit().map_err(StateError::sqlite)?;

        report.pulls_opened += 1;
        report.commits_upserted += 1;
        debug!(sha, branches = branch_ids.len(), "Created change-request commit");
        Ok(Some(id))
    }
}
