use crate::mapper::{self, DiscoveredCases};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use testhub_core::config::{Config, TestCasesConfig};
use testhub_core::constants::{LOOKBACK_CAP_DAYS, LOOKBACK_GROWTH_FACTOR};
use testhub_core::error::{StateError, SyncError};
use testhub_core::types::{Branch, Commit, NewCommit};
use testhub_remote::{CommitQuery, RemoteCommit, RemoteSource};
use testhub_state::{branches, commits, memberships};
use time::Duration;
use tracing::{debug, info, warn};

/// What the engine needs to know about the mirrored repository.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    pub repo_path: String,
    pub default_branch: String,
    pub test_cases: TestCasesConfig,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            repo_path: config.remote.repo_path.clone(),
            default_branch: config.sync.default_branch.clone(),
            test_cases: config.test_cases.clone(),
        }
    }
}

/// Result of syncing a single branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BranchOutcome {
    /// The remote does not know the branch; it was marked merged.
    Missing,
    /// No overlap with local history even at the widest lookback.
    LookbackExhausted { days_before: i64 },
    /// Every fetched commit was already a member.
    UpToDate,
    Synced {
        commits: usize,
        memberships: usize,
        mapped: usize,
    },
}

/// Counters accumulated over one sync pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub branches_synced: usize,
    pub commits_upserted: usize,
    pub memberships_added: usize,
    pub commits_mapped: usize,
    pub rejected: usize,
    pub branches_missing: Vec<String>,
    pub lookback_exhausted: Vec<String>,
    pub pulls_opened: usize,
    pub pulls_closed: usize,
    pub branches_merged: Vec<String>,
}

impl SyncReport {
    pub(crate) fn record_branch(&mut self, branch: &str, outcome: &BranchOutcome) {
        self.branches_synced += 1;
        match outcome {
            BranchOutcome::Missing => self.branches_missing.push(branch.to_string()),
            BranchOutcome::LookbackExhausted { .. } => {
                self.lookback_exhausted.push(branch.to_string())
            }
            BranchOutcome::UpToDate => {}
            BranchOutcome::Synced {
                commits,
                memberships,
                mapped,
            } => {
                self.commits_upserted += commits;
                self.memberships_added += memberships;
                self.commits_mapped += mapped;
            }
        }
    }
}

/// Mirrors the remote commit graph into the local store.
///
/// Holds the remote client by reference; the caller owns its lifecycle.
pub struct SyncEngine<'a, R: RemoteSource + ?Sized> {
    pub(crate) remote: &'a R,
    pub(crate) settings: SyncSettings,
}

impl<'a, R: RemoteSource + ?Sized> SyncEngine<'a, R> {
    pub fn new(remote: &'a R, settings: SyncSettings) -> Self {
        Self { remote, settings }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub(crate) fn repo(&self) -> &str {
        &self.settings.repo_path
    }

    /// Sync one branch, or every branch followed by change requests and
    /// branch head/merge derivation when `branch` is `None`.
    pub fn sync_tree(
        &self,
        conn: &mut Connection,
        branch: Option<&str>,
        force: bool,
        days_before: i64,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        match branch {
            Some(name) => {
                let branch = branches::ensure_branch(conn, name)?;
                let outcome = self.sync_branch(conn, &branch, force, days_before, &mut report)?;
                report.record_branch(&branch.name, &outcome);
            }
            None => {
                let listed = self.refresh_branch_names(conn)?;
                for remote_branch in &listed {
                    let Some(branch) = branches::get_by_name(conn, &remote_branch.name)? else {
                        continue;
                    };
                    let outcome =
                        self.sync_branch(conn, &branch, force, days_before, &mut report)?;
                    report.record_branch(&branch.name, &outcome);
                }
                self.reconcile_pull_requests(conn, &mut report)?;
                self.update_branches(conn, &listed, &mut report)?;
            }
        }
        info!(
            branches = report.branches_synced,
            commits = report.commits_upserted,
            memberships = report.memberships_added,
            mapped = report.commits_mapped,
            "Sync finished"
        );
        Ok(report)
    }

    /// Sync a single branch with adaptive lookback.
    pub fn sync_branch(
        &self,
        conn: &mut Connection,
        branch: &Branch,
        force: bool,
        days_before: i64,
        report: &mut SyncReport,
    ) -> Result<BranchOutcome, SyncError> {
        let local_shas = memberships::shas_for_branch(conn, branch.id)?;
        let latest = memberships::latest_commit_time(conn, branch.id)?;
        let mut days = days_before.max(1);

        let fetched = loop {
            let query = match latest {
                Some(latest) if !force => {
                    CommitQuery::since(&branch.name, latest - Duration::days(days))
                }
                _ => CommitQuery::all(&branch.name),
            };
            debug!(branch = %branch.name, days_before = days, since = ?query.since, "Listing remote commits");
            let fetched = match self.remote.list_commits(self.repo(), &query) {
                Ok(fetched) => fetched,
                Err(err) if err.is_not_found() => {
                    warn!(branch = %branch.name, "Branch not found on remote; marking merged");
                    branches::set_merged(conn, branch.id, true)?;
                    return Ok(BranchOutcome::Missing);
                }
                Err(err) => return Err(err.into()),
            };

            if force || local_shas.is_empty() {
                break fetched;
            }
            if fetched.iter().any(|c| local_shas.contains(&c.sha)) {
                break fetched
                    .into_iter()
                    .filter(|c| !local_shas.contains(&c.sha))
                    .collect::<Vec<_>>();
            }
            if days >= LOOKBACK_CAP_DAYS {
                info!(branch = %branch.name, days_before = days, "No overlap at lookback cap; branch sync halted");
                return Ok(BranchOutcome::LookbackExhausted { days_before: days });
            }
            let widened = (days * LOOKBACK_GROWTH_FACTOR).min(LOOKBACK_CAP_DAYS);
            info!(branch = %branch.name, from = days, to = widened, "No overlap with local history; widening lookback");
            days = widened;
        };

        if fetched.is_empty() {
            debug!(branch = %branch.name, "Branch already up to date");
            return Ok(BranchOutcome::UpToDate);
        }

        let new_commits = self.validate_commits(&fetched, report);
        if new_commits.is_empty() {
            return Ok(BranchOutcome::UpToDate);
        }

        // Test lists are fetched before the write; a failed lookup stores nothing.
        let pending: Vec<String> = new_commits
            .iter()
            .filter_map(|c| match commits::get_by_sha(conn, &c.sha) {
                Ok(Some(stored)) if stored.scalars.test_case_count > 0 => None,
                Ok(_) => Some(Ok(c.sha.clone())),
                Err(err) => Some(Err(err)),
            })
            .collect::<Result<_, _>>()?;
        let discovered = self.discover(&pending)?;

        let tx = conn.transaction().map_err(StateError::sqlite)?;
        let ids = commits::upsert_commits(&tx, &new_commits)?;
        let skipped = new_commits.len() - ids.len();
        if skipped > 0 {
            warn!(branch = %branch.name, skipped, "Commits skipped on short sha collision");
            report.rejected += skipped;
        }
        let added = memberships::insert_memberships(&tx, branch.id, &ids)?;
        memberships::renumber_positions(&tx, branch.id)?;
        let unmapped = commits::with_zero_test_cases(&tx, &ids)?;
        let mapped = materialize(&tx, &unmapped, &discovered)?;
        tx.commit().map_err(StateError::sqlite)?;

        info!(
            branch = %branch.name,
            commits = ids.len(),
            memberships = added,
            mapped,
            "Branch synced"
        );
        Ok(BranchOutcome::Synced {
            commits: ids.len(),
            memberships: added,
            mapped,
        })
    }

    /// Convert remote records oldest first, dropping malformed ones.
    pub(crate) fn validate_commits(
        &self,
        fetched: &[RemoteCommit],
        report: &mut SyncReport,
    ) -> Vec<NewCommit> {
        let mut seen = HashSet::new();
        let mut out = Vec::with_capacity(fetched.len());
        for remote in fetched.iter().rev() {
            match remote.to_new_commit() {
                Ok(commit) => {
                    if seen.insert(commit.sha.clone()) {
                        out.push(commit);
                    }
                }
                Err(err) => {
                    warn!(error = %err, "Rejected remote commit record");
                    report.rejected += 1;
                }
            }
        }
        out
    }

    /// Discover and materialize test cases for commits that have none yet.
    ///
    /// Remote lookups run first; all store writes then happen in one transaction.
    /// Returns the number of commits that received test cases.
    pub fn populate_test_cases(
        &self,
        conn: &mut Connection,
        commit_ids: &[i64],
    ) -> Result<usize, SyncError> {
        let unmapped = commits::with_zero_test_cases(conn, commit_ids)?;
        let shas: Vec<String> = unmapped.iter().map(|c| c.sha.clone()).collect();
        let discovered = self.discover(&shas)?;

        let tx = conn.transaction().map_err(StateError::sqlite)?;
        let mapped = materialize(&tx, &unmapped, &discovered)?;
        tx.commit().map_err(StateError::sqlite)?;
        Ok(mapped)
    }

    fn discover(&self, shas: &[String]) -> Result<HashMap<String, DiscoveredCases>, SyncError> {
        let mut discovered = HashMap::with_capacity(shas.len());
        for sha in shas {
            let cases =
                mapper::discover_test_cases(self.remote, self.repo(), &self.settings.test_cases, sha)?;
            discovered.insert(sha.clone(), cases);
        }
        Ok(discovered)
    }

    /// Populate test cases for every stored commit that still has none.
    pub fn populate_missing_test_cases(&self, conn: &mut Connection) -> Result<usize, SyncError> {
        let ids = commits::ids_with_zero_test_cases(conn)?;
        self.populate_test_cases(conn, &ids)
    }
}

/// Write discovered test cases for `unmapped`. Returns how many commits got any.
fn materialize(
    conn: &Connection,
    unmapped: &[Commit],
    discovered: &HashMap<String, DiscoveredCases>,
) -> Result<usize, SyncError> {
    let mut mapped = 0;
    for commit in unmapped {
        let Some(cases) = discovered.get(&commit.sha) else {
            continue;
        };
        let count = mapper::materialize_test_cases(conn, commit.id, cases)?;
        debug!(sha = %commit.sha, test_cases = count, "Populated test cases");
        if count > 0 {
            mapped += 1;
        }
    }
    Ok(mapped)
}
