#![allow(dead_code)]

use rusqlite::Connection;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use tempfile::TempDir;
use testhub_core::config::TestCasesConfig;
use testhub_core::error::RemoteError;
use testhub_core::time::{format_iso8601, from_unix, parse_iso8601};
use testhub_remote::{
    CommitDetail, CommitQuery, RemoteBranch, RemoteCommit, RemoteFile, RemoteParent, RemotePull,
    RemoteSource, Signature,
};
use testhub_sync::SyncSettings;
use time::OffsetDateTime;

pub const BASE: i64 = 1_700_000_000;
pub const HOUR: i64 = 3_600;
pub const DAY: i64 = 86_400;
pub const REPO: &str = "acme/stellar";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListBranches,
    ListCommits {
        reference: String,
        since: Option<OffsetDateTime>,
    },
    ListOpenPulls,
    GetCommit(String),
    GetFile {
        path: String,
        reference: String,
    },
}

#[derive(Default)]
struct FakeState {
    /// Branch histories, newest first.
    branches: BTreeMap<String, Vec<RemoteCommit>>,
    pulls: Vec<RemotePull>,
    commits: HashMap<String, RemoteCommit>,
    files: HashMap<(String, String), String>,
    /// File fetches left to fail with a transport error.
    failing_fetches: usize,
    calls: Vec<Call>,
}

/// In-memory remote with a call log.
#[derive(Default)]
pub struct FakeRemote {
    state: Mutex<FakeState>,
}

pub fn remote_commit(sha: &str, unix: i64, parents: &[&str]) -> RemoteCommit {
    RemoteCommit {
        sha: sha.to_string(),
        parents: parents
            .iter()
            .map(|p| RemoteParent { sha: p.to_string() })
            .collect(),
        commit: Some(CommitDetail {
            author: Some(Signature {
                name: Some("Bill Paxton".to_string()),
                email: Some("paxton@example.com".to_string()),
                date: Some(format_iso8601(from_unix(unix))),
            }),
            message: Some(format!("Commit {sha}")),
        }),
        html_url: Some(format!("https://github.com/{REPO}/commit/{sha}")),
    }
}

/// 40-character hash with a readable prefix, unique in its first 7 characters.
pub fn sha(prefix: &str) -> String {
    format!("{prefix:0<7}{}", "f".repeat(33))
}

fn commit_time(commit: &RemoteCommit) -> Option<OffsetDateTime> {
    commit
        .commit
        .as_ref()
        .and_then(|c| c.author.as_ref())
        .and_then(|a| a.date.as_deref())
        .and_then(parse_iso8601)
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace a branch history. `commits` are given oldest first.
    pub fn set_branch(&self, name: &str, commits: Vec<RemoteCommit>) {
        let mut state = self.state.lock().unwrap();
        for commit in &commits {
            state.commits.insert(commit.sha.clone(), commit.clone());
        }
        let mut newest_first = commits;
        newest_first.reverse();
        state.branches.insert(name.to_string(), newest_first);
    }

    pub fn remove_branch(&self, name: &str) {
        self.state.lock().unwrap().branches.remove(name);
    }

    pub fn add_commit(&self, commit: RemoteCommit) {
        self.state
            .lock()
            .unwrap()
            .commits
            .insert(commit.sha.clone(), commit);
    }

    pub fn set_pulls(&self, pulls: Vec<RemotePull>) {
        self.state.lock().unwrap().pulls = pulls;
    }

    pub fn set_test_list(&self, module: &str, sha: &str, text: &str) {
        let path = TestCasesConfig::default().test_list_path_for(module);
        self.state
            .lock()
            .unwrap()
            .files
            .insert((path, sha.to_string()), text.to_string());
    }

    /// Fail the next `n` file fetches as if rate limited.
    pub fn fail_file_fetches(&self, n: usize) {
        self.state.lock().unwrap().failing_fetches = n;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    /// `since` arguments of commit listings for one branch, in call order.
    pub fn since_args(&self, branch: &str) -> Vec<Option<OffsetDateTime>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::ListCommits { reference, since } if reference == branch => Some(since),
                _ => None,
            })
            .collect()
    }
}

impl RemoteSource for FakeRemote {
    fn list_branches(&self, _repo: &str) -> Result<Vec<RemoteBranch>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListBranches);
        Ok(state
            .branches
            .iter()
            .map(|(name, commits)| RemoteBranch {
                name: name.clone(),
                commit: commits.first().map(|c| RemoteParent { sha: c.sha.clone() }),
            })
            .collect())
    }

    fn list_commits(
        &self,
        _repo: &str,
        query: &CommitQuery,
    ) -> Result<Vec<RemoteCommit>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListCommits {
            reference: query.reference.clone(),
            since: query.since,
        });
        let history = state
            .branches
            .get(&query.reference)
            .ok_or_else(|| RemoteError::not_found(format!("branch {}", query.reference)))?;
        Ok(history
            .iter()
            .filter(|c| match (query.since, commit_time(c)) {
                (Some(since), Some(t)) => t >= since,
                _ => true,
            })
            .cloned()
            .collect())
    }

    fn list_open_pulls(&self, _repo: &str) -> Result<Vec<RemotePull>, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::ListOpenPulls);
        Ok(state.pulls.clone())
    }

    fn get_commit(&self, _repo: &str, sha: &str) -> Result<RemoteCommit, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetCommit(sha.to_string()));
        state
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(format!("commit {sha}")))
    }

    fn get_file_content(
        &self,
        _repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<RemoteFile, RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::GetFile {
            path: path.to_string(),
            reference: reference.to_string(),
        });
        if state.failing_fetches > 0 {
            state.failing_fetches -= 1;
            return Err(RemoteError::transport("rate limited"));
        }
        state
            .files
            .get(&(path.to_string(), reference.to_string()))
            .map(|text| RemoteFile::from_text(text))
            .ok_or_else(|| RemoteError::not_found(path.to_string()))
    }
}

pub fn settings() -> SyncSettings {
    SyncSettings {
        repo_path: REPO.to_string(),
        default_branch: "main".to_string(),
        test_cases: TestCasesConfig {
            modules: vec!["star".to_string(), "binary".to_string()],
            ..TestCasesConfig::default()
        },
    }
}

pub fn open_db() -> (TempDir, Connection) {
    let dir = tempfile::tempdir().unwrap();
    let conn = testhub_state::db::open_connection(&dir.path().join("state.db")).unwrap();
    testhub_state::schema::create_tables(&conn).unwrap();
    (dir, conn)
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}
