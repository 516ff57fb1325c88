use crate::types::{CommitQuery, RemoteBranch, RemoteCommit, RemoteFile, RemotePull};
use testhub_core::error::RemoteError;

/// Read-only view of the hosted repository the commit graph is mirrored from.
///
/// A missing ref or file is reported as [`RemoteError::NotFound`]; every other
/// error is a hard failure for the current sync pass.
pub trait RemoteSource: Send + Sync {
    fn list_branches(&self, repo: &str) -> Result<Vec<RemoteBranch>, RemoteError>;

    /// Commits reachable from `query.reference`, newest first.
    fn list_commits(&self, repo: &str, query: &CommitQuery)
    -> Result<Vec<RemoteCommit>, RemoteError>;

    fn list_open_pulls(&self, repo: &str) -> Result<Vec<RemotePull>, RemoteError>;

    fn get_commit(&self, repo: &str, sha: &str) -> Result<RemoteCommit, RemoteError>;

    fn get_file_content(
        &self,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<RemoteFile, RemoteError>;
}
