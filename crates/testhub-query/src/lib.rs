pub mod error;
pub mod navigation;
pub mod nearby;
pub mod pagination;
pub mod resolve;
pub mod summary;

#[cfg(test)]
pub(crate) mod fixtures;

pub use error::QueryError;
pub use navigation::{Navigation, navigation};
pub use nearby::nearby_commits;
pub use pagination::{BranchPage, commits_in_branch};
pub use resolve::{resolve_branch, resolve_commit};
pub use summary::{CommitSummary, commit_summary};
