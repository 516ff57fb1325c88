use testhub_core::error::StateError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("commit not found: {reference}")]
    CommitNotFound { reference: String },
    #[error("branch not found: {name}")]
    BranchNotFound { name: String },
    #[error("branch {name} has no commits")]
    EmptyBranch { name: String },
    #[error("state error: {0}")]
    State(#[from] StateError),
}

impl QueryError {
    pub fn commit_not_found(reference: impl Into<String>) -> Self {
        Self::CommitNotFound {
            reference: reference.into(),
        }
    }
}
