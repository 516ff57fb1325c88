pub mod adapter;
pub mod github;
pub mod types;

pub use adapter::RemoteSource;
pub use github::GitHubClient;
pub use types::{
    CommitDetail, CommitQuery, RemoteBranch, RemoteCommit, RemoteFile, RemoteParent, RemotePull,
    Signature,
};
