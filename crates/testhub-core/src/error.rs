use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("invalid config value: {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("sqlite error: {0}")]
    Sqlite(String),

    #[error("commit not found: {sha}")]
    CommitNotFound { sha: String },

    #[error("branch not found: {name}")]
    BranchNotFound { name: String },

    #[error("schema migration required: current={current}, required={required}")]
    SchemaMigrationRequired { current: u32, required: u32 },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StateError {
    /// Convenience constructor for SQLite errors, used as `.map_err(StateError::sqlite)`.
    pub fn sqlite<E: std::fmt::Display>(e: E) -> Self {
        Self::Sqlite(e.to_string())
    }

    pub fn commit_not_found(sha: impl Into<String>) -> Self {
        Self::CommitNotFound { sha: sha.into() }
    }

    pub fn branch_not_found(name: impl Into<String>) -> Self {
        Self::BranchNotFound { name: name.into() }
    }
}

/// Failures reported by the remote source client.
#[derive(Error, Debug)]
pub enum RemoteError {
    /// 404-class answer. Callers treat this as a soft signal (deleted branch, absent file).
    #[error("remote resource not found: {resource}")]
    NotFound { resource: String },

    #[error("remote http error: status={status}, url={url}")]
    Http { status: u16, url: String },

    #[error("remote transport error: {0}")]
    Transport(String),

    #[error("remote payload decode error: {0}")]
    Decode(String),

    #[error("malformed commit record {sha}: missing or invalid {field}")]
    Malformed { sha: String, field: String },
}

impl RemoteError {
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn transport<E: std::fmt::Display>(e: E) -> Self {
        Self::Transport(e.to_string())
    }

    pub fn decode<E: std::fmt::Display>(e: E) -> Self {
        Self::Decode(e.to_string())
    }

    pub fn malformed(sha: impl Into<String>, field: impl Into<String>) -> Self {
        Self::Malformed {
            sha: sha.into(),
            field: field.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Remote(#[from] RemoteError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected() {
        assert!(RemoteError::not_found("branches/gone").is_not_found());
        assert!(!RemoteError::transport("reset by peer").is_not_found());
    }

    #[test]
    fn sync_error_wraps_both_sides() {
        let err: SyncError = StateError::sqlite("disk I/O error").into();
        assert_eq!(err.to_string(), "sqlite error: disk I/O error");
        let err: SyncError = RemoteError::Http {
            status: 502,
            url: "https://api.github.com/repos/o/r/commits".into(),
        }
        .into();
        assert!(err.to_string().contains("status=502"));
    }
}
