use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use testhub_core::error::RemoteError;
use testhub_core::time::parse_iso8601;
use testhub_core::types::{NewCommit, short_sha};

/// One element of a commit listing, or the answer of a single-commit lookup.
///
/// Inner fields are optional so one malformed element does not fail the
/// whole page; [`RemoteCommit::to_new_commit`] does the validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCommit {
    #[serde(default)]
    pub sha: String,
    #[serde(default)]
    pub parents: Vec<RemoteParent>,
    #[serde(default)]
    pub commit: Option<CommitDetail>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteParent {
    pub sha: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    #[serde(default)]
    pub author: Option<Signature>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl RemoteCommit {
    pub fn parent_shas(&self) -> Vec<String> {
        self.parents.iter().map(|p| p.sha.clone()).collect()
    }

    /// Validate the record and turn it into a storable commit.
    pub fn to_new_commit(&self) -> Result<NewCommit, RemoteError> {
        let sha = self.sha.trim();
        if sha.is_empty() {
            return Err(RemoteError::malformed("<unknown>", "sha"));
        }
        let detail = self
            .commit
            .as_ref()
            .ok_or_else(|| RemoteError::malformed(sha, "commit"))?;
        let author = detail
            .author
            .as_ref()
            .ok_or_else(|| RemoteError::malformed(sha, "author"))?;
        let name = author
            .name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| RemoteError::malformed(sha, "author.name"))?;
        let email = author
            .email
            .as_deref()
            .ok_or_else(|| RemoteError::malformed(sha, "author.email"))?;
        let commit_time = author
            .date
            .as_deref()
            .and_then(parse_iso8601)
            .ok_or_else(|| RemoteError::malformed(sha, "author.date"))?;
        let message = detail
            .message
            .as_deref()
            .ok_or_else(|| RemoteError::malformed(sha, "message"))?;

        Ok(NewCommit {
            sha: sha.to_string(),
            short_sha: short_sha(sha),
            author: name.to_string(),
            author_email: email.to_string(),
            message: message.to_string(),
            commit_time,
            github_url: self.html_url.clone(),
        })
    }
}

/// An open change request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePull {
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteBranch {
    pub name: String,
    #[serde(default)]
    pub commit: Option<RemoteParent>,
}

impl RemoteBranch {
    pub fn head_sha(&self) -> Option<&str> {
        self.commit.as_ref().map(|c| c.sha.as_str())
    }
}

/// File contents as returned by the remote, base64 with embedded line breaks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFile {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: Option<String>,
}

impl RemoteFile {
    pub fn from_text(text: &str) -> Self {
        Self {
            content: STANDARD.encode(text),
            encoding: Some("base64".to_string()),
        }
    }

    pub fn decoded(&self) -> Result<String, RemoteError> {
        let compact: String = self
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = STANDARD.decode(compact).map_err(RemoteError::decode)?;
        String::from_utf8(bytes).map_err(RemoteError::decode)
    }
}

/// Parameters of a commit listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitQuery {
    /// Branch name or sha to list from.
    pub reference: String,
    pub since: Option<time::OffsetDateTime>,
    pub auto_paginate: bool,
}

impl CommitQuery {
    pub fn all(reference: impl Into<String>) -> Self {
        Self {
            reference: reference.into(),
            since: None,
            auto_paginate: true,
        }
    }

    pub fn since(reference: impl Into<String>, since: time::OffsetDateTime) -> Self {
        Self {
            reference: reference.into(),
            since: Some(since),
            auto_paginate: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> RemoteCommit {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn well_formed_commit_converts() {
        let commit = parse(
            r#"{
                "sha": "0123456789abcdef0123",
                "parents": [{"sha": "ffff"}],
                "commit": {
                    "author": {"name": "Ada", "email": "ada@example.com", "date": "2024-05-01T10:00:00Z"},
                    "message": "Fix solver\n\nDetails"
                },
                "html_url": "https://github.com/o/r/commit/0123456789abcdef0123"
            }"#,
        );
        let new = commit.to_new_commit().unwrap();
        assert_eq!(new.short_sha, "0123456");
        assert_eq!(new.author, "Ada");
        assert_eq!(new.message, "Fix solver\n\nDetails");
        assert_eq!(new.commit_time.unix_timestamp(), 1_714_557_600);
        assert_eq!(commit.parent_shas(), vec!["ffff"]);
    }

    #[test]
    fn missing_fields_are_rejected() {
        let no_author = parse(r#"{"sha": "abc1234", "commit": {"message": "m"}}"#);
        assert!(matches!(
            no_author.to_new_commit(),
            Err(RemoteError::Malformed { field, .. }) if field == "author"
        ));

        let bad_date = parse(
            r#"{"sha": "abc1234", "commit": {"author": {"name": "A", "email": "a@x", "date": "soon"}, "message": "m"}}"#,
        );
        assert!(matches!(
            bad_date.to_new_commit(),
            Err(RemoteError::Malformed { field, .. }) if field == "author.date"
        ));

        let no_message = parse(
            r#"{"sha": "abc1234", "commit": {"author": {"name": "A", "email": "a@x", "date": "2024-05-01T10:00:00Z"}}}"#,
        );
        assert!(no_message.to_new_commit().is_err());

        assert!(RemoteCommit::default().to_new_commit().is_err());
    }

    #[test]
    fn file_content_decodes_across_line_breaks() {
        let file = RemoteFile {
            content: "ZG9fb25lIGZv\nbwpyZXR1cm4K\n".to_string(),
            encoding: Some("base64".to_string()),
        };
        assert_eq!(file.decoded().unwrap(), "do_one foo\nreturn\n");

        let round = RemoteFile::from_text("do_one bar\n");
        assert_eq!(round.decoded().unwrap(), "do_one bar\n");

        let broken = RemoteFile {
            content: "!!!".to_string(),
            encoding: None,
        };
        assert!(matches!(broken.decoded(), Err(RemoteError::Decode(_))));
    }
}
