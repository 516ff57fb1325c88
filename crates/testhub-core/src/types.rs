use ::time::OffsetDateTime;
use serde::{Deserialize, Serialize};

use crate::constants::SHORT_SHA_LEN;

/// Rollup status shared by commits and test-case commits.
///
/// Persisted as a small integer; see [`TestStatus::code`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    Untested,
    Passing,
    Failing,
    ChecksumMismatch,
    Mixed,
}

impl TestStatus {
    pub const fn code(self) -> i64 {
        match self {
            Self::Untested => -1,
            Self::Passing => 0,
            Self::Failing => 1,
            Self::ChecksumMismatch => 2,
            Self::Mixed => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Untested),
            0 => Some(Self::Passing),
            1 => Some(Self::Failing),
            2 => Some(Self::ChecksumMismatch),
            3 => Some(Self::Mixed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Untested => "untested",
            Self::Passing => "passing",
            Self::Failing => "failing",
            Self::ChecksumMismatch => "checksum_mismatch",
            Self::Mixed => "mixed",
        }
    }

    /// Apply the rollup precedence: mixed, failing, checksum mismatch, passing, untested.
    pub fn from_counts(counts: &StatusCounts) -> Self {
        if counts.mixed > 0 {
            Self::Mixed
        } else if counts.failed > 0 {
            Self::Failing
        } else if counts.checksum > 0 {
            Self::ChecksumMismatch
        } else if counts.total > 0 && counts.passed == counts.total {
            Self::Passing
        } else {
            Self::Untested
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Passing => "All tests passing on all computers.",
            Self::Mixed => "Some tests fail on some computers and pass on others.",
            Self::Failing => "Some tests fail with all computers.",
            Self::ChecksumMismatch => {
                "Some tests pass with different checksums on different computers."
            }
            Self::Untested => "At least some test cases not tested.",
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts fed into [`TestStatus::from_counts`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: i64,
    pub passed: i64,
    pub failed: i64,
    pub checksum: i64,
    pub mixed: i64,
}

/// Compilation outcome across a commit's submissions. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompilationStatus {
    Unknown,
    Success,
    Failure,
    Mixed,
}

impl CompilationStatus {
    pub const fn code(self) -> i64 {
        match self {
            Self::Unknown => -1,
            Self::Success => 0,
            Self::Failure => 1,
            Self::Mixed => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            -1 => Some(Self::Unknown),
            0 => Some(Self::Success),
            1 => Some(Self::Failure),
            2 => Some(Self::Mixed),
            _ => None,
        }
    }

    /// Derive the status from the distinct non-null `compiled` flags.
    pub fn from_flags(flags: &[bool]) -> Self {
        let any_true = flags.iter().any(|f| *f);
        let any_false = flags.iter().any(|f| !*f);
        match (any_true, any_false) {
            (false, false) => Self::Unknown,
            (true, false) => Self::Success,
            (false, true) => Self::Failure,
            (true, true) => Self::Mixed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Mixed => "mixed",
        }
    }
}

impl std::fmt::Display for CompilationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Commit metadata as observed on the remote, ready to be upserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCommit {
    pub sha: String,
    pub short_sha: String,
    pub author: String,
    pub author_email: String,
    pub message: String,
    #[serde(with = "::time::serde::rfc3339")]
    pub commit_time: OffsetDateTime,
    pub github_url: Option<String>,
}

/// First seven characters of a hash.
pub fn short_sha(sha: &str) -> String {
    sha.chars().take(SHORT_SHA_LEN).collect()
}

/// Derived rollup scalars owned by the status aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitScalars {
    pub test_case_count: i64,
    pub passed_count: i64,
    pub failed_count: i64,
    pub mixed_count: i64,
    pub checksum_count: i64,
    pub untested_count: i64,
    pub computer_count: i64,
    pub complete_computer_count: i64,
    pub status: TestStatus,
}

impl Default for CommitScalars {
    fn default() -> Self {
        Self {
            test_case_count: 0,
            passed_count: 0,
            failed_count: 0,
            mixed_count: 0,
            checksum_count: 0,
            untested_count: 0,
            computer_count: 0,
            complete_computer_count: 0,
            status: TestStatus::Untested,
        }
    }
}

/// A stored commit row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: i64,
    pub sha: String,
    pub short_sha: String,
    pub author: String,
    pub author_email: String,
    pub message: String,
    #[serde(with = "::time::serde::rfc3339")]
    pub commit_time: OffsetDateTime,
    pub github_url: Option<String>,
    pub pull_request: bool,
    pub open: bool,
    pub scalars: CommitScalars,
}

impl Commit {
    /// First line of the message, cut at a word boundary with an ellipsis when it
    /// does not fit in `max_len` characters.
    pub fn message_first_line(&self, max_len: usize) -> String {
        first_line_of(&self.message, max_len)
    }

    /// Remainder of the message not shown by [`Commit::message_first_line`].
    pub fn message_rest(&self, max_len: usize) -> Option<String> {
        let first = self.message_first_line(max_len);
        if first == self.message {
            return None;
        }
        let shown = first.strip_suffix("...").unwrap_or(&first);
        let rest = if self.message.starts_with(shown) {
            self.message.get(shown.len()..).unwrap_or_default()
        } else {
            self.message
                .split_once('\n')
                .map(|(_, tail)| tail)
                .unwrap_or_default()
        };
        let rest = rest.trim();
        if rest.is_empty() {
            None
        } else {
            Some(format!("...{rest}"))
        }
    }
}

impl std::fmt::Display for Commit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.short_sha)
    }
}

fn first_line_of(message: &str, max_len: usize) -> String {
    let first_line = message.lines().next().unwrap_or_default();
    if first_line.chars().count() < max_len {
        return first_line.to_string();
    }
    let mut res = String::new();
    for word in first_line.split_whitespace() {
        let candidate_len = if res.is_empty() {
            word.chars().count()
        } else {
            res.chars().count() + 1 + word.chars().count()
        };
        if candidate_len + 3 > max_len {
            res.push_str("...");
            return res;
        }
        if !res.is_empty() {
            res.push(' ');
        }
        res.push_str(word);
    }
    res
}

/// A stored branch row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: i64,
    pub name: String,
    pub head_id: Option<i64>,
    pub merged: bool,
}

/// Association of a commit with a branch, ordered by `position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchMembership {
    pub branch_id: i64,
    pub commit_id: i64,
    pub position: Option<i64>,
}

/// Catalog entry for a test case, unique per module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: i64,
    pub module: String,
    pub name: String,
}

/// Outcome of one test case at one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseCommit {
    pub id: i64,
    pub commit_id: i64,
    pub test_case_id: i64,
    pub status: TestStatus,
    pub passed_count: i64,
    pub failed_count: i64,
    pub checksum_count: i64,
    pub computer_count: i64,
    pub last_tested: Option<String>,
}

/// Build environment descriptors that identify a computer configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComputerSpec {
    pub platform_version: Option<String>,
    pub sdk_version: Option<String>,
    pub math_backend: Option<String>,
    pub compiler: Option<String>,
    pub compiler_version: Option<String>,
}

impl std::fmt::Display for ComputerSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<&str> = [
            self.platform_version.as_deref(),
            self.sdk_version.as_deref(),
            self.math_backend.as_deref(),
            self.compiler.as_deref(),
            self.compiler_version.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|s| !s.is_empty())
        .collect();
        if parts.is_empty() {
            f.write_str("unspecified")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}

/// A build report from one computer for one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub computer: String,
    pub spec: ComputerSpec,
    pub compiled: Option<bool>,
}

/// One test run reported inside a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTestInstance {
    pub module: String,
    pub test_case: String,
    pub passed: bool,
    pub checksum: Option<String>,
    pub failure_type: Option<String>,
}

/// A stored test instance, joined with the computer that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInstance {
    pub id: i64,
    pub test_case_commit_id: i64,
    pub submission_id: i64,
    pub computer: String,
    pub passed: bool,
    pub checksum: Option<String>,
    pub failure_type: Option<String>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit_with_message(message: &str) -> Commit {
        Commit {
            id: 1,
            sha: "0123456789abcdef".into(),
            short_sha: "0123456".into(),
            author: "Ada".into(),
            author_email: "ada@example.com".into(),
            message: message.into(),
            commit_time: OffsetDateTime::UNIX_EPOCH,
            github_url: None,
            pull_request: false,
            open: false,
            scalars: CommitScalars::default(),
        }
    }

    #[test]
    fn status_codes_round_trip() {
        for status in [
            TestStatus::Untested,
            TestStatus::Passing,
            TestStatus::Failing,
            TestStatus::ChecksumMismatch,
            TestStatus::Mixed,
        ] {
            assert_eq!(TestStatus::from_code(status.code()), Some(status));
        }
        assert_eq!(TestStatus::from_code(7), None);
        assert_eq!(CompilationStatus::from_code(2), Some(CompilationStatus::Mixed));
        assert_eq!(CompilationStatus::from_code(-2), None);
    }

    #[test]
    fn precedence_table() {
        let base = StatusCounts {
            total: 4,
            ..Default::default()
        };
        let mixed = StatusCounts {
            mixed: 1,
            failed: 2,
            checksum: 1,
            ..base
        };
        assert_eq!(TestStatus::from_counts(&mixed), TestStatus::Mixed);

        let failing = StatusCounts {
            failed: 1,
            checksum: 3,
            ..base
        };
        assert_eq!(TestStatus::from_counts(&failing), TestStatus::Failing);

        let checksum = StatusCounts {
            checksum: 1,
            passed: 4,
            ..base
        };
        assert_eq!(TestStatus::from_counts(&checksum), TestStatus::ChecksumMismatch);

        let passing = StatusCounts { passed: 4, ..base };
        assert_eq!(TestStatus::from_counts(&passing), TestStatus::Passing);

        let partial = StatusCounts { passed: 3, ..base };
        assert_eq!(TestStatus::from_counts(&partial), TestStatus::Untested);

        assert_eq!(
            TestStatus::from_counts(&StatusCounts::default()),
            TestStatus::Untested
        );
    }

    #[test]
    fn compilation_from_flags() {
        assert_eq!(CompilationStatus::from_flags(&[]), CompilationStatus::Unknown);
        assert_eq!(
            CompilationStatus::from_flags(&[true, true]),
            CompilationStatus::Success
        );
        assert_eq!(CompilationStatus::from_flags(&[false]), CompilationStatus::Failure);
        assert_eq!(
            CompilationStatus::from_flags(&[true, false]),
            CompilationStatus::Mixed
        );
    }

    #[test]
    fn short_sha_takes_seven_chars() {
        assert_eq!(short_sha("abcdef0123456789"), "abcdef0");
        assert_eq!(short_sha("abc"), "abc");
    }

    #[test]
    fn short_message_is_kept_whole() {
        let commit = commit_with_message("fix typo");
        assert_eq!(commit.message_first_line(70), "fix typo");
        assert_eq!(commit.message_rest(70), None);
    }

    #[test]
    fn multi_line_message_splits_into_rest() {
        let commit = commit_with_message("fix typo\n\nlonger explanation here");
        assert_eq!(commit.message_first_line(70), "fix typo");
        assert_eq!(
            commit.message_rest(70).as_deref(),
            Some("...longer explanation here")
        );
    }

    #[test]
    fn long_first_line_is_cut_at_word_boundary() {
        let commit = commit_with_message("alpha beta gamma delta epsilon");
        let first = commit.message_first_line(20);
        assert_eq!(first, "alpha beta gamma...");
        assert!(first.chars().count() <= 20);
        assert_eq!(
            commit.message_rest(20).as_deref(),
            Some("...delta epsilon")
        );
    }
}
