use crate::error::QueryError;
use rusqlite::Connection;
use serde::Serialize;
use testhub_core::constants::MESSAGE_FIRST_LINE_MAX;
use testhub_core::types::{CompilationStatus, Commit, TestStatus};
use testhub_state::completion::{self, ComputerInfo};
use testhub_state::memberships;
use testhub_state::test_cases::{self, TestCaseCommitEntry};

/// Test-case commits of one commit counted by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusStatistics {
    pub passing: usize,
    pub mixed: usize,
    pub failing: usize,
    pub checksum: usize,
    pub other: usize,
}

/// Everything shown for a single commit.
#[derive(Debug, Clone, Serialize)]
pub struct CommitSummary {
    pub commit: Commit,
    pub message_first_line: String,
    pub message_rest: Option<String>,
    pub status_text: &'static str,
    pub branches: Vec<String>,
    pub computers: Vec<ComputerInfo>,
    pub compilation: CompilationStatus,
    pub compilation_text: String,
    pub compile_success_count: usize,
    pub compile_failure_count: usize,
    pub statistics: StatusStatistics,
    /// Untested first, then mixed, checksum, failing and passing cases.
    pub test_cases: Vec<TestCaseCommitEntry>,
}

pub fn commit_summary(conn: &Connection, commit: &Commit) -> Result<CommitSummary, QueryError> {
    let mut entries = test_cases::list_for_commit(conn, commit.id)?;
    entries.sort_by_key(|entry| display_rank(entry.outcome.status));

    let mut statistics = StatusStatistics::default();
    for entry in &entries {
        match entry.outcome.status {
            TestStatus::Passing => statistics.passing += 1,
            TestStatus::Mixed => statistics.mixed += 1,
            TestStatus::Failing => statistics.failing += 1,
            TestStatus::ChecksumMismatch => statistics.checksum += 1,
            TestStatus::Untested => statistics.other += 1,
        }
    }

    let compilation = completion::compilation_status(conn, commit.id)?;
    let (compile_success_count, compile_failure_count) =
        completion::compile_counts(conn, commit.id)?;
    let status_text = if commit.scalars.computer_count == 0 {
        "No tests have been run for this commit."
    } else {
        commit.scalars.status.description()
    };

    Ok(CommitSummary {
        message_first_line: commit.message_first_line(MESSAGE_FIRST_LINE_MAX),
        message_rest: commit.message_rest(MESSAGE_FIRST_LINE_MAX),
        status_text,
        branches: memberships::branches_for_commit(conn, commit.id)?
            .into_iter()
            .map(|b| b.name)
            .collect(),
        computers: completion::computer_info(conn, commit.id)?,
        compilation,
        compilation_text: compilation_text(
            compilation,
            compile_success_count,
            compile_failure_count,
        ),
        compile_success_count,
        compile_failure_count,
        statistics,
        test_cases: entries,
        commit: commit.clone(),
    })
}

fn display_rank(status: TestStatus) -> u8 {
    match status {
        TestStatus::Untested => 0,
        TestStatus::Mixed => 1,
        TestStatus::ChecksumMismatch => 2,
        TestStatus::Failing => 3,
        TestStatus::Passing => 4,
    }
}

pub fn compilation_text(status: CompilationStatus, success: usize, failure: usize) -> String {
    match status {
        CompilationStatus::Success => format!("Successfully compiling on {success} machines."),
        CompilationStatus::Failure => format!("Failing to compile on {failure} machines."),
        CompilationStatus::Mixed => format!(
            "Successfully compiling on {success} and failing to compile on {failure} machines."
        ),
        CompilationStatus::Unknown => "No compilation information".to_string(),
    }
}
