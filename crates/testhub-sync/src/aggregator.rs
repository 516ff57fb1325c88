//! Rollup of test instances into test-case commits, and of test-case commits
//! into the commit scalars.

use rusqlite::Connection;
use std::collections::{BTreeSet, HashSet};
use testhub_core::error::StateError;
use testhub_core::types::{
    CommitScalars, NewSubmission, NewTestInstance, StatusCounts, TestCaseCommit, TestInstance,
    TestStatus,
};
use testhub_state::{commits, completion, submissions, test_cases, test_instances};
use tracing::{debug, info};

/// Derived fields of a test-case commit, before they are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOutcome {
    pub status: TestStatus,
    pub passed_count: i64,
    pub failed_count: i64,
    pub checksum_count: i64,
    pub computer_count: i64,
    pub last_tested: Option<String>,
}

/// Fold a test-case commit's instances into its status and counts.
///
/// Passing and failing instances together make the case mixed; otherwise
/// more than one distinct non-empty checksum is a checksum mismatch.
pub fn outcome_from_instances(instances: &[TestInstance]) -> InstanceOutcome {
    let passed_count = instances.iter().filter(|i| i.passed).count() as i64;
    let failed_count = instances.len() as i64 - passed_count;
    let checksums: HashSet<&str> = instances
        .iter()
        .filter_map(|i| i.checksum.as_deref())
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .collect();
    let computers: HashSet<&str> = instances.iter().map(|i| i.computer.as_str()).collect();
    let checksum_count = checksums.len() as i64;

    let status = if failed_count > 0 && passed_count > 0 {
        TestStatus::Mixed
    } else if failed_count > 0 {
        TestStatus::Failing
    } else if checksum_count > 1 {
        TestStatus::ChecksumMismatch
    } else if passed_count > 0 {
        TestStatus::Passing
    } else {
        TestStatus::Untested
    };

    InstanceOutcome {
        status,
        passed_count,
        failed_count,
        checksum_count,
        computer_count: computers.len() as i64,
        last_tested: instances.iter().map(|i| i.created_at.clone()).max(),
    }
}

/// Recompute and persist one test-case commit from its instances.
pub fn recompute_test_case_commit(
    conn: &Connection,
    test_case_commit_id: i64,
) -> Result<TestCaseCommit, StateError> {
    let current = test_cases::get_test_case_commit(conn, test_case_commit_id)?
        .ok_or_else(|| StateError::sqlite(rusqlite::Error::QueryReturnedNoRows))?;
    let instances = test_instances::list_for_test_case_commit(conn, test_case_commit_id)?;
    let outcome = outcome_from_instances(&instances);
    let updated = TestCaseCommit {
        status: outcome.status,
        passed_count: outcome.passed_count,
        failed_count: outcome.failed_count,
        checksum_count: outcome.checksum_count,
        computer_count: outcome.computer_count,
        last_tested: outcome.last_tested,
        ..current
    };
    test_cases::update_test_case_commit_counts(conn, &updated)?;
    Ok(updated)
}

/// Recompute and persist a commit's rollup scalars from its test-case commits
/// and submissions.
pub fn recompute_scalars(conn: &Connection, commit_id: i64) -> Result<CommitScalars, StateError> {
    let tally = test_cases::status_tally(conn, commit_id)?;
    let computers = completion::computer_info(conn, commit_id)?;
    let status = TestStatus::from_counts(&StatusCounts {
        total: tally.total,
        passed: tally.passed,
        failed: tally.failed,
        checksum: tally.checksum,
        mixed: tally.mixed,
    });
    let scalars = CommitScalars {
        test_case_count: tally.total,
        passed_count: tally.passed,
        failed_count: tally.failed,
        mixed_count: tally.mixed,
        checksum_count: tally.checksum,
        untested_count: tally.untested,
        computer_count: computers.len() as i64,
        complete_computer_count: computers.iter().filter(|c| c.is_complete()).count() as i64,
        status,
    };
    commits::update_scalars(conn, commit_id, &scalars)?;
    debug!(commit_id, status = %scalars.status, "Recomputed commit scalars");
    Ok(scalars)
}

/// Recompute every test-case commit of a commit, then its scalars.
pub fn recompute_commit(conn: &mut Connection, commit_id: i64) -> Result<CommitScalars, StateError> {
    let tx = conn.transaction().map_err(StateError::sqlite)?;
    for entry in test_cases::list_for_commit(&tx, commit_id)? {
        recompute_test_case_commit(&tx, entry.outcome.id)?;
    }
    let scalars = recompute_scalars(&tx, commit_id)?;
    tx.commit().map_err(StateError::sqlite)?;
    Ok(scalars)
}

/// Store a submission with its test instances and roll the results up.
///
/// Test cases and test-case commits missing for the reported instances are
/// created. Everything happens in one transaction.
pub fn record_submission(
    conn: &mut Connection,
    commit_id: i64,
    submission: &NewSubmission,
    instances: &[NewTestInstance],
) -> Result<CommitScalars, StateError> {
    let tx = conn.transaction().map_err(StateError::sqlite)?;
    let submission_id = submissions::insert_submission(&tx, commit_id, submission)?;

    let mut touched = BTreeSet::new();
    for instance in instances {
        let test_case_id = test_cases::ensure_test_case(&tx, &instance.module, &instance.test_case)?;
        let tcc_id = test_cases::ensure_test_case_commit(&tx, commit_id, test_case_id)?;
        test_instances::insert_instance(&tx, tcc_id, submission_id, instance)?;
        touched.insert(tcc_id);
    }
    for tcc_id in &touched {
        recompute_test_case_commit(&tx, *tcc_id)?;
    }
    let scalars = recompute_scalars(&tx, commit_id)?;
    tx.commit().map_err(StateError::sqlite)?;

    info!(
        commit_id,
        computer = %submission.computer,
        instances = instances.len(),
        status = %scalars.status,
        "Recorded submission"
    );
    Ok(scalars)
}
