//! Derived views over a commit's submissions: per-computer completion and
//! compilation outcome. Nothing here is persisted.

use crate::{submissions, test_cases};
use rusqlite::Connection;
use serde::Serialize;
use testhub_core::error::StateError;
use testhub_core::types::{CompilationStatus, ComputerSpec};

/// How much of a commit's test suite one computer configuration has covered.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputerInfo {
    pub computer: String,
    pub spec: ComputerSpec,
    pub numerator: i64,
    pub denominator: i64,
    pub compilation: CompilationStatus,
}

impl ComputerInfo {
    pub fn fraction(&self) -> f64 {
        if self.denominator == 0 {
            0.0
        } else {
            self.numerator as f64 / self.denominator as f64
        }
    }

    pub fn is_complete(&self) -> bool {
        self.denominator > 0 && self.numerator == self.denominator
    }
}

pub fn computer_info(conn: &Connection, commit_id: i64) -> Result<Vec<ComputerInfo>, StateError> {
    let denominator = test_cases::count_for_commit(conn, commit_id)?;
    submissions::computer_groups(conn, commit_id)?
        .into_iter()
        .map(|group| {
            let flags = submissions::compiled_flags(conn, commit_id, Some(&group.computer))?;
            Ok(ComputerInfo {
                computer: group.computer,
                spec: group.spec,
                numerator: group.tested_cases,
                denominator,
                compilation: CompilationStatus::from_flags(&flags),
            })
        })
        .collect()
}

pub fn compilation_status(conn: &Connection, commit_id: i64) -> Result<CompilationStatus, StateError> {
    let flags = submissions::compiled_flags(conn, commit_id, None)?;
    Ok(CompilationStatus::from_flags(&flags))
}

/// Successful and failed compilation reports for a commit.
pub fn compile_counts(conn: &Connection, commit_id: i64) -> Result<(usize, usize), StateError> {
    let flags = submissions::compiled_flags(conn, commit_id, None)?;
    let success = flags.iter().filter(|f| **f).count();
    Ok((success, flags.len() - success))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commits::{self, tests::sample_commit, tests::setup_test_db};
    use crate::test_instances;
    use testhub_core::types::{NewSubmission, NewTestInstance};

    #[test]
    fn test_completion_per_computer() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("8ab8ab8ab", 1)]).unwrap()[0];
        let cases: Vec<i64> = ["a", "b"]
            .iter()
            .map(|n| test_cases::ensure_test_case(&conn, "star", n).unwrap())
            .collect();
        let tccs: Vec<i64> = cases
            .iter()
            .map(|tc| test_cases::ensure_test_case_commit(&conn, commit_id, *tc).unwrap())
            .collect();

        let full = submissions::insert_submission(
            &conn,
            commit_id,
            &NewSubmission {
                computer: "cosmos".into(),
                spec: ComputerSpec::default(),
                compiled: Some(true),
            },
        )
        .unwrap();
        let partial = submissions::insert_submission(
            &conn,
            commit_id,
            &NewSubmission {
                computer: "hydra".into(),
                spec: ComputerSpec::default(),
                compiled: Some(false),
            },
        )
        .unwrap();

        let instance = NewTestInstance {
            module: "star".into(),
            test_case: "a".into(),
            passed: true,
            checksum: None,
            failure_type: None,
        };
        test_instances::insert_instance(&conn, tccs[0], full, &instance).unwrap();
        test_instances::insert_instance(&conn, tccs[1], full, &instance).unwrap();
        test_instances::insert_instance(&conn, tccs[0], partial, &instance).unwrap();

        let info = computer_info(&conn, commit_id).unwrap();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].computer, "cosmos");
        assert!(info[0].is_complete());
        assert_eq!(info[0].compilation, CompilationStatus::Success);
        assert_eq!(info[1].numerator, 1);
        assert_eq!(info[1].denominator, 2);
        assert!((info[1].fraction() - 0.5).abs() < f64::EPSILON);
        assert_eq!(info[1].compilation, CompilationStatus::Failure);

        assert_eq!(compilation_status(&conn, commit_id).unwrap(), CompilationStatus::Mixed);
        assert_eq!(compile_counts(&conn, commit_id).unwrap(), (1, 1));
    }

    #[test]
    fn test_no_submissions() {
        let (_dir, conn) = setup_test_db();
        let commit_id = commits::upsert_commits(&conn, &[sample_commit("9ab9ab9ab", 1)]).unwrap()[0];
        assert!(computer_info(&conn, commit_id).unwrap().is_empty());
        assert_eq!(compilation_status(&conn, commit_id).unwrap(), CompilationStatus::Unknown);
    }
}
