use super::{open_store, resolve};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use testhub_core::config::Config;
use testhub_core::types::{CommitScalars, NewSubmission, NewTestInstance};
use testhub_sync::aggregator;

/// A submission with its test instances, as read from a results file.
#[derive(Debug, Deserialize)]
struct SubmissionFile {
    submission: NewSubmission,
    #[serde(default)]
    instances: Vec<NewTestInstance>,
}

pub fn submit(config: &Config, revision: &str, file: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let parsed: SubmissionFile =
        serde_json::from_str(&raw).context("Results file is not a valid submission")?;

    let mut conn = open_store(config)?;
    let (_, commit) = resolve(&conn, config, revision, None)?;
    let scalars = aggregator::record_submission(
        &mut conn,
        commit.id,
        &parsed.submission,
        &parsed.instances,
    )?;
    println!(
        "Recorded {} instances from {} for {}",
        parsed.instances.len(),
        parsed.submission.computer,
        commit.short_sha
    );
    print_scalars(&scalars);
    Ok(())
}

pub fn recompute(config: &Config, revision: &str) -> Result<()> {
    let mut conn = open_store(config)?;
    let (_, commit) = resolve(&conn, config, revision, None)?;
    let scalars = aggregator::recompute_commit(&mut conn, commit.id)?;
    println!("Recomputed {}", commit.short_sha);
    print_scalars(&scalars);
    Ok(())
}

fn print_scalars(scalars: &CommitScalars) {
    println!("  Status:    {}", scalars.status);
    println!(
        "  Cases:     {} total, {} passed, {} failed, {} mixed, {} checksum, {} untested",
        scalars.test_case_count,
        scalars.passed_count,
        scalars.failed_count,
        scalars.mixed_count,
        scalars.checksum_count,
        scalars.untested_count
    );
    println!(
        "  Computers: {} reporting, {} complete",
        scalars.computer_count, scalars.complete_computer_count
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submission_file_parses() {
        let parsed: SubmissionFile = serde_json::from_str(
            r#"{
                "submission": {
                    "computer": "cannon",
                    "spec": { "platform_version": "Linux 6.1", "compiler": "gfortran" },
                    "compiled": true
                },
                "instances": [
                    { "module": "star", "test_case": "1M_pre_ms_to_wd", "passed": true,
                      "checksum": "abc123", "failure_type": null }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(parsed.submission.computer, "cannon");
        assert_eq!(parsed.submission.spec.compiler.as_deref(), Some("gfortran"));
        assert_eq!(parsed.instances.len(), 1);
        assert!(parsed.instances[0].passed);
    }
}
