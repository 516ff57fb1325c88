use super::open_store;
use anyhow::{Context, Result};
use std::path::Path;
use testhub_core::config::Config;
use testhub_remote::GitHubClient;
use testhub_sync::{PushPayload, SyncEngine, SyncReport, SyncSettings};

fn client(config: &Config) -> Result<GitHubClient> {
    GitHubClient::from_config(&config.remote).context("Failed to build remote client")
}

pub fn run(
    config: &Config,
    branch: Option<&str>,
    force: bool,
    days_before: Option<i64>,
    json: bool,
) -> Result<()> {
    let remote = client(config)?;
    let engine = SyncEngine::new(&remote, SyncSettings::from_config(config));
    let mut conn = open_store(config)?;

    let days_before = days_before.unwrap_or(config.sync.days_before);
    let report = engine.sync_tree(&mut conn, branch, force, days_before)?;
    print_report(&report, json)
}

pub fn run_push(config: &Config, payload_path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(payload_path)
        .with_context(|| format!("Failed to read {}", payload_path.display()))?;
    let payload: PushPayload =
        serde_json::from_str(&raw).context("Push payload is not valid JSON")?;

    let remote = client(config)?;
    let engine = SyncEngine::new(&remote, SyncSettings::from_config(config));
    let mut conn = open_store(config)?;
    let report = engine.sync_for_push(&mut conn, &payload)?;
    print_report(&report, false)
}

pub fn run_memberships(config: &Config, branch: Option<&str>) -> Result<()> {
    let remote = client(config)?;
    let engine = SyncEngine::new(&remote, SyncSettings::from_config(config));
    let mut conn = open_store(config)?;
    let added = engine.refresh_memberships(&mut conn, branch)?;
    println!("Added {} memberships.", added);
    Ok(())
}

pub fn run_map(config: &Config) -> Result<()> {
    let remote = client(config)?;
    let engine = SyncEngine::new(&remote, SyncSettings::from_config(config));
    let mut conn = open_store(config)?;
    let mapped = engine.populate_missing_test_cases(&mut conn)?;
    println!("Mapped test cases for {} commits.", mapped);
    Ok(())
}

fn print_report(report: &SyncReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    println!("Sync complete");
    println!("  Branches synced:   {}", report.branches_synced);
    println!("  Commits upserted:  {}", report.commits_upserted);
    println!("  Memberships added: {}", report.memberships_added);
    println!("  Commits mapped:    {}", report.commits_mapped);
    println!(
        "  Pull requests:     {} opened, {} closed",
        report.pulls_opened, report.pulls_closed
    );
    if report.rejected > 0 {
        println!("  Rejected records:  {}", report.rejected);
    }
    for (label, names) in [
        ("Merged", &report.branches_merged),
        ("Missing remotely", &report.branches_missing),
        ("Lookback exhausted", &report.lookback_exhausted),
    ] {
        if !names.is_empty() {
            println!("  {}: {}", label, names.join(", "));
        }
    }
    Ok(())
}
