use super::{commit_line, open_store, resolve};
use anyhow::Result;
use serde::Serialize;
use testhub_core::config::Config;
use testhub_core::time::format_iso8601;
use testhub_query::{CommitSummary, Navigation, commit_summary, navigation};

#[derive(Serialize)]
struct ShowOutput<'a> {
    branch: &'a str,
    #[serde(flatten)]
    summary: &'a CommitSummary,
    navigation: &'a Navigation,
}

pub fn run(config: &Config, revision: &str, branch: Option<&str>, json: bool) -> Result<()> {
    let conn = open_store(config)?;
    let (branch, commit) = resolve(&conn, config, revision, branch)?;
    let summary = commit_summary(&conn, &commit)?;
    let nav = navigation(&conn, &commit, &branch)?;

    if json {
        let out = ShowOutput {
            branch: &branch.name,
            summary: &summary,
            navigation: &nav,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let c = &summary.commit;
    println!("commit {}", c.sha);
    println!("Author: {} <{}>", c.author, c.author_email);
    println!("Date:   {}", format_iso8601(c.commit_time));
    if let Some(url) = &c.github_url {
        println!("URL:    {}", url);
    }
    println!();
    println!("    {}", summary.message_first_line);
    if let Some(rest) = &summary.message_rest {
        for line in rest.lines() {
            println!("    {}", line);
        }
    }
    println!();
    println!("Branches: {}", summary.branches.join(", "));
    println!("Status:   {} - {}", c.scalars.status, summary.status_text);
    println!("Build:    {}", summary.compilation_text);
    let s = &summary.statistics;
    println!(
        "Cases:    {} total, {} passing, {} failing, {} mixed, {} checksum, {} other",
        c.scalars.test_case_count, s.passing, s.failing, s.mixed, s.checksum, s.other
    );

    if !summary.computers.is_empty() {
        println!();
        println!("Computers:");
        for info in &summary.computers {
            println!(
                "  {:<20} {:>4}/{:<4} ({:>5.1}%)  {}  [{}]",
                info.computer,
                info.numerator,
                info.denominator,
                info.fraction() * 100.0,
                info.compilation,
                info.spec
            );
        }
    }

    let unhealthy: Vec<_> = summary
        .test_cases
        .iter()
        .filter(|e| e.outcome.status != testhub_core::types::TestStatus::Passing)
        .collect();
    if !unhealthy.is_empty() {
        println!();
        println!("Test cases needing attention:");
        for entry in unhealthy {
            println!(
                "  {:<8} {:<40} {}",
                entry.module, entry.name, entry.outcome.status
            );
        }
    }

    println!();
    if let Some(next) = &nav.next {
        println!("{}", commit_line(next, "next "));
    }
    if let Some(previous) = &nav.previous {
        println!("{}", commit_line(previous, "prev "));
    }
    Ok(())
}
