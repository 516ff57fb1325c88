use super::{commit_line, open_store, resolve};
use anyhow::Result;
use testhub_core::config::Config;
use testhub_query::{commits_in_branch, nearby_commits, resolve_branch};

pub fn log(config: &Config, branch: Option<&str>, page: usize) -> Result<()> {
    let conn = open_store(config)?;
    let branch = resolve_branch(&conn, branch, &config.sync.default_branch)?;
    let listing = commits_in_branch(&conn, &branch, page, config.query.page_size)?;

    println!(
        "{} - page {} of {} ({} commits)",
        listing.branch,
        listing.page,
        listing.total_pages.max(1),
        listing.total_commits
    );
    for commit in &listing.commits {
        let marker = if Some(commit.id) == branch.head_id { "* " } else { "  " };
        println!("{}", commit_line(commit, marker));
    }
    Ok(())
}

pub fn nearby(
    config: &Config,
    revision: &str,
    branch: Option<&str>,
    limit: Option<usize>,
) -> Result<()> {
    let conn = open_store(config)?;
    let (branch, commit) = resolve(&conn, config, revision, branch)?;
    let limit = limit.unwrap_or(config.query.nearby_limit);

    let mut window = nearby_commits(&conn, &commit, &branch, limit)?;
    window.reverse();
    for other in &window {
        let marker = if other.id == commit.id { "> " } else { "  " };
        println!("{}", commit_line(other, marker));
    }
    Ok(())
}
