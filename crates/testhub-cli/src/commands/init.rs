use super::open_store;
use anyhow::Result;
use testhub_core::config::Config;
use testhub_state::schema;
use tracing::info;

pub fn run(config: &Config) -> Result<()> {
    let conn = open_store(config)?;
    let version = schema::applied_version(&conn)?;
    let db_path = config.database_path();

    println!("Store initialized");
    println!("  Repository:     {}", config.remote.repo_path);
    println!("  Default branch: {}", config.sync.default_branch);
    println!("  Database:       {}", db_path.display());
    println!("  Schema version: {}", version);
    println!();
    println!("Next step: run `testhub sync` to mirror the repository.");

    info!(repo = %config.remote.repo_path, db = %db_path.display(), "Store initialized");
    Ok(())
}
