use super::open_store;
use anyhow::{Result, bail};
use testhub_core::config::Config;
use testhub_state::commits;
use tracing::warn;

pub fn run(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to delete every commit without --yes");
    }
    let conn = open_store(config)?;
    let deleted = commits::purge_all(&conn)?;
    warn!(deleted, "Purged commit graph");
    println!("Deleted {} commits and everything attached to them.", deleted);
    Ok(())
}
