use anyhow::Result;
use testhub_core::config::Config;
use testhub_state::{branches, db, schema};

pub fn run(config: &Config) -> Result<()> {
    println!("testhub doctor");
    println!("==============");
    println!();

    let mut all_ok = true;
    let db_path = config.database_path();

    print!("SQLite database ... ");
    if !db_path.exists() {
        println!("MISSING - run `testhub init`");
        all_ok = false;
    } else {
        match db::open_with_storage(&db_path, &config.storage) {
            Ok(conn) => {
                match db::quick_check(&conn) {
                    Ok(None) => println!("OK"),
                    Ok(Some(detail)) => {
                        println!("WARN: {}", detail);
                        all_ok = false;
                    }
                    Err(e) => {
                        println!("FAIL: {}", e);
                        all_ok = false;
                    }
                }

                print!("Schema version ... ");
                match schema::applied_version(&conn) {
                    Ok(v) if v == schema::CURRENT_SCHEMA_VERSION => println!("OK ({})", v),
                    Ok(v) => {
                        println!(
                            "OUTDATED ({} < {}) - run `testhub init`",
                            v,
                            schema::CURRENT_SCHEMA_VERSION
                        );
                        all_ok = false;
                    }
                    Err(e) => {
                        println!("FAIL: {}", e);
                        all_ok = false;
                    }
                }

                println!();
                println!("Rows:");
                match db::table_counts(&conn) {
                    Ok(counts) => {
                        for (table, n) in counts {
                            println!("  {:<20} {}", table, n);
                        }
                    }
                    Err(e) => {
                        println!("  FAIL: {}", e);
                        all_ok = false;
                    }
                }

                if let Ok(list) = branches::list_branches(&conn) {
                    let active = list.iter().filter(|b| !b.merged).count();
                    println!("  active branches      {}", active);
                }
            }
            Err(e) => {
                println!("FAIL: {}", e);
                all_ok = false;
            }
        }
    }

    println!();
    print!("API token (${}) ... ", config.remote.token_env);
    match std::env::var(&config.remote.token_env) {
        Ok(v) if !v.trim().is_empty() => println!("set"),
        _ => println!("not set (unauthenticated requests are rate limited)"),
    }

    println!();
    if all_ok {
        println!("All checks passed!");
    } else {
        println!("Some checks failed. See above for details.");
    }
    Ok(())
}
