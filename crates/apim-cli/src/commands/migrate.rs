//! Migrate command
//!
//! Usage: apim migrate [--config FILE] [--db PATH]

use super::{CliResult, StoreArgs};
use apim_store::migrations;

pub fn execute(store: &StoreArgs) -> CliResult {
    let (config, mut conn) = store.open()?;
    let _request = super::request_span();

    let before = migrations::applied_migrations(&conn)?;
    migrations::apply_migrations(&mut conn)?;
    let after = migrations::applied_migrations(&conn)?;

    for id in after.iter().filter(|id| !before.contains(id)) {
        println!("✓ Applied {}", id);
    }
    println!(
        "{} migrations recorded in {}",
        after.len(),
        config.database.path
    );
    Ok(())
}
