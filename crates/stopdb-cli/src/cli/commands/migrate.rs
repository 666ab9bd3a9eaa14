use stopdb_core::migrations;
use stopdb_core::Store;

use super::super::args::MigrateArgs;
use super::helpers;
use crate::exit_codes;

pub fn run(args: MigrateArgs) -> anyhow::Result<i32> {
    let db = match helpers::resolve_db(args.db.as_ref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("config error: {:#}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let apply = || -> anyhow::Result<migrations::ApplyOutcome> {
        migrations::ensure_default(&args.migrations_dir)?;
        let store = Store::open(&db)?;
        migrations::apply_all(&store, &args.migrations_dir)
    };

    match apply() {
        Ok(outcome) => {
            println!(
                "✔ applied {} migrations to {} ({} already applied)",
                outcome.applied.len(),
                db.display(),
                outcome.already_applied
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            Ok(exit_codes::OPERATION_FAILED)
        }
    }
}
