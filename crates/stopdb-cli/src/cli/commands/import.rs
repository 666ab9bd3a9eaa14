use anyhow::Context;
use stopdb_core::http::HttpFetcher;
use stopdb_core::import::{ImportStats, Importer};
use stopdb_core::Store;

use super::super::args::ImportArgs;
use super::helpers;
use crate::exit_codes;

pub fn run(args: ImportArgs) -> anyhow::Result<i32> {
    let db = match helpers::resolve_existing_db(args.db.as_ref()) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("config error: {:#}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let import = || -> anyhow::Result<ImportStats> {
        let store = Store::open(&db)?;
        let fetcher = HttpFetcher::new().context("initialize http client")?;
        Importer::new(&store, &fetcher).import_dir(&args.path)
    };

    match import() {
        Ok(stats) => {
            println!(
                "✔ imported {} records ({} districts, {} schools, {} incidents, {} attachments, {} skipped)",
                stats.records(),
                stats.districts,
                stats.schools,
                stats.incidents,
                stats.attachments,
                stats.skipped,
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            Ok(exit_codes::OPERATION_FAILED)
        }
    }
}
