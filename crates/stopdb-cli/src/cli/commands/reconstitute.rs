use anyhow::Context;
use stopdb_core::auth::EnvCredentials;
use stopdb_core::http::HttpFetcher;
use stopdb_core::pipeline::{self, TargetEnv};
use stopdb_core::settings::Settings;

use super::super::args::ReconstituteArgs;
use crate::exit_codes;

pub(crate) fn run(args: ReconstituteArgs) -> anyhow::Result<i32> {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let mut env = TargetEnv::from_settings(&settings);
    env.migrations_dir = args.migrations_dir;
    env.data_dir = args.data_dir;
    if let Some(db) = args.db {
        env.db_path = db;
    }

    let fetcher = HttpFetcher::new().context("initialize http client")?;

    match pipeline::reconstitute(&env, &settings, &EnvCredentials, &fetcher) {
        Ok(report) => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(exit_codes::SUCCESS);
            }
            for (i, step) in report.steps.iter().enumerate() {
                println!("[{}/5] {}  {} ms", i + 1, step.step, step.elapsed_ms);
            }
            println!(
                "✔ reconstituted {} in {} ms ({} migrations, {} seed records, superuser {:?})",
                env.db_path.display(),
                report.total_ms,
                report.migrations_applied,
                report.import.records(),
                report.superuser,
            );
            println!("admin will be served at {}/admin", settings.base_url);
            Ok(exit_codes::SUCCESS)
        }
        Err(err) => {
            eprintln!("error: step {} failed", err.step);
            match &err.source {
                Some(source) => eprintln!("  {:#}", source),
                None => eprintln!("  {}", err.message),
            }
            Ok(exit_codes::OPERATION_FAILED)
        }
    }
}
