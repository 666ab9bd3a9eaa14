use stopdb_core::migrations;

use super::super::args::SquashArgs;
use crate::exit_codes;

pub fn run(args: SquashArgs) -> anyhow::Result<i32> {
    let squash = || -> anyhow::Result<usize> {
        migrations::ensure_default(&args.migrations_dir)?;
        migrations::squash(&args.migrations_dir)
    };

    match squash() {
        Ok(0) => {
            println!("nothing to squash in {}", args.migrations_dir.display());
            Ok(exit_codes::SUCCESS)
        }
        Ok(collapsed) => {
            println!(
                "✔ squashed {} migrations into {}",
                collapsed,
                args.migrations_dir.join(migrations::SQUASHED_NAME).display()
            );
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            Ok(exit_codes::OPERATION_FAILED)
        }
    }
}
