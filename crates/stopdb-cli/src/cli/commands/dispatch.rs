use super::super::args::{Cli, Command};
use crate::exit_codes;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Reconstitute(args) => super::reconstitute::run(args),
        Command::Migrate(args) => super::migrate::run(args),
        Command::Squash(args) => super::squash::run(args),
        Command::Createsuperuser(args) => super::createsuperuser::run(args),
        Command::Import(args) => super::import::run(args),
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(exit_codes::SUCCESS)
        }
    }
}
