use stopdb_core::auth::{self, CredentialProvider, EnvCredentials};
use stopdb_core::settings::Settings;
use stopdb_core::Store;

use super::super::args::CreatesuperuserArgs;
use super::helpers;
use crate::exit_codes;

pub fn run(args: CreatesuperuserArgs) -> anyhow::Result<i32> {
    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("config error: {}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };
    let db = match helpers::resolve_existing_db(args.db.as_ref().or(Some(&settings.database_path)))
    {
        Ok(db) => db,
        Err(e) => {
            eprintln!("config error: {:#}", e);
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let create = || -> anyhow::Result<String> {
        let credentials = EnvCredentials.superuser()?;
        let store = Store::open(&db)?;
        auth::create_superuser(&store, &settings.secret_key, &credentials)?;
        Ok(credentials.username)
    };

    match create() {
        Ok(username) => {
            println!("✔ created superuser {:?}", username);
            Ok(exit_codes::SUCCESS)
        }
        Err(e) => {
            eprintln!("error: {:#}", e);
            Ok(exit_codes::OPERATION_FAILED)
        }
    }
}
