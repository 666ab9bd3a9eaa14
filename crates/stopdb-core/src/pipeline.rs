//! The reconstitution pipeline: rebuild the development database from
//! nothing, in five strictly ordered steps.
//!
//! Each step is gated on the success of the one before it — the first error
//! aborts the run. There are no retries and no partial resume; the fix for a
//! failed run is to fix the cause and run the whole pipeline again. The
//! pipeline owns no state of its own: everything lives in the target
//! environment (the database file, the migrations directory, the exports
//! directory).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;

use crate::auth::CredentialProvider;
use crate::errors::{ProvisionError, Step};
use crate::http::Fetcher;
use crate::import::{ImportStats, Importer};
use crate::migrations;
use crate::settings::Settings;
use crate::storage::Store;

/// Where a pipeline run reads and writes. Injected rather than baked in so
/// runs can target disposable environments.
#[derive(Debug, Clone)]
pub struct TargetEnv {
    pub db_path: PathBuf,
    pub migrations_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl TargetEnv {
    /// The conventional layout: `migrations/` and `data/` next to the
    /// database the settings point at.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            db_path: settings.database_path.clone(),
            migrations_dir: PathBuf::from("migrations"),
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub step: &'static str,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub steps: Vec<StepReport>,
    pub migrations_applied: usize,
    pub import: ImportStats,
    pub superuser: String,
    pub total_ms: u64,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run the five-step reconstitution against `env`.
pub fn reconstitute(
    env: &TargetEnv,
    settings: &Settings,
    credentials: &dyn CredentialProvider,
    fetcher: &dyn Fetcher,
) -> Result<RunReport, ProvisionError> {
    let run_start = Instant::now();
    let mut steps = Vec::with_capacity(5);
    let mut timed = |step: Step, start: Instant| {
        let report = StepReport {
            step: step.as_str(),
            elapsed_ms: elapsed_ms(start),
        };
        tracing::info!(step = report.step, elapsed_ms = report.elapsed_ms, "step finished");
        steps.push(report);
    };

    // 1. Delete the existing database. A database that never existed is
    //    the same as one we just deleted.
    let start = Instant::now();
    reset_database(&env.db_path)
        .map_err(|e| ProvisionError::from_anyhow(Step::Reset, e).with_path(display(&env.db_path)))?;
    timed(Step::Reset, start);

    // 2. Squash the migration history. Repository state only; the database
    //    does not exist at this point.
    let start = Instant::now();
    migrations::ensure_default(&env.migrations_dir)
        .and_then(|_| migrations::squash(&env.migrations_dir))
        .map_err(|e| {
            ProvisionError::from_anyhow(Step::Squash, e).with_path(display(&env.migrations_dir))
        })?;
    timed(Step::Squash, start);

    // 3. Recreate the database and materialize the full schema.
    let start = Instant::now();
    let (store, outcome) = apply_migrations(env).map_err(|e| {
        ProvisionError::from_anyhow(Step::Migrate, e).with_path(display(&env.db_path))
    })?;
    let migrations_applied = outcome.applied.len();
    timed(Step::Migrate, start);

    // 4. Create the administrative account. The database is fresh, so a
    //    duplicate here is a real error.
    let start = Instant::now();
    let superuser = credentials
        .superuser()
        .and_then(|creds| {
            crate::auth::create_superuser(&store, &settings.secret_key, &creds)?;
            Ok(creds.username)
        })
        .map_err(|e| ProvisionError::from_anyhow(Step::CreateSuperuser, e))?;
    timed(Step::CreateSuperuser, start);

    // 5. Import the seed data.
    let start = Instant::now();
    let import = Importer::new(&store, fetcher)
        .import_dir(&env.data_dir)
        .map_err(|e| {
            ProvisionError::from_anyhow(Step::Import, e).with_path(display(&env.data_dir))
        })?;
    timed(Step::Import, start);

    Ok(RunReport {
        steps,
        migrations_applied,
        import,
        superuser,
        total_ms: elapsed_ms(run_start),
    })
}

fn display(path: &Path) -> String {
    path.display().to_string()
}

/// Remove the database file and its WAL sidecars. Absence is not an error.
fn reset_database(db_path: &Path) -> anyhow::Result<()> {
    let mut removed = false;
    for path in [
        db_path.to_path_buf(),
        sidecar(db_path, "-wal"),
        sidecar(db_path, "-shm"),
    ] {
        match fs::remove_file(&path) {
            Ok(()) => removed = true,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("delete {}", path.display())))
            }
        }
    }
    if removed {
        tracing::info!(db = %db_path.display(), "removed existing database");
    } else {
        tracing::info!(db = %db_path.display(), "no existing database");
    }
    Ok(())
}

fn sidecar(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn apply_migrations(env: &TargetEnv) -> anyhow::Result<(Store, migrations::ApplyOutcome)> {
    if let Some(parent) = env.db_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let store = Store::open(&env.db_path)?;
    let outcome = migrations::apply_all(&store, &env.migrations_dir)?;
    Ok((store, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{StaticCredentials, SuperuserCredentials};
    use crate::http::Fetcher;
    use crate::settings::SecretKey;
    use tempfile::TempDir;

    struct NoFetch;

    impl Fetcher for NoFetch {
        fn fetch(&self, url: &str) -> anyhow::Result<Vec<u8>> {
            anyhow::bail!("unexpected fetch of {}", url)
        }
    }

    fn test_settings(db_path: &Path) -> Settings {
        Settings {
            database_path: db_path.to_path_buf(),
            secret_key: SecretKey::new("test-secret"),
            base_url: "http://localhost:8000".to_string(),
            debug: true,
        }
    }

    fn test_env(root: &TempDir) -> TargetEnv {
        TargetEnv {
            db_path: root.path().join("db.sqlite3"),
            migrations_dir: root.path().join("migrations"),
            data_dir: root.path().join("data"),
        }
    }

    fn test_credentials() -> StaticCredentials {
        StaticCredentials(SuperuserCredentials {
            username: "admin".to_string(),
            password: "local-dev-password".to_string(),
            email: "admin@example.com".to_string(),
        })
    }

    fn run(env: &TargetEnv, settings: &Settings) -> Result<RunReport, ProvisionError> {
        reconstitute(env, settings, &test_credentials(), &NoFetch)
    }

    #[test]
    fn rebuilds_from_nothing() {
        let root = tempfile::tempdir().unwrap();
        let env = test_env(&root);
        let settings = test_settings(&env.db_path);
        fs::create_dir_all(&env.data_dir).unwrap();

        // The database file does not exist yet; the delete step is a no-op.
        let report = run(&env, &settings).unwrap();

        assert!(env.db_path.exists());
        assert_eq!(
            report.steps.iter().map(|s| s.step).collect::<Vec<_>>(),
            vec!["reset", "squash", "migrate", "createsuperuser", "import"]
        );
        // The squash in step 2 collapsed the history to a single baseline.
        assert_eq!(report.migrations_applied, 1);
        // Empty data directory: zero records, not an error.
        assert_eq!(report.import.records(), 0);

        let store = Store::open(&env.db_path).unwrap();
        assert_eq!(store.superuser_count().unwrap(), 1);
        let user = store.user_by_username("admin").unwrap().unwrap();
        assert_eq!(user.email, "admin@example.com");
    }

    #[test]
    fn two_runs_converge_on_the_same_state() {
        let root = tempfile::tempdir().unwrap();
        let env = test_env(&root);
        let settings = test_settings(&env.db_path);
        fs::create_dir_all(&env.data_dir).unwrap();

        run(&env, &settings).unwrap();
        let store = Store::open(&env.db_path).unwrap();
        let first_tables = store.table_names().unwrap();
        let first_user = store.user_by_username("admin").unwrap().unwrap();
        drop(store);

        run(&env, &settings).unwrap();
        let store = Store::open(&env.db_path).unwrap();
        assert_eq!(store.table_names().unwrap(), first_tables);
        assert_eq!(store.superuser_count().unwrap(), 1);
        let second_user = store.user_by_username("admin").unwrap().unwrap();
        assert_eq!(second_user.username, first_user.username);
        assert_eq!(second_user.email, first_user.email);
        assert_eq!(second_user.id, first_user.id);
    }

    #[test]
    fn missing_data_dir_fails_the_import_step() {
        let root = tempfile::tempdir().unwrap();
        let env = test_env(&root);
        let settings = test_settings(&env.db_path);
        // data_dir never created: files are optional, the directory is the
        // operator's contract.
        let err = run(&env, &settings).unwrap_err();
        assert_eq!(err.step, Step::Import);
    }

    #[test]
    fn squash_failure_halts_before_any_database_mutation() {
        let root = tempfile::tempdir().unwrap();
        let env = test_env(&root);
        let settings = test_settings(&env.db_path);
        fs::create_dir_all(&env.data_dir).unwrap();
        // A file where the migrations directory should be: step 2 cannot
        // read it, and nothing after step 2 may run.
        fs::write(&env.migrations_dir, "not a directory").unwrap();

        let err = run(&env, &settings).unwrap_err();
        assert_eq!(err.step, Step::Squash);
        assert!(!env.db_path.exists(), "migrate must not have run");
    }

    #[test]
    fn duplicate_credentials_cannot_happen_on_a_fresh_database() {
        // Sanity-check the fresh-database invariant the pipeline relies on:
        // step 1 deletes, so step 4 always sees an empty auth_user table
        // even when the previous run created the same account.
        let root = tempfile::tempdir().unwrap();
        let env = test_env(&root);
        let settings = test_settings(&env.db_path);
        fs::create_dir_all(&env.data_dir).unwrap();

        run(&env, &settings).unwrap();
        run(&env, &settings).unwrap();
        run(&env, &settings).unwrap();

        let store = Store::open(&env.db_path).unwrap();
        assert_eq!(store.superuser_count().unwrap(), 1);
    }

    #[test]
    fn report_times_every_step() {
        let root = tempfile::tempdir().unwrap();
        let env = test_env(&root);
        let settings = test_settings(&env.db_path);
        fs::create_dir_all(&env.data_dir).unwrap();
        let report = run(&env, &settings).unwrap();
        assert_eq!(report.steps.len(), 5);
        assert!(report.total_ms >= report.steps.iter().map(|s| s.elapsed_ms).max().unwrap());
        assert_eq!(report.superuser, "admin");
    }
}
