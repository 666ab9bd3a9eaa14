use std::path::PathBuf;

use anyhow::Context;
use stopdb_core::settings;

/// Resolve the database path from `--db`, falling back to `DATABASE_URL`.
pub(crate) fn resolve_db(db: Option<&PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(db) = db {
        return Ok(db.clone());
    }
    let raw = std::env::var("DATABASE_URL")
        .context("pass --db or set DATABASE_URL")?;
    let path = settings::database_path_from_url(&raw)?;
    Ok(path)
}

/// Resolve a database path that must already exist (migrate creates the
/// file; everything else operates on a migrated database).
pub(crate) fn resolve_existing_db(db: Option<&PathBuf>) -> anyhow::Result<PathBuf> {
    let path = resolve_db(db)?;
    anyhow::ensure!(
        path.exists(),
        "database {} does not exist; run `stopdb migrate` first",
        path.display()
    );
    Ok(path)
}
