//! Versioned schema migrations.
//!
//! Migrations are ordered SQL files on disk named `NNNN_description.sql`.
//! The canonical set ships embedded in this crate and is materialized into
//! the target directory when it is missing or empty, so a fresh checkout and
//! a disposable test directory behave identically.
//!
//! Applied migrations are journaled in the `schema_migrations` table by file
//! name. `squash` collapses the on-disk history into a single baseline file;
//! it mutates repository state only and never touches a database.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use rusqlite::params;

use crate::storage::Store;

/// File name squash consolidates into.
pub const SQUASHED_NAME: &str = "0001_squashed.sql";

const EMBEDDED: &[(&str, &str)] = &[
    (
        "0001_initial.sql",
        include_str!("migrations/sql/0001_initial.sql"),
    ),
    (
        "0002_school_geolocation.sql",
        include_str!("migrations/sql/0002_school_geolocation.sql"),
    ),
    (
        "0003_incident_indexes.sql",
        include_str!("migrations/sql/0003_incident_indexes.sql"),
    ),
];

const JOURNAL_DDL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    name       TEXT PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub path: PathBuf,
    pub sql: String,
}

#[derive(Debug, Default)]
pub struct ApplyOutcome {
    pub applied: Vec<String>,
    pub already_applied: usize,
}

/// Materialize the embedded canonical migrations into `dir` when it holds no
/// migrations yet. Returns whether anything was written.
pub fn ensure_default(dir: &Path) -> anyhow::Result<bool> {
    if !dir.exists() {
        fs::create_dir_all(dir)
            .with_context(|| format!("create migrations dir {}", dir.display()))?;
    }
    let has_migrations = fs::read_dir(dir)
        .with_context(|| format!("read migrations dir {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .any(|entry| is_migration_file(&entry.path()));
    if has_migrations {
        return Ok(false);
    }
    for (name, sql) in EMBEDDED {
        fs::write(dir.join(name), sql)
            .with_context(|| format!("write migration {}", name))?;
    }
    tracing::info!(dir = %dir.display(), count = EMBEDDED.len(), "materialized default migrations");
    Ok(true)
}

fn is_migration_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    !name.starts_with('.') && name.ends_with(".sql")
}

/// Load and validate the migration files in `dir`, sorted by version.
///
/// Versions must be unique and contiguous from 1; anything else means the
/// directory was edited by hand and cannot be trusted.
pub fn load_dir(dir: &Path) -> anyhow::Result<Vec<Migration>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("read migrations dir {}", dir.display()))?;
    let mut migrations = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !is_migration_file(&path) {
            continue;
        }
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let version = parse_version(&name)
            .with_context(|| format!("invalid migration file name {:?}", name))?;
        let sql = fs::read_to_string(&path)
            .with_context(|| format!("read migration {}", path.display()))?;
        migrations.push(Migration {
            version,
            name,
            path,
            sql,
        });
    }
    migrations.sort_by_key(|m| m.version);
    for (i, m) in migrations.iter().enumerate() {
        let expected = (i + 1) as u32;
        if m.version != expected {
            bail!(
                "migration versions must be contiguous from 0001; found {:?} where {:04} was expected",
                m.name,
                expected
            );
        }
    }
    Ok(migrations)
}

fn parse_version(name: &str) -> anyhow::Result<u32> {
    let prefix = name
        .get(..4)
        .filter(|p| p.bytes().all(|b| b.is_ascii_digit()))
        .context("expected a 4-digit version prefix")?;
    anyhow::ensure!(
        name.as_bytes().get(4) == Some(&b'_'),
        "expected NNNN_description.sql"
    );
    let version: u32 = prefix.parse()?;
    anyhow::ensure!(version > 0, "migration versions start at 0001");
    Ok(version)
}

/// Apply every migration in `dir` that is not yet journaled, in order, each
/// inside its own transaction.
pub fn apply_all(store: &Store, dir: &Path) -> anyhow::Result<ApplyOutcome> {
    let migrations = load_dir(dir)?;
    let mut conn = store.conn();
    conn.execute_batch(JOURNAL_DDL)?;

    let mut journaled: HashSet<String> = HashSet::new();
    {
        let mut stmt = conn.prepare("SELECT name FROM schema_migrations")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for r in rows {
            journaled.insert(r?);
        }
    }

    // A journal entry with no matching file means the histories diverged
    // (e.g. the directory was squashed after this database was migrated).
    // That cannot be reconciled in place; the database must be rebuilt.
    let on_disk: HashSet<&str> = migrations.iter().map(|m| m.name.as_str()).collect();
    for name in &journaled {
        if !on_disk.contains(name.as_str()) {
            bail!(
                "migration history diverged: {:?} is journaled as applied but missing from {}; \
                 rebuild the database from scratch",
                name,
                dir.display()
            );
        }
    }

    let mut outcome = ApplyOutcome::default();
    for migration in &migrations {
        if journaled.contains(&migration.name) {
            outcome.already_applied += 1;
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(&migration.sql)
            .with_context(|| format!("apply migration {:?}", migration.name))?;
        tx.execute(
            "INSERT INTO schema_migrations (name) VALUES (?1)",
            params![migration.name],
        )?;
        tx.commit()?;
        tracing::info!(migration = %migration.name, "applied");
        outcome.applied.push(migration.name.clone());
    }
    Ok(outcome)
}

/// Collapse the migration files in `dir` into a single baseline migration.
///
/// Returns the number of files that were consolidated; a directory already
/// holding a single migration is left untouched. The consolidated file is
/// written before any original is removed, so a failure partway cannot lose
/// history.
pub fn squash(dir: &Path) -> anyhow::Result<usize> {
    let migrations = load_dir(dir)?;
    if migrations.len() <= 1 {
        return Ok(0);
    }

    let mut combined = String::from("-- Squashed migration history.\n");
    for migration in &migrations {
        combined.push_str(&format!("\n-- from {}\n", migration.name));
        combined.push_str(&migration.sql);
        if !migration.sql.ends_with('\n') {
            combined.push('\n');
        }
    }

    let tmp = dir.join(".squash.tmp");
    fs::write(&tmp, &combined)
        .with_context(|| format!("write {}", tmp.display()))?;
    for migration in &migrations {
        fs::remove_file(&migration.path)
            .with_context(|| format!("remove {}", migration.path.display()))?;
    }
    fs::rename(&tmp, dir.join(SQUASHED_NAME)).context("finalize squashed migration")?;
    tracing::info!(dir = %dir.display(), collapsed = migrations.len(), "squashed migrations");
    Ok(migrations.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn ensure_default_materializes_once() {
        let dir = tempdir().unwrap();
        assert!(ensure_default(dir.path()).unwrap());
        let names: Vec<String> = load_dir(dir.path())
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "0001_initial.sql",
                "0002_school_geolocation.sql",
                "0003_incident_indexes.sql"
            ]
        );
        // Second call sees the existing files and writes nothing.
        assert!(!ensure_default(dir.path()).unwrap());
    }

    #[test]
    fn apply_is_incremental() {
        let dir = tempdir().unwrap();
        ensure_default(dir.path()).unwrap();
        let store = Store::memory().unwrap();

        let first = apply_all(&store, dir.path()).unwrap();
        assert_eq!(first.applied.len(), 3);
        assert_eq!(first.already_applied, 0);

        let second = apply_all(&store, dir.path()).unwrap();
        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, 3);
    }

    #[test]
    fn squashed_schema_matches_incremental_schema() {
        let incremental_dir = tempdir().unwrap();
        ensure_default(incremental_dir.path()).unwrap();
        let incremental = Store::memory().unwrap();
        apply_all(&incremental, incremental_dir.path()).unwrap();

        let squashed_dir = tempdir().unwrap();
        ensure_default(squashed_dir.path()).unwrap();
        assert_eq!(squash(squashed_dir.path()).unwrap(), 3);
        let files = load_dir(squashed_dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, SQUASHED_NAME);

        let squashed = Store::memory().unwrap();
        apply_all(&squashed, squashed_dir.path()).unwrap();

        assert_eq!(
            incremental.table_names().unwrap(),
            squashed.table_names().unwrap()
        );
    }

    #[test]
    fn squash_of_a_single_migration_is_a_noop() {
        let dir = tempdir().unwrap();
        ensure_default(dir.path()).unwrap();
        squash(dir.path()).unwrap();
        assert_eq!(squash(dir.path()).unwrap(), 0);
    }

    #[test]
    fn journal_divergence_is_detected() {
        let dir = tempdir().unwrap();
        ensure_default(dir.path()).unwrap();
        let store = Store::memory().unwrap();
        apply_all(&store, dir.path()).unwrap();

        // Squashing after the database was migrated orphans the journal.
        squash(dir.path()).unwrap();
        let err = apply_all(&store, dir.path()).unwrap_err();
        assert!(err.to_string().contains("diverged"), "{err}");
    }

    #[test]
    fn version_gaps_are_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("0001_a.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        fs::write(dir.path().join("0003_c.sql"), "CREATE TABLE c (id INTEGER);").unwrap();
        assert!(load_dir(dir.path()).is_err());
    }

    #[test]
    fn malformed_names_are_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("initial.sql"), "CREATE TABLE a (id INTEGER);").unwrap();
        assert!(load_dir(dir.path()).is_err());
    }
}
