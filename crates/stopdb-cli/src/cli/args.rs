use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "stopdb",
    version,
    about = "Operational tooling for the Stop Hate In School administrative database"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Rebuild the development database from nothing:
    /// reset, squash, migrate, createsuperuser, import
    Reconstitute(ReconstituteArgs),
    /// Apply pending schema migrations
    Migrate(MigrateArgs),
    /// Collapse the migration history into a single baseline migration
    Squash(SquashArgs),
    /// Create the administrative account non-interactively from
    /// STOPDB_SUPERUSER_USERNAME / _PASSWORD / _EMAIL
    Createsuperuser(CreatesuperuserArgs),
    /// Import seed data from an exports directory
    Import(ImportArgs),
    Version,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ReconstituteArgs {
    /// Database file to rebuild; defaults to DATABASE_URL
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[arg(long, default_value = "migrations")]
    pub migrations_dir: PathBuf,

    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Print the run report as JSON instead of the step summary
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug, Clone)]
pub struct MigrateArgs {
    /// Database file; defaults to DATABASE_URL
    #[arg(long)]
    pub db: Option<PathBuf>,

    #[arg(long, default_value = "migrations")]
    pub migrations_dir: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SquashArgs {
    #[arg(long, default_value = "migrations")]
    pub migrations_dir: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct CreatesuperuserArgs {
    /// Database file; defaults to DATABASE_URL
    #[arg(long)]
    pub db: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ImportArgs {
    /// Path to the exports directory
    pub path: PathBuf,

    /// Database file; defaults to DATABASE_URL
    #[arg(long)]
    pub db: Option<PathBuf>,
}
