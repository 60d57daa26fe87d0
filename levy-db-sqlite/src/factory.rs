use std::path::PathBuf;

use async_trait::async_trait;
use levy_core::db::repository::{LevyRepository, RepositoryError};
use levy_core::db::{DbConfig, RepositoryFactory};
use tracing::debug;

use crate::repository::SqliteRepository;

pub const SEEDS_DIR_ENV: &str = "LEVY_DB_SQLITE_SEEDS_DIR";

/// Resolve the seeds directory at runtime.
///
/// Resolution order:
/// 1. **`LEVY_DB_SQLITE_SEEDS_DIR`** if set.
/// 2. **`./seeds`** if it exists in the current working directory.
/// 3. **`$CARGO_MANIFEST_DIR/seeds`** when running from the build tree.
pub fn seeds_dir() -> PathBuf {
    if let Ok(dir) = std::env::var(SEEDS_DIR_ENV) {
        return PathBuf::from(dir);
    }
    let cwd_seeds = PathBuf::from("./seeds");
    if cwd_seeds.is_dir() {
        return cwd_seeds;
    }
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("seeds")
}

/// [`RepositoryFactory`] for SQLite.
///
/// ```rust,no_run
/// use levy_core::db::RepositoryRegistry;
/// use levy_db_sqlite::SqliteRepositoryFactory;
///
/// let mut registry = RepositoryRegistry::new();
/// registry.register(Box::new(SqliteRepositoryFactory));
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Opens `config.connection_string` (a file path, `sqlite:` URL or
    /// `:memory:`), applies migrations and seeds a brand-new store with the
    /// standard levies. An existing store is opened as it was left.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn LevyRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.connection_string)
            .await
            .map_err(|e| RepositoryError::Connection(format!("{e:#}")))?;
        repo.run_migrations()
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;

        let seeds = seeds_dir();
        let applied = repo
            .run_seeds(&seeds)
            .await
            .map_err(|e| RepositoryError::Database(format!("{e:#}")))?;
        debug!(seeds_dir = %seeds.display(), applied, "rate store ready");
        Ok(Box::new(repo))
    }
}
