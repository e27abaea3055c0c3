use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

/// Connection settings for the SQLite store
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub db_path: PathBuf,
    /// Upper bound on simultaneously open connections
    pub pool_size: usize,
    /// How long `Store::session` waits for a free connection
    pub acquire_timeout: Duration,
    /// SQLite busy timeout applied to every connection
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub const DEFAULT_POOL_SIZE: usize = 4;
    pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            pool_size: Self::DEFAULT_POOL_SIZE,
            acquire_timeout: Self::DEFAULT_ACQUIRE_TIMEOUT,
            busy_timeout: Self::DEFAULT_BUSY_TIMEOUT,
        }
    }

    pub fn with_pool_size(self, pool_size: usize) -> Self {
        Self { pool_size, ..self }
    }

    pub fn with_acquire_timeout(self, acquire_timeout: Duration) -> Self {
        Self {
            acquire_timeout,
            ..self
        }
    }

    /// Store in the platform data directory, used when no path is given
    pub fn in_data_dir() -> Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "quake-analytics")
            .context("Could not determine data directory")?;
        let data_dir = proj_dirs.data_dir();

        std::fs::create_dir_all(data_dir).context("Failed to create data directory")?;

        Ok(Self::new(data_dir.join("earthquakes.db")))
    }
}

/// Defaults applied by the query engine when a caller omits a parameter
#[derive(Debug, Clone)]
pub struct QueryConfig {
    /// Number of regions returned by the most-active query
    pub default_top_n: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self { default_top_n: 5 }
    }
}
