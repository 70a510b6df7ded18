//! Runtime configuration for an SRM instance.

use crate::db::DB_FILE_NAME;
use std::path::{Path, PathBuf};

const LOG_DIR_NAME: &str = "logs";
const CATALOG_DIR_NAME: &str = "catalog";

/// Where state lives and where catalogs come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SrmConfig {
    /// Directory holding the snapshot database and logs.
    pub data_dir: PathBuf,
    /// Catalog directory or `http(s)://` base URL.
    pub catalog_location: String,
    /// One of `trace|debug|info|warn|error`.
    pub log_level: String,
}

impl SrmConfig {
    /// Config rooted at `data_dir` with catalogs under `<data_dir>/catalog`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let catalog_location = data_dir.join(CATALOG_DIR_NAME).display().to_string();
        Self {
            data_dir,
            catalog_location,
            log_level: crate::logging::default_log_level().to_string(),
        }
    }

    pub fn with_catalog_location(mut self, location: impl Into<String>) -> Self {
        self.catalog_location = location.into();
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join(DB_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join(LOG_DIR_NAME)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
