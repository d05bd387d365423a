use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Result;
use crate::{DEFAULT_LOG_FILTER, DEFAULT_PAIR_CACHE_SIZE};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SemDistConfig {
    pub snapshot_path: Option<PathBuf>,
    pub matrix_path: Option<PathBuf>,

    /// Default `force` flag for set distance and dispersion queries.
    pub force: bool,

    /// Capacity of the pairwise distance cache; 0 disables it.
    pub pair_cache_size: usize,

    pub log_filter: String,
}

impl SemDistConfig {
    pub fn new() -> Self {
        Self {
            snapshot_path: None,
            matrix_path: None,
            force: false,
            pair_cache_size: DEFAULT_PAIR_CACHE_SIZE,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    pub fn from_env() -> Self {
        let mut config = Self::new();

        if let Ok(path) = std::env::var("SEMDIST_SNAPSHOT_PATH") {
            config.snapshot_path = Some(PathBuf::from(path));
        }
        if let Ok(path) = std::env::var("SEMDIST_MATRIX_PATH") {
            config.matrix_path = Some(PathBuf::from(path));
        }
        if let Some(force) = std::env::var("SEMDIST_FORCE")
            .ok()
            .and_then(|f| f.parse().ok())
        {
            config.force = force;
        }
        if let Some(size) = std::env::var("SEMDIST_PAIR_CACHE_SIZE")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.pair_cache_size = size;
        }
        if let Ok(filter) = std::env::var("SEMDIST_LOG_FILTER") {
            config.log_filter = filter;
        }

        config
    }

    /// Layers an optional config file under `SEMDIST_*` environment variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let defaults = Self::new();
        let mut builder = config::Config::builder()
            .set_default("force", defaults.force)?
            .set_default("pair_cache_size", defaults.pair_cache_size as i64)?
            .set_default("log_filter", defaults.log_filter)?;

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let config = builder
            .add_source(config::Environment::with_prefix("SEMDIST").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(config)
    }
}

impl Default for SemDistConfig {
    fn default() -> Self {
        Self::new()
    }
}
