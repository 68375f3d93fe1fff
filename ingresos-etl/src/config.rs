//! Configuration loading
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file,
//! environment variables (a `.env` file is honoured), CLI flags.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::db::Backend;
use crate::error::EtlResult;
use crate::extract::{DEFAULT_SHEET, LocalObjectStore, ObjectStore, S3ObjectStore};
use crate::load::{DEFAULT_TABLE, TableDefinition};
use crate::transform::SheetLayout;

pub const ENV_DATABASE_URL: &str = "INGRESOS_DATABASE_URL";
pub const ENV_TABLE: &str = "INGRESOS_TABLE";
pub const ENV_BUCKET: &str = "INGRESOS_BUCKET";
pub const ENV_S3_ENDPOINT: &str = "INGRESOS_S3_ENDPOINT";
pub const ENV_S3_REGION: &str = "INGRESOS_S3_REGION";
pub const ENV_LOCAL_STORE: &str = "INGRESOS_LOCAL_STORE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub sheet: SheetConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection string, `sqlite://...` or `postgres://...`
    pub url: String,
    pub table: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ingresos.db".to_string(),
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

/// Object storage. Credentials are never stored here: S3 reads use the
/// standard AWS credential chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    /// S3-compatible endpoint (MinIO, LocalStack); AWS when unset
    pub endpoint: Option<String>,
    /// Overrides `AWS_REGION` and the profile region
    pub region: Option<String>,
    /// Serve objects from `{local_root}/{bucket}/{key}` instead of S3
    pub local_root: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub name: String,
    pub layout: SheetLayout,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_SHEET.to_string(),
            layout: SheetLayout::default(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/ingresos-etl/config.toml` or the platform equivalent
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ingresos-etl").join("config.toml"))
    }

    /// Load from `path` (or the default location), then apply the environment.
    /// A missing file at the default location is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Ok(env_file) = dotenvy::dotenv() {
            log::debug!("Loaded environment from {}", env_file.display());
        }

        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(path) => Self::from_file(&path)?,
                None => Self::default(),
            },
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override fields from environment variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = lookup(ENV_DATABASE_URL) {
            self.database.url = url;
        }
        if let Some(table) = lookup(ENV_TABLE) {
            self.database.table = table;
        }
        if let Some(bucket) = lookup(ENV_BUCKET) {
            self.storage.bucket = Some(bucket);
        }
        if let Some(endpoint) = lookup(ENV_S3_ENDPOINT) {
            self.storage.endpoint = Some(endpoint);
        }
        if let Some(region) = lookup(ENV_S3_REGION) {
            self.storage.region = Some(region);
        }
        if let Some(root) = lookup(ENV_LOCAL_STORE) {
            self.storage.local_root = Some(PathBuf::from(root));
        }
    }

    pub fn table(&self) -> EtlResult<TableDefinition> {
        TableDefinition::new(&self.database.table)
    }

    pub fn backend(&self) -> EtlResult<Backend> {
        Backend::from_url(&self.database.url)
    }

    pub async fn object_store(&self) -> Box<dyn ObjectStore> {
        match &self.storage.local_root {
            Some(root) => {
                log::info!("Reading objects from local store {}", root.display());
                Box::new(LocalObjectStore::new(root))
            }
            None => Box::new(
                S3ObjectStore::from_env(self.storage.region.clone(), self.storage.endpoint.clone())
                    .await,
            ),
        }
    }
}
