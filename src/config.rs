//! Board configuration with named presets and TOML loading.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hydrate::HydrationStrategy;
use crate::query::assembler::ConversionColumns;

/// Tunables for a [`crate::service::JobBoard`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoardConfig {
    /// Page size used when a request leaves it unset.
    pub default_page_size: u64,
    /// Upper clamp for requested page sizes.
    pub max_page_size: u64,
    /// How nested attributes are fetched.
    pub hydration: HydrationStrategy,
    /// Hydrated entities kept in memory; 0 disables the cache.
    pub entity_cache_capacity: usize,
    /// Converted salary columns to project when the dataset has them.
    pub salary_conversion: Option<ConversionColumns>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self::interactive()
    }
}

impl BoardConfig {
    /// In-process dataset, moderate pages, one follow-up query per entity.
    pub fn interactive() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 200,
            hydration: HydrationStrategy::PerEntity,
            entity_cache_capacity: 256,
            salary_conversion: Some(ConversionColumns::default()),
        }
    }

    /// High-latency executor: attributes batched per page, larger cache.
    pub fn remote() -> Self {
        Self {
            hydration: HydrationStrategy::Batched,
            entity_cache_capacity: 1024,
            ..Self::interactive()
        }
    }

    /// Parses a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(ConfigError::Invalid("page sizes must be at least 1".into()));
        }
        if self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size {} exceeds max_page_size {}",
                self.default_page_size, self.max_page_size
            )));
        }
        if let Some(conversion) = &self.salary_conversion {
            if !conversion.is_valid() {
                return Err(ConfigError::Invalid(format!(
                    "salary conversion columns '{}'/'{}' are not plain identifiers",
                    conversion.min_column, conversion.max_column
                )));
            }
        }
        Ok(())
    }

    /// Resolves a requested page size against the default and the clamp.
    pub fn page_size(&self, requested: Option<u64>) -> u64 {
        requested
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
    }
}

/// Failures while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// File is not valid TOML for this schema.
    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        /// File path, or `<inline>` for in-memory documents.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// Values parsed but violate a constraint.
    #[error("invalid config: {0}")]
    Invalid(String),
}
