//! Storage configuration.
//!
//! Read from the environment:
//!
//! | variable                   | default              |
//! |----------------------------|----------------------|
//! | `REPLENISH_DB_PATH`        | `replenishment.db`   |
//! | `REPLENISH_CACHE_CAPACITY` | 64 MiB (bytes)       |
//! | `REPLENISH_TEMPORARY`      | `false`              |
use anyhow::Context;
use std::path::PathBuf;

use crate::error::Result;

pub const DEFAULT_DB_PATH: &str = "replenishment.db";
pub const DEFAULT_CACHE_CAPACITY: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub cache_capacity: u64,
    pub temporary: bool, // delete the database on drop
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_DB_PATH),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            temporary: false,
        }
    }
}

impl StoreConfig {
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Throwaway database, removed when the last handle drops.
    pub fn temporary() -> Self {
        Self {
            temporary: true,
            ..Self::default()
        }
    }

    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`StoreConfig::from_env`] with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = lookup("REPLENISH_DB_PATH") {
            config.path = PathBuf::from(path);
        }
        if let Some(capacity) = lookup("REPLENISH_CACHE_CAPACITY") {
            config.cache_capacity = capacity
                .trim()
                .parse::<u64>()
                .with_context(|| format!("REPLENISH_CACHE_CAPACITY is not a byte count: {capacity}"))?;
        }
        if let Some(flag) = lookup("REPLENISH_TEMPORARY") {
            config.temporary = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => anyhow::bail!("REPLENISH_TEMPORARY must be a boolean, got {other}"),
            };
        }
        Ok(config)
    }

    pub fn sled_config(&self) -> sled::Config {
        let config = sled::Config::new()
            .cache_capacity(self.cache_capacity)
            .temporary(self.temporary);
        // sled picks its own scratch location for temporary databases
        if self.temporary {
            config
        } else {
            config.path(&self.path)
        }
    }

    pub fn open(&self) -> Result<sled::Db> {
        tracing::debug!(path = %self.path.display(), temporary = self.temporary, "opening store");
        Ok(self.sled_config().open()?)
    }
}
