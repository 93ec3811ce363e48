// ============================================================================
// Entity Store
// ============================================================================
//
// Versioned create / conditional write / read / delete for employees and
// timers. Every mutation runs in an explicit transaction; a conditional
// write only lands when the caller's version is still the current one.
//
// ============================================================================

pub mod employee;
pub mod error;
pub mod timer;

pub use error::{StoreError, StoreResult};

use crate::connection::Transaction;
use crate::model::TableNames;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Version and provenance of the running build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub version: String,
    pub commit: Option<String>,
    pub branch: Option<String>,
}

impl BuildInfo {
    /// Taken from the compile-time environment (`GIT_COMMIT`, `GIT_BRANCH`).
    pub fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            commit: option_env!("GIT_COMMIT").map(str::to_string),
            branch: option_env!("GIT_BRANCH").map(str::to_string),
        }
    }
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "version {} (commit {}, branch {})",
            self.version,
            self.commit.as_deref().unwrap_or("unknown"),
            self.branch.as_deref().unwrap_or("unknown")
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    pub tables: TableNames,
    pub build: BuildInfo,
}

impl StoreConfig {
    pub fn new(tables: TableNames) -> Self {
        Self {
            tables,
            build: BuildInfo::current(),
        }
    }
}

/// Stateless apart from its configuration: every call takes the datastore
/// handle it should run against.
#[derive(Debug, Clone, Default)]
pub struct EntityStore {
    config: StoreConfig,
}

impl EntityStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn tables(&self) -> &TableNames {
        &self.config.tables
    }
}

/// Commits on success. On failure the transaction is rolled back and the
/// original error returned.
async fn settle<T>(tx: Box<dyn Transaction>, outcome: StoreResult<T>) -> StoreResult<T> {
    match outcome {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                debug!(error = %rollback_err, "rollback after failed operation also failed");
            }
            Err(err)
        }
    }
}

/// Read-only work: always rolled back.
async fn discard<T>(tx: Box<dyn Transaction>, outcome: StoreResult<T>) -> StoreResult<T> {
    let value = outcome?;
    tx.rollback().await?;
    Ok(value)
}
