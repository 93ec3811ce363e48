use crate::core::DbError;
use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Outcomes of an entity store operation other than success.
///
/// `VersionConflict` covers both a stale version and a row that no longer
/// exists: a conditional write cannot tell them apart.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),

    #[error("{entity} '{id}' is not at version {version}")]
    VersionConflict {
        entity: &'static str,
        id: String,
        version: i64,
    },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("datastore error: {0}")]
    Datastore(#[source] DbError),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn version_conflict(entity: &'static str, id: impl Into<String>, version: i64) -> Self {
        Self::VersionConflict {
            entity,
            id: id.into(),
            version,
        }
    }

    pub fn is_version_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_referential_integrity(&self) -> bool {
        matches!(self, Self::ReferentialIntegrity(_))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<DbError> for StoreError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::ConnectionError(msg) => Self::Connection(msg),
            DbError::TransactionError(msg) => Self::Connection(msg),
            DbError::ForeignKeyViolation(msg) => Self::ReferentialIntegrity(msg),
            other => Self::Datastore(other),
        }
    }
}
