use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Table '{0}' already exists")]
    TableExists(String),

    #[error("Table '{0}' not found")]
    TableNotFound(String),

    #[error("Column '{0}' not found in table '{1}'")]
    ColumnNotFound(String, String),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Unique constraint violation: column '{column}' of '{table}' already contains {value}")]
    UniqueViolation {
        table: String,
        column: String,
        value: String,
    },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction error: {0}")]
    TransactionError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Backend error: {0}")]
    BackendError(String),
}

impl DbError {
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    pub fn is_foreign_key_violation(&self) -> bool {
        matches!(self, Self::ForeignKeyViolation(_))
    }
}

pub type Result<T> = std::result::Result<T, DbError>;

#[cfg(feature = "mysql")]
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind;

        match &err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => Self::UniqueViolation {
                    table: db_err.table().unwrap_or_default().to_string(),
                    column: String::new(),
                    value: db_err.message().to_string(),
                },
                ErrorKind::ForeignKeyViolation => {
                    Self::ForeignKeyViolation(db_err.message().to_string())
                }
                ErrorKind::NotNullViolation | ErrorKind::CheckViolation => {
                    Self::ConstraintViolation(db_err.message().to_string())
                }
                _ => Self::BackendError(db_err.message().to_string()),
            },
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Configuration(_) => Self::ConnectionError(err.to_string()),
            _ => Self::BackendError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_violation_helpers() {
        let unique = DbError::UniqueViolation {
            table: "employee".into(),
            column: "email_address".into(),
            value: "'a@x.com'".into(),
        };
        assert!(unique.is_unique_violation());
        assert!(!unique.is_foreign_key_violation());

        let fk = DbError::ForeignKeyViolation("timer.employee_id".into());
        assert!(fk.is_foreign_key_violation());
        assert!(fk.to_string().starts_with("Foreign key violation"));
    }
}
