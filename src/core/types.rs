use std::fmt;
use super::{DbError, Result, Value};

pub type Row = Vec<Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Integer,
    Text,
    Boolean,
    Timestamp,
}

impl DataType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (DataType::Integer, Value::Integer(_))
                | (DataType::Text, Value::Text(_))
                | (DataType::Boolean, Value::Boolean(_))
                | (DataType::Timestamp, Value::Timestamp(_))
        )
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Integer => write!(f, "INTEGER"),
            DataType::Text => write!(f, "TEXT"),
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
        }
    }
}

/// `REFERENCES table(column)`, enforced with RESTRICT semantics on delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub table: String,
    pub column: String,
}

#[derive(Debug, Clone)]
pub struct Column {
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
    pub primary_key: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<Value>,
    pub references: Option<ForeignKey>,
}

impl Column {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            primary_key: false,
            unique: false,
            auto_increment: false,
            default: None,
            references: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some(ForeignKey {
            table: table.into(),
            column: column.into(),
        });
        self
    }

    pub fn is_key(&self) -> bool {
        self.primary_key || self.unique
    }

    pub fn validate(&self, value: &Value) -> Result<()> {
        if matches!(value, Value::Null) {
            if !self.nullable {
                return Err(DbError::ConstraintViolation(format!(
                    "Column '{}' cannot be NULL",
                    self.name
                )));
            }
            return Ok(());
        }

        if !self.data_type.is_compatible(value) {
            return Err(DbError::TypeMismatch(format!(
                "Column '{}' expects type {}, got {}",
                self.name,
                self.data_type,
                value.type_name()
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn find_column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|col| col.name == name)
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.find_column_index(name).map(|idx| &self.columns[idx])
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Sequential, typed access to the columns of a projected row.
///
/// Queries name their columns up front, so decoders read them back in the
/// same order and fail with `TypeMismatch` on anything unexpected.
pub struct RowReader {
    values: std::vec::IntoIter<Value>,
    position: usize,
}

impl RowReader {
    pub fn new(row: Row) -> Self {
        Self {
            values: row.into_iter(),
            position: 0,
        }
    }

    fn next_value(&mut self) -> Result<Value> {
        let position = self.position;
        self.position += 1;
        self.values.next().ok_or_else(|| {
            DbError::TypeMismatch(format!("row has no column at position {}", position))
        })
    }

    fn mismatch(&self, expected: &str, got: &Value) -> DbError {
        DbError::TypeMismatch(format!(
            "column {} expected {}, got {}",
            self.position - 1,
            expected,
            got.type_name()
        ))
    }

    pub fn text(&mut self) -> Result<String> {
        match self.next_value()? {
            Value::Text(s) => Ok(s),
            other => Err(self.mismatch("TEXT", &other)),
        }
    }

    pub fn integer(&mut self) -> Result<i64> {
        let value = self.next_value()?;
        value.as_i64().ok_or_else(|| self.mismatch("INTEGER", &value))
    }

    pub fn boolean(&mut self) -> Result<bool> {
        let value = self.next_value()?;
        value.as_bool().ok_or_else(|| self.mismatch("BOOLEAN", &value))
    }

    pub fn timestamp(&mut self) -> Result<Option<chrono::DateTime<chrono::Utc>>> {
        match self.next_value()? {
            Value::Null => Ok(None),
            Value::Timestamp(ts) => Ok(Some(ts)),
            other => Err(self.mismatch("TIMESTAMP", &other)),
        }
    }
}
