use crate::core::{Column, DbError, Result, Row, Schema, Value};
use crate::statement::Filter;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct Table {
    schema: TableSchema,
    rows: BTreeMap<usize, Row>,
    next_row_id: usize,
    next_serial: i64,
    /// Unique and primary key columns: value -> row id.
    indexes: HashMap<String, HashMap<Value, usize>>,
}

impl Table {
    pub fn new(schema: TableSchema) -> Self {
        let indexes = schema
            .schema()
            .columns()
            .iter()
            .filter(|col| col.is_key())
            .map(|col| (col.name.clone(), HashMap::new()))
            .collect();

        Self {
            schema,
            rows: BTreeMap::new(),
            next_row_id: 0,
            next_serial: 1,
            indexes,
        }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    /// Builds a full row from named values, filling auto-increment columns,
    /// defaults and NULLs for everything not supplied.
    pub fn prepare_row(&mut self, values: &[(String, Value)]) -> Result<Row> {
        for (name, _) in values {
            self.column_index(name)?;
        }

        let mut row = Row::with_capacity(self.schema.schema().column_count());
        for column in self.schema.schema().columns() {
            let supplied = values.iter().find(|(name, _)| *name == column.name).map(|(_, v)| v.clone());
            let value = match supplied {
                Some(value) => value,
                None if column.auto_increment => {
                    let serial = self.next_serial;
                    self.next_serial += 1;
                    Value::Integer(serial)
                }
                None => column.default.clone().unwrap_or(Value::Null),
            };
            row.push(value);
        }

        if let Some(serial) = self.max_serial(&row) {
            self.next_serial = self.next_serial.max(serial + 1);
        }

        Ok(row)
    }

    fn max_serial(&self, row: &Row) -> Option<i64> {
        self.schema
            .schema()
            .columns()
            .iter()
            .zip(row.iter())
            .filter(|(col, _)| col.auto_increment)
            .filter_map(|(_, value)| value.as_i64())
            .max()
    }

    pub fn insert(&mut self, row: Row) -> Result<usize> {
        self.validate_row(&row)?;
        self.check_uniqueness(&row, None)?;

        let id = self.next_row_id;
        self.next_row_id += 1;

        self.update_indexes(id, &row);
        self.rows.insert(id, row);
        Ok(id)
    }

    /// Replaces the row and returns the previous contents.
    pub fn update(&mut self, id: usize, new_row: Row) -> Result<Row> {
        self.validate_row(&new_row)?;
        self.check_uniqueness(&new_row, Some(id))?;

        let old = self
            .rows
            .insert(id, new_row.clone())
            .ok_or_else(|| DbError::TransactionError(format!("row {} vanished from '{}'", id, self.name())))?;

        self.remove_from_indexes(id, &old);
        self.update_indexes(id, &new_row);
        Ok(old)
    }

    pub fn delete(&mut self, id: usize) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        self.remove_from_indexes(id, &row);
        Some(row)
    }

    /// Puts a row back under its original id. Only the undo log calls this.
    pub(crate) fn restore(&mut self, id: usize, row: Row) {
        if let Some(current) = self.rows.remove(&id) {
            self.remove_from_indexes(id, &current);
        }
        self.update_indexes(id, &row);
        self.rows.insert(id, row);
    }

    pub fn get(&self, id: usize) -> Option<&Row> {
        self.rows.get(&id)
    }

    /// Row ids matching every condition of the filter, in insertion order.
    pub fn matching(&self, filter: &Filter) -> Result<Vec<usize>> {
        let mut resolved = Vec::with_capacity(filter.conditions().len());
        for (name, value) in filter.conditions() {
            resolved.push((self.column_index(name)?, name.as_str(), value));
        }

        // A key column narrows the search to at most one row.
        if let Some((_, name, value)) = resolved.iter().find(|(_, name, _)| self.indexes.contains_key(*name)) {
            let candidate = self.indexes.get(*name).and_then(|index| index.get(*value)).copied();
            return Ok(candidate
                .filter(|id| self.rows.get(id).is_some_and(|row| Self::row_matches(row, &resolved)))
                .into_iter()
                .collect());
        }

        Ok(self
            .rows
            .iter()
            .filter(|(_, row)| Self::row_matches(row, &resolved))
            .map(|(id, _)| *id)
            .collect())
    }

    fn row_matches(row: &Row, resolved: &[(usize, &str, &Value)]) -> bool {
        resolved.iter().all(|(idx, _, value)| &row[*idx] == *value)
    }

    pub fn contains_value(&self, column: &str, value: &Value) -> Result<bool> {
        let idx = self.column_index(column)?;
        if let Some(index) = self.indexes.get(column) {
            return Ok(index.contains_key(value));
        }
        Ok(self.rows.values().any(|row| &row[idx] == value))
    }

    pub fn project(&self, row: &Row, columns: &[String]) -> Result<Row> {
        columns
            .iter()
            .map(|name| self.column_index(name).map(|idx| row[idx].clone()))
            .collect()
    }

    pub fn column_index(&self, name: &str) -> Result<usize> {
        self.schema
            .schema()
            .find_column_index(name)
            .ok_or_else(|| DbError::ColumnNotFound(name.to_string(), self.name().to_string()))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    fn check_uniqueness(&self, row: &Row, ignore_id: Option<usize>) -> Result<()> {
        for (col_idx, column) in self.schema.schema().columns().iter().enumerate() {
            if !column.is_key() {
                continue;
            }
            let value = &row[col_idx];
            if value.is_null() {
                continue;
            }
            let holder = self.indexes.get(&column.name).and_then(|index| index.get(value));
            if let Some(holder) = holder
                && Some(*holder) != ignore_id
            {
                return Err(DbError::UniqueViolation {
                    table: self.name().to_string(),
                    column: column.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    fn validate_row(&self, row: &Row) -> Result<()> {
        let columns = self.schema.schema().columns();
        if row.len() != columns.len() {
            return Err(DbError::TypeMismatch(format!(
                "Expected {} columns, got {}",
                columns.len(),
                row.len()
            )));
        }
        for (column, value) in columns.iter().zip(row.iter()) {
            column.validate(value)?;
        }
        Ok(())
    }

    fn update_indexes(&mut self, id: usize, row: &Row) {
        for (col_name, index) in &mut self.indexes {
            if let Some(col_idx) = self.schema.schema().find_column_index(col_name) {
                let value = &row[col_idx];
                if !value.is_null() {
                    index.insert(value.clone(), id);
                }
            }
        }
    }

    fn remove_from_indexes(&mut self, id: usize, row: &Row) {
        for (col_name, index) in &mut self.indexes {
            if let Some(col_idx) = self.schema.schema().find_column_index(col_name) {
                let value = &row[col_idx];
                if index.get(value) == Some(&id) {
                    index.remove(value);
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSchema {
    name: String,
    schema: Schema,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            schema: Schema::new(columns),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}
