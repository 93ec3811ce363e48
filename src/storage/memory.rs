use super::{Table, TableSchema};
use crate::core::{DbError, Result, Row, Value};
use crate::statement::{Assignment, Filter, Query, Statement};
use crate::transaction::Change;
use std::collections::HashMap;

/// Tables plus the cross-table rules (foreign keys) the single-table layer
/// can't see. Callers serialize access; every method assumes exclusive use.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tables: HashMap<String, Table>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            tables: HashMap::new(),
        }
    }

    pub fn create_table(&mut self, schema: TableSchema) -> Result<()> {
        let name = schema.name().to_string();

        if self.tables.contains_key(&name) {
            return Err(DbError::TableExists(name));
        }

        for column in schema.schema().columns() {
            if let Some(fk) = &column.references {
                let parent = self.get_table(&fk.table)?;
                parent.column_index(&fk.column)?;
            }
        }

        self.tables.insert(name, Table::new(schema));
        Ok(())
    }

    pub fn get_table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    fn get_table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(name)
            .ok_or_else(|| DbError::TableNotFound(name.to_string()))
    }

    /// Applies one statement atomically: either every row it touches is
    /// changed and the inverses are appended to `log`, or nothing is.
    pub fn execute(&mut self, statement: &Statement, log: &mut Vec<Change>) -> Result<u64> {
        let mut changes = Vec::new();
        let outcome = match statement {
            Statement::Insert { table, values } => self.insert(table, values, &mut changes),
            Statement::Update {
                table,
                assignments,
                filter,
            } => self.update(table, assignments, filter, &mut changes),
            Statement::Delete { table, filter } => self.delete(table, filter, &mut changes),
        };

        match outcome {
            Ok(affected) => {
                log.extend(changes);
                Ok(affected)
            }
            Err(err) => {
                self.revert(changes);
                Err(err)
            }
        }
    }

    /// First row matching the query, projected onto its columns.
    pub fn query_row(&self, query: &Query) -> Result<Option<Row>> {
        let table = self.get_table(&query.table)?;
        let ids = table.matching(&query.filter)?;
        match ids.first().and_then(|id| table.get(*id)) {
            Some(row) => Ok(Some(table.project(row, &query.columns)?)),
            None => Ok(None),
        }
    }

    /// Undoes changes newest-first.
    pub fn revert(&mut self, changes: Vec<Change>) {
        for change in changes.into_iter().rev() {
            let Some(table) = self.tables.get_mut(change.table_name()) else {
                continue;
            };
            match change {
                Change::InsertRow { row_id, .. } => {
                    table.delete(row_id);
                }
                Change::UpdateRow { row_id, old_row, .. } | Change::DeleteRow { row_id, old_row, .. } => {
                    table.restore(row_id, old_row);
                }
            }
        }
    }

    fn insert(&mut self, table_name: &str, values: &[(String, Value)], changes: &mut Vec<Change>) -> Result<u64> {
        let row = self.get_table_mut(table_name)?.prepare_row(values)?;
        self.check_references(table_name, &row, None)?;

        let row_id = self.get_table_mut(table_name)?.insert(row)?;
        changes.push(Change::InsertRow {
            table: table_name.to_string(),
            row_id,
        });
        Ok(1)
    }

    fn update(
        &mut self,
        table_name: &str,
        assignments: &[Assignment],
        filter: &Filter,
        changes: &mut Vec<Change>,
    ) -> Result<u64> {
        let planned = {
            let table = self.get_table(table_name)?;
            let mut planned = Vec::new();
            for row_id in table.matching(filter)? {
                let Some(old_row) = table.get(row_id) else {
                    continue;
                };
                let mut new_row = old_row.clone();
                for assignment in assignments {
                    let idx = table.column_index(assignment.column())?;
                    new_row[idx] = match assignment {
                        Assignment::Set(_, value) => value.clone(),
                        Assignment::Increment(_, delta) => new_row[idx].checked_add(*delta)?,
                    };
                }
                planned.push((row_id, old_row.clone(), new_row));
            }
            planned
        };

        for (_, old_row, new_row) in &planned {
            self.check_references(table_name, new_row, Some(old_row))?;
            self.check_not_referenced(table_name, old_row, Some(new_row))?;
        }

        let mut affected = 0;
        for (row_id, _, new_row) in planned {
            let old_row = self.get_table_mut(table_name)?.update(row_id, new_row)?;
            changes.push(Change::UpdateRow {
                table: table_name.to_string(),
                row_id,
                old_row,
            });
            affected += 1;
        }
        Ok(affected)
    }

    fn delete(&mut self, table_name: &str, filter: &Filter, changes: &mut Vec<Change>) -> Result<u64> {
        let doomed: Vec<(usize, Row)> = {
            let table = self.get_table(table_name)?;
            table
                .matching(filter)?
                .into_iter()
                .filter_map(|id| table.get(id).map(|row| (id, row.clone())))
                .collect()
        };

        let mut affected = 0;
        for (row_id, row) in doomed {
            self.check_not_referenced(table_name, &row, None)?;
            if let Some(old_row) = self.get_table_mut(table_name)?.delete(row_id) {
                changes.push(Change::DeleteRow {
                    table: table_name.to_string(),
                    row_id,
                    old_row,
                });
                affected += 1;
            }
        }
        Ok(affected)
    }

    /// Every non-NULL foreign key value of `row` must exist in its parent.
    /// Unchanged values (relative to `previous`) are not re-checked.
    fn check_references(&self, table_name: &str, row: &Row, previous: Option<&Row>) -> Result<()> {
        let table = self.get_table(table_name)?;
        for (idx, column) in table.schema().schema().columns().iter().enumerate() {
            let Some(fk) = &column.references else {
                continue;
            };
            let value = &row[idx];
            if value.is_null() || previous.is_some_and(|prev| &prev[idx] == value) {
                continue;
            }
            if !self.get_table(&fk.table)?.contains_value(&fk.column, value)? {
                return Err(DbError::ForeignKeyViolation(format!(
                    "{}.{} references non-existent key {} in {}({})",
                    table_name, column.name, value, fk.table, fk.column
                )));
            }
        }
        Ok(())
    }

    /// RESTRICT: a parent key may not disappear (delete, or change on update)
    /// while a child row still points at it.
    fn check_not_referenced(&self, table_name: &str, old_row: &Row, new_row: Option<&Row>) -> Result<()> {
        let table = self.get_table(table_name)?;
        for child in self.tables.values() {
            for column in child.schema().schema().columns() {
                let Some(fk) = &column.references else {
                    continue;
                };
                if fk.table != table_name {
                    continue;
                }
                let idx = table.column_index(&fk.column)?;
                let key = &old_row[idx];
                if key.is_null() || new_row.is_some_and(|new| &new[idx] == key) {
                    continue;
                }
                if child.contains_value(&column.name, key)? {
                    return Err(DbError::ForeignKeyViolation(format!(
                        "{}.{} = {} is still referenced by {}.{}",
                        table_name,
                        fk.column,
                        key,
                        child.name(),
                        column.name
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Column, DataType};

    fn storage() -> InMemoryStorage {
        let mut storage = InMemoryStorage::new();
        storage
            .create_table(TableSchema::new(
                "parent",
                vec![
                    Column::new("id", DataType::Integer).primary_key().auto_increment(),
                    Column::new("name", DataType::Text).not_null().unique(),
                ],
            ))
            .unwrap();
        storage
            .create_table(TableSchema::new(
                "child",
                vec![
                    Column::new("uuid", DataType::Text).primary_key(),
                    Column::new("parent_id", DataType::Integer).not_null().references("parent", "id"),
                ],
            ))
            .unwrap();
        storage
    }

    fn run(storage: &mut InMemoryStorage, statement: Statement) -> Result<u64> {
        let mut log = Vec::new();
        storage.execute(&statement, &mut log)
    }

    #[test]
    fn test_foreign_key_insert() {
        let mut storage = storage();
        run(&mut storage, Statement::insert("parent").value("name", "p").build()).unwrap();

        let ok = Statement::insert("child").value("uuid", "c1").value("parent_id", 1i64).build();
        assert_eq!(run(&mut storage, ok).unwrap(), 1);

        let dangling = Statement::insert("child").value("uuid", "c2").value("parent_id", 99i64).build();
        let err = run(&mut storage, dangling).unwrap_err();
        assert!(err.is_foreign_key_violation());
        assert_eq!(storage.get_table("child").unwrap().row_count(), 1);
    }

    #[test]
    fn test_delete_restricted_while_referenced() {
        let mut storage = storage();
        run(&mut storage, Statement::insert("parent").value("name", "p").build()).unwrap();
        run(
            &mut storage,
            Statement::insert("child").value("uuid", "c1").value("parent_id", 1i64).build(),
        )
        .unwrap();

        let err = run(&mut storage, Statement::delete("parent", Filter::all())).unwrap_err();
        assert!(err.is_foreign_key_violation());

        assert_eq!(run(&mut storage, Statement::delete("child", Filter::all())).unwrap(), 1);
        assert_eq!(run(&mut storage, Statement::delete("parent", Filter::all())).unwrap(), 1);
    }

    #[test]
    fn test_failed_statement_leaves_no_partial_state() {
        let mut storage = storage();
        for name in ["a", "b"] {
            run(&mut storage, Statement::insert("parent").value("name", name).build()).unwrap();
        }

        // Renaming every row to the same value trips the unique index on the second row.
        let stmt = Statement::update("parent").set("name", "same").filter(Filter::all());
        assert!(run(&mut storage, stmt).unwrap_err().is_unique_violation());

        let names: Vec<_> = ["a", "b"]
            .iter()
            .map(|name| {
                storage
                    .query_row(&Query::select("parent", ["name"]).filter(Filter::new().eq("name", *name)))
                    .unwrap()
            })
            .collect();
        assert!(names.iter().all(Option::is_some));
    }

    #[test]
    fn test_revert_log() {
        let mut storage = storage();
        let mut log = Vec::new();
        storage
            .execute(&Statement::insert("parent").value("name", "p").build(), &mut log)
            .unwrap();
        storage
            .execute(
                &Statement::update("parent").increment("id", 10).filter(Filter::all()),
                &mut log,
            )
            .unwrap();
        assert_eq!(log.len(), 2);

        storage.revert(log);
        assert_eq!(storage.get_table("parent").unwrap().row_count(), 0);
    }

    #[test]
    fn test_increment_and_query() {
        let mut storage = storage();
        run(&mut storage, Statement::insert("parent").value("name", "p").build()).unwrap();
        let affected = run(
            &mut storage,
            Statement::update("parent")
                .increment("id", 1)
                .filter(Filter::new().eq("name", "p").eq("id", 1i64)),
        )
        .unwrap();
        assert_eq!(affected, 1);

        let row = storage
            .query_row(&Query::select("parent", ["id"]).filter(Filter::new().eq("name", "p")))
            .unwrap();
        assert_eq!(row, Some(vec![Value::Integer(2)]));
    }
}
