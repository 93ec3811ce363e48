//! Physical layout of the employee and timer tables.
//!
//! Both tables carry an auto-assigned integer `id` next to the caller's
//! string identifier (`uuid`). Timers reference their owner through the
//! integer key. `sql/schema.sql` is the MySQL rendition of the same layout.

use super::TableNames;
use crate::core::{Column, DataType};
use crate::storage::TableSchema;

pub const ID: &str = "id";
pub const UUID: &str = "uuid";
pub const VERSION: &str = "version";

pub const FIRST_NAME: &str = "first_name";
pub const LAST_NAME: &str = "last_name";
pub const EMAIL_ADDRESS: &str = "email_address";
pub const LAST_UPDATED: &str = "last_updated";

pub const COMMENT: &str = "comment";
pub const START: &str = "start";
pub const FINISH: &str = "finish";
pub const COMPLETED: &str = "completed";
pub const EMPLOYEE_ID: &str = "employee_id";

pub fn employee_table(name: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            Column::new(ID, DataType::Integer).primary_key().auto_increment(),
            Column::new(UUID, DataType::Text).not_null().unique(),
            Column::new(FIRST_NAME, DataType::Text).not_null().default_value(""),
            Column::new(LAST_NAME, DataType::Text).not_null().default_value(""),
            Column::new(EMAIL_ADDRESS, DataType::Text).not_null().unique(),
            Column::new(VERSION, DataType::Integer).not_null().default_value(1i64),
            Column::new(LAST_UPDATED, DataType::Timestamp),
        ],
    )
}

pub fn timer_table(name: &str, employee_table: &str) -> TableSchema {
    TableSchema::new(
        name,
        vec![
            Column::new(ID, DataType::Integer).primary_key().auto_increment(),
            Column::new(UUID, DataType::Text).not_null().unique(),
            Column::new(COMMENT, DataType::Text).not_null().default_value(""),
            Column::new(START, DataType::Integer).not_null(),
            Column::new(FINISH, DataType::Integer).not_null().default_value(0i64),
            Column::new(COMPLETED, DataType::Boolean).not_null().default_value(false),
            Column::new(VERSION, DataType::Integer).not_null().default_value(1i64),
            Column::new(EMPLOYEE_ID, DataType::Integer)
                .not_null()
                .references(employee_table, ID),
        ],
    )
}

/// Every table, parents first.
pub fn tables(names: &TableNames) -> Vec<TableSchema> {
    vec![
        employee_table(&names.employee),
        timer_table(&names.timer, &names.employee),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timer_references_employee_surrogate_key() {
        let names = TableNames::default();
        let schemas = tables(&names);
        assert_eq!(schemas[0].name(), "employee");

        let fk = schemas[1]
            .schema()
            .get_column(EMPLOYEE_ID)
            .and_then(|col| col.references.clone())
            .unwrap();
        assert_eq!(fk.table, "employee");
        assert_eq!(fk.column, ID);
    }
}
