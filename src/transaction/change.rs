// ============================================================================
// Transaction Change Tracking
// ============================================================================
//
// Every mutation applied to storage records its inverse here. Commit simply
// forgets the log; rollback replays it newest-first.
//
// ============================================================================

use crate::core::Row;

/// Represents a single reversible change in a transaction
#[derive(Debug, Clone)]
pub enum Change {
    /// A row was inserted; undo deletes it.
    InsertRow { table: String, row_id: usize },

    /// A row was replaced; undo puts `old_row` back.
    UpdateRow {
        table: String,
        row_id: usize,
        old_row: Row,
    },

    /// A row was removed; undo restores it under the same id.
    DeleteRow {
        table: String,
        row_id: usize,
        old_row: Row,
    },
}

impl Change {
    /// Get the table name affected by this change
    pub fn table_name(&self) -> &str {
        match self {
            Change::InsertRow { table, .. } => table,
            Change::UpdateRow { table, .. } => table,
            Change::DeleteRow { table, .. } => table,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;

    #[test]
    fn test_change_accessors() {
        let change = Change::UpdateRow {
            table: "employee".to_string(),
            row_id: 7,
            old_row: vec![Value::Integer(1)],
        };
        assert_eq!(change.table_name(), "employee");
    }
}
