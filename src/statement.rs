// ============================================================================
// Statement Model
// ============================================================================
//
// The small, typed subset of SQL the entity store needs. Backends either
// interpret it directly (memory) or render it to parameterized SQL (mysql).
//
// ============================================================================

use crate::core::Value;

/// Conjunction of equality predicates: `a = ? AND b = ?`.
///
/// An empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    /// `column = value`
    Set(String, Value),
    /// `column = column + delta`
    Increment(String, i64),
}

impl Assignment {
    pub fn column(&self) -> &str {
        match self {
            Assignment::Set(column, _) | Assignment::Increment(column, _) => column,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Insert {
        table: String,
        values: Vec<(String, Value)>,
    },
    Update {
        table: String,
        assignments: Vec<Assignment>,
        filter: Filter,
    },
    Delete {
        table: String,
        filter: Filter,
    },
}

impl Statement {
    pub fn insert(table: impl Into<String>) -> InsertBuilder {
        InsertBuilder {
            table: table.into(),
            values: Vec::new(),
        }
    }

    pub fn update(table: impl Into<String>) -> UpdateBuilder {
        UpdateBuilder {
            table: table.into(),
            assignments: Vec::new(),
        }
    }

    pub fn delete(table: impl Into<String>, filter: Filter) -> Self {
        Statement::Delete {
            table: table.into(),
            filter,
        }
    }
}

pub struct InsertBuilder {
    table: String,
    values: Vec<(String, Value)>,
}

impl InsertBuilder {
    pub fn value(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.push((column.into(), value.into()));
        self
    }

    pub fn build(self) -> Statement {
        Statement::Insert {
            table: self.table,
            values: self.values,
        }
    }
}

pub struct UpdateBuilder {
    table: String,
    assignments: Vec<Assignment>,
}

impl UpdateBuilder {
    pub fn set(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.assignments.push(Assignment::Set(column.into(), value.into()));
        self
    }

    pub fn increment(mut self, column: impl Into<String>, delta: i64) -> Self {
        self.assignments.push(Assignment::Increment(column.into(), delta));
        self
    }

    pub fn filter(self, filter: Filter) -> Statement {
        Statement::Update {
            table: self.table,
            assignments: self.assignments,
            filter,
        }
    }
}

/// `SELECT columns FROM table WHERE filter`, expected to match at most one row.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub table: String,
    pub columns: Vec<String>,
    pub filter: Filter,
}

impl Query {
    pub fn select<I, S>(table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            filter: Filter::all(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_builder() {
        let stmt = Statement::update("employee")
            .set("first_name", "Tony")
            .increment("version", 1)
            .filter(Filter::new().eq("uuid", "e1").eq("version", 2i64));

        match stmt {
            Statement::Update { table, assignments, filter } => {
                assert_eq!(table, "employee");
                assert_eq!(assignments.len(), 2);
                assert_eq!(assignments[1].column(), "version");
                assert_eq!(filter.conditions().len(), 2);
            }
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_filter_matches_all() {
        assert!(Filter::all().is_empty());
        let stmt = Statement::delete("timer", Filter::all());
        assert!(matches!(stmt, Statement::Delete { ref table, ref filter } if table == "timer" && filter.is_empty()));
    }
}
