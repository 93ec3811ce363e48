use super::config::DatabaseConfig;
use super::{Executor, Querier, Transaction, Transactional};
use crate::core::{DbError, Result, Row, Value};
use crate::statement::{Assignment, Filter, Query, Statement};
use async_trait::async_trait;
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::{Column as _, MySql, Row as _, TypeInfo as _, ValueRef as _};
use tracing::debug;

type MySqlQuery<'q> = sqlx::query::Query<'q, MySql, MySqlArguments>;

/// `sqlx` MySQL pool speaking the statement model.
#[derive(Clone)]
pub struct MySqlDatastore {
    pool: MySqlPool,
}

impl MySqlDatastore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.mysql_url())
            .await
            .map_err(|err| DbError::ConnectionError(err.to_string()))?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl Executor for MySqlDatastore {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let (sql, params) = render_statement(statement);
        let result = bind_all(sqlx::query(&sql), params).execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl Querier for MySqlDatastore {
    async fn query_row(&self, query: &Query) -> Result<Option<Row>> {
        let (sql, params) = render_query(query);
        let row = bind_all(sqlx::query(&sql), params)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }
}

#[async_trait]
impl Transactional for MySqlDatastore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|err| DbError::ConnectionError(err.to_string()))?;
        Ok(Box::new(MySqlTransaction { tx }))
    }
}

/// Rolled back by `sqlx` when dropped without commit.
pub struct MySqlTransaction {
    tx: sqlx::Transaction<'static, MySql>,
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let (sql, params) = render_statement(statement);
        let result = bind_all(sqlx::query(&sql), params).execute(&mut *self.tx).await?;
        Ok(result.rows_affected())
    }

    async fn query_row(&mut self, query: &Query) -> Result<Option<Row>> {
        let (sql, params) = render_query(query);
        let row = bind_all(sqlx::query(&sql), params)
            .fetch_optional(&mut *self.tx)
            .await?;
        row.as_ref().map(decode_row).transpose()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        debug!("mysql commit");
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        debug!("mysql rollback");
        self.tx.rollback().await?;
        Ok(())
    }
}

fn quote(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

fn render_filter(filter: &Filter, sql: &mut String, params: &mut Vec<Value>) {
    if filter.is_empty() {
        return;
    }
    let predicates: Vec<String> = filter
        .conditions()
        .iter()
        .map(|(column, value)| {
            params.push(value.clone());
            format!("{} = ?", quote(column))
        })
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&predicates.join(" AND "));
}

pub(crate) fn render_statement(statement: &Statement) -> (String, Vec<Value>) {
    let mut params = Vec::new();
    let sql = match statement {
        Statement::Insert { table, values } => {
            let columns: Vec<String> = values.iter().map(|(column, _)| quote(column)).collect();
            let placeholders = vec!["?"; values.len()].join(", ");
            params.extend(values.iter().map(|(_, value)| value.clone()));
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quote(table),
                columns.join(", "),
                placeholders
            )
        }
        Statement::Update {
            table,
            assignments,
            filter,
        } => {
            let sets: Vec<String> = assignments
                .iter()
                .map(|assignment| match assignment {
                    Assignment::Set(column, value) => {
                        params.push(value.clone());
                        format!("{} = ?", quote(column))
                    }
                    Assignment::Increment(column, delta) => {
                        params.push(Value::Integer(*delta));
                        format!("{0} = {0} + ?", quote(column))
                    }
                })
                .collect();
            let mut sql = format!("UPDATE {} SET {}", quote(table), sets.join(", "));
            render_filter(filter, &mut sql, &mut params);
            sql
        }
        Statement::Delete { table, filter } => {
            let mut sql = format!("DELETE FROM {}", quote(table));
            render_filter(filter, &mut sql, &mut params);
            sql
        }
    };
    (sql, params)
}

pub(crate) fn render_query(query: &Query) -> (String, Vec<Value>) {
    let mut params = Vec::new();
    let columns: Vec<String> = query.columns.iter().map(|column| quote(column)).collect();
    let mut sql = format!("SELECT {} FROM {}", columns.join(", "), quote(&query.table));
    render_filter(&query.filter, &mut sql, &mut params);
    sql.push_str(" LIMIT 1");
    (sql, params)
}

fn bind_all(mut query: MySqlQuery<'_>, params: Vec<Value>) -> MySqlQuery<'_> {
    for value in params {
        query = match value {
            Value::Null => query.bind(None::<i64>),
            Value::Integer(i) => query.bind(i),
            Value::Text(s) => query.bind(s),
            Value::Boolean(b) => query.bind(b),
            Value::Timestamp(ts) => query.bind(ts),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut values = Row::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        if row.try_get_raw(idx)?.is_null() {
            values.push(Value::Null);
            continue;
        }
        let type_name = column.type_info().name();
        let value = match type_name {
            "BOOLEAN" => Value::Boolean(row.try_get::<bool, _>(idx)?),
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
                Value::Integer(row.try_get::<i64, _>(idx)?)
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => {
                let raw = row.try_get::<u64, _>(idx)?;
                Value::Integer(i64::try_from(raw).map_err(|_| {
                    DbError::TypeMismatch(format!("{} does not fit in a signed integer", raw))
                })?)
            }
            "CHAR" | "VARCHAR" | "TEXT" | "TINYTEXT" | "MEDIUMTEXT" | "LONGTEXT" => {
                Value::Text(row.try_get::<String, _>(idx)?)
            }
            "DATETIME" | "TIMESTAMP" => {
                Value::Timestamp(row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?)
            }
            other => {
                return Err(DbError::TypeMismatch(format!(
                    "column '{}' has unsupported type {}",
                    column.name(),
                    other
                )));
            }
        };
        values.push(value);
    }
    Ok(values)
}
