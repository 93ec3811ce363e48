pub mod config;
pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;

use crate::core::{DbError, Result, Row};
use crate::model::TableNames;
use crate::statement::{Query, Statement};
use async_trait::async_trait;
use config::{Backend, DatabaseConfig};
use memory::MemoryDatastore;
use std::sync::Arc;

/// Runs a statement outside any explicit transaction and reports rows affected.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(&self, statement: &Statement) -> Result<u64>;
}

/// Runs a query and returns at most one row.
#[async_trait]
pub trait Querier: Send + Sync {
    async fn query_row(&self, query: &Query) -> Result<Option<Row>>;
}

/// Opens transactions.
#[async_trait]
pub trait Transactional: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// A unit of work. Dropping it without `commit` rolls it back.
#[async_trait]
pub trait Transaction: Send {
    async fn execute(&mut self, statement: &Statement) -> Result<u64>;

    async fn query_row(&mut self, query: &Query) -> Result<Option<Row>>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}

/// Everything a connection can do. Blanket-implemented.
pub trait Datastore: Executor + Querier + Transactional {}

impl<T: Executor + Querier + Transactional> Datastore for T {}

/// Builds the datastore the configuration asks for.
///
/// The memory backend is created with the store's schema; the MySQL backend
/// expects that schema to exist already.
pub async fn connect(config: &DatabaseConfig, tables: &TableNames) -> Result<Arc<dyn Datastore>> {
    config.validate().map_err(DbError::ConnectionError)?;

    match config.backend {
        Backend::Memory => {
            let datastore = MemoryDatastore::with_tables(crate::model::schema::tables(tables))?;
            tracing::debug!(database = %config.database, "opened in-memory datastore");
            Ok(Arc::new(datastore))
        }
        #[cfg(feature = "mysql")]
        Backend::MySql => {
            let datastore = mysql::MySqlDatastore::connect(config).await?;
            tracing::debug!(url = %config.to_url(), "connected to mysql");
            Ok(Arc::new(datastore))
        }
        #[cfg(not(feature = "mysql"))]
        Backend::MySql => Err(DbError::ConnectionError(
            "the mysql backend requires building with `--features mysql`".to_string(),
        )),
    }
}
