use super::{Executor, Querier, Transaction, Transactional};
use crate::core::{DbError, Result, Row};
use crate::statement::{Query, Statement};
use crate::storage::{InMemoryStorage, TableSchema};
use crate::transaction::{Change, TransactionId, TransactionState};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// In-process transactional datastore.
///
/// A transaction owns the storage lock from `begin` until commit or rollback,
/// so transactions are serializable and conflicting writes never interleave.
/// Autocommit statements queue behind any open transaction.
#[derive(Clone, Default)]
pub struct MemoryDatastore {
    storage: Arc<Mutex<InMemoryStorage>>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the tables in order; parents must precede children.
    pub fn with_tables(schemas: impl IntoIterator<Item = TableSchema>) -> Result<Self> {
        let mut storage = InMemoryStorage::new();
        for schema in schemas {
            storage.create_table(schema)?;
        }
        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
        })
    }

    pub async fn create_table(&self, schema: TableSchema) -> Result<()> {
        self.storage.lock().await.create_table(schema)
    }

    pub async fn row_count(&self, table: &str) -> Result<usize> {
        Ok(self.storage.lock().await.get_table(table)?.row_count())
    }
}

#[async_trait]
impl Executor for MemoryDatastore {
    async fn execute(&self, statement: &Statement) -> Result<u64> {
        let mut storage = self.storage.lock().await;
        let mut log = Vec::new();
        storage.execute(statement, &mut log)
    }
}

#[async_trait]
impl Querier for MemoryDatastore {
    async fn query_row(&self, query: &Query) -> Result<Option<Row>> {
        self.storage.lock().await.query_row(query)
    }
}

#[async_trait]
impl Transactional for MemoryDatastore {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let guard = Arc::clone(&self.storage).lock_owned().await;
        let id = TransactionId::new();
        debug!(txn = %id, "begin");
        Ok(Box::new(MemoryTransaction {
            id,
            state: TransactionState::Active,
            storage: Some(guard),
            log: Vec::new(),
        }))
    }
}

pub struct MemoryTransaction {
    id: TransactionId,
    state: TransactionState,
    storage: Option<OwnedMutexGuard<InMemoryStorage>>,
    log: Vec<Change>,
}

impl MemoryTransaction {
    fn storage(&mut self) -> Result<&mut InMemoryStorage> {
        if !self.state.is_active() {
            return Err(DbError::TransactionError(format!(
                "{} is {}",
                self.id, self.state
            )));
        }
        self.storage
            .as_deref_mut()
            .ok_or_else(|| DbError::TransactionError(format!("{} has no storage", self.id)))
    }

    fn finish(&mut self, state: TransactionState) {
        if let Some(mut storage) = self.storage.take()
            && state == TransactionState::Aborted
        {
            storage.revert(std::mem::take(&mut self.log));
        }
        self.log.clear();
        self.state = state;
    }
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn execute(&mut self, statement: &Statement) -> Result<u64> {
        let mut log = Vec::new();
        let affected = self.storage()?.execute(statement, &mut log)?;
        self.log.extend(log);
        Ok(affected)
    }

    async fn query_row(&mut self, query: &Query) -> Result<Option<Row>> {
        self.storage()?.query_row(query)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.storage()?;
        debug!(txn = %this.id, changes = this.log.len(), "commit");
        this.finish(TransactionState::Committed);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        let mut this = self;
        this.storage()?;
        debug!(txn = %this.id, changes = this.log.len(), "rollback");
        this.finish(TransactionState::Aborted);
        Ok(())
    }
}

impl Drop for MemoryTransaction {
    fn drop(&mut self) {
        if self.state.is_active() {
            debug!(txn = %self.id, "rollback on drop");
            self.finish(TransactionState::Aborted);
        }
    }
}
