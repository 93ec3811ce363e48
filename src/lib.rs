// ============================================================================
// occdb
// ============================================================================
//
// Optimistic concurrency control over a small relational model: employees
// and the timers they own. Writes are gated on a per-row version counter;
// a concurrency harness shows that contention produces rejected writes but
// never lost ones.
//
// ============================================================================

pub mod connection;
pub mod core;
pub mod demo;
pub mod harness;
pub mod id;
pub mod model;
pub mod report;
pub mod statement;
pub mod storage;
pub mod store;
pub mod transaction;

pub use connection::config::{Backend, DatabaseConfig};
pub use connection::memory::MemoryDatastore;
pub use connection::{Datastore, Executor, Querier, Transaction, Transactional, connect};
pub use crate::core::{DbError, Result, Value};
pub use harness::{ActorConfig, Clock, Harness, HarnessConfig, HarnessError, HarnessReport, TokioClock};
pub use id::generate_id;
pub use model::{Employee, TableNames, Timer};
pub use store::{BuildInfo, EntityStore, StoreConfig, StoreError, StoreResult};
