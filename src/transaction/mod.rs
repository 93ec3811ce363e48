// ============================================================================
// Transaction Management Module
// ============================================================================
//
// Serializable transactions for the in-memory engine:
// - State: Active -> Committed / Aborted
// - Undo log: every change records its inverse for rollback
//
// ============================================================================

pub mod change;
pub mod state;

pub use change::Change;
pub use state::{TransactionId, TransactionState};
