//! Transaction storage collaborator

use crate::{Result, Transaction};

/// Receives transactions emitted by the state machine
pub trait TransactionSink: Send + Sync {
    fn persist(&self, transaction: &Transaction) -> Result<()>;
}
