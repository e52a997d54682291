//! Transport seam.
//!
//! The wire protocol is an external collaborator: the client only needs each
//! remote operation to come back as a [`Pending`] result the timeout gate can
//! consume. Implementations live next to the actual RPC stack.

use serde::{Deserialize, Serialize};
use tsubame_gate::Pending;

use crate::diagnostic::ServerDiagnostic;

/// Opaque server-assigned transaction handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle(pub u64);

/// Point-in-time outcome of a transaction as reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionOutcome {
    Committed,
    Aborted,
}

/// A pending remote result whose failure is a server diagnostic.
pub type BoxPending<T> = Box<dyn Pending<Output = T, Error = ServerDiagnostic> + Send>;

/// Remote transaction operations.
///
/// Each method issues the operation and returns immediately with a pending
/// result; waiting and abandonment go through the timeout gate.
pub trait Transport: Send + Sync {
    fn begin(&self, option: &crate::option::WireTransactionOption)
    -> BoxPending<TransactionHandle>;

    fn commit(&self, handle: TransactionHandle) -> BoxPending<()>;

    fn rollback(&self, handle: TransactionHandle) -> BoxPending<()>;

    /// Point-in-time status; `None` when the outcome is not yet determined.
    fn status(&self, handle: TransactionHandle) -> BoxPending<Option<TransactionOutcome>>;

    /// The server-assigned transaction id, fetched lazily by the lifecycle.
    fn transaction_id(&self, handle: TransactionHandle) -> BoxPending<String>;

    /// Release the server-side handle.
    fn dispose(&self, handle: TransactionHandle) -> BoxPending<()>;
}
