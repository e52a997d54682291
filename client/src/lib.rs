//! Tsubame client: transaction retry orchestration for a distributed
//! transactional database.
//!
//! The server may reject an attempt for write-conflict or serialization
//! reasons; this crate runs a caller-supplied unit of work repeatedly,
//! selecting a transaction option per attempt (OCC, LTX, or RTX), classifying
//! failures into retryable / retryable-with-escalation / terminal, and
//! producing a final committed, rolled-back, or failed outcome. Every remote
//! wait is bounded by a connect timeout and abandoned within a close timeout
//! through [`tsubame_gate`].
//!
//! Typical use:
//!
//! ```ignore
//! let session = Session::new(transport);
//! let strategy = Arc::new(EscalatingStrategy::new(
//!     TransactionOption::occ().with_label("orders"),
//!     3,
//!     TransactionOption::ltx(["orders"]).with_label("orders-ltx"),
//!     2,
//! )?);
//! let executor = session.executor(strategy);
//! let total = executor
//!     .execute(|tx| Box::pin(async move {
//!         // statements against `tx` ...
//!         Ok(UnitVerdict::Commit(42))
//!     }))
//!     .await?;
//! ```

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod counter;
pub mod diagnostic;
pub mod engine;
pub mod error;
pub mod event;
pub mod option;
pub mod retry;
pub mod session;
pub mod timeout;
pub mod transaction;
pub mod transport;

pub use counter::{LabelCounter, SimpleCounter, TxCount};
pub use diagnostic::{DiagnosticCode, ServerDiagnostic};
pub use engine::{TransactionExecutor, UnitVerdict};
pub use error::{ClientError, Result};
pub use event::{ExecuteEventListener, TracingEventListener};
pub use option::{TransactionOption, TransactionPriority, WireTransactionOption};
pub use retry::{
    DefaultClassifier, EscalatingStrategy, FixedStrategy, NextOption, OptionStrategy,
    RetryClassifier, RetryCode, RetryInstruction, TieredStrategy,
};
pub use session::Session;
pub use timeout::{CachedTimeout, TimeoutConfig, TimeoutKey};
pub use transaction::{Transaction, TransactionState, TransactionTimeouts};
pub use transport::{BoxPending, TransactionHandle, TransactionOutcome, Transport};
