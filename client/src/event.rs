//! Execution event hooks.
//!
//! Observers notified at each phase transition of the retry loop. Hooks are
//! side-effect-only: the engine never consults them for control flow. Every
//! method has a no-op default, so listeners implement only what they need.
//! The invocation order is fixed: before-commit fires before commit
//! completion, exception fires before retry-or-fail is decided.

use crate::error::ClientError;
use crate::option::TransactionOption;
use crate::retry::RetryInstruction;

/// Observer of one engine's phase transitions.
///
/// A listener instance may be shared by many concurrently running `execute`
/// calls, so implementations must be safe for concurrent invocation.
pub trait ExecuteEventListener: Send + Sync {
    /// An `execute` call started.
    fn execute_start(&self) {}

    /// An attempt is about to begin under `option`.
    fn transaction_before(&self, attempt: u32, option: &TransactionOption) {
        let _ = (attempt, option);
    }

    /// The server accepted begin; the attempt's transaction is live.
    fn transaction_created(&self, attempt: u32, option: &TransactionOption) {
        let _ = (attempt, option);
    }

    /// The attempt failed (begin, unit of work, or commit).
    fn transaction_exception(&self, option: &TransactionOption, error: &ClientError) {
        let _ = (option, error);
    }

    /// The failure was classified retryable and another attempt follows.
    fn transaction_retry(&self, option: &TransactionOption, instruction: &RetryInstruction) {
        let _ = (option, instruction);
    }

    /// The strategy declared retries exhausted.
    fn transaction_retry_over(&self, option: &TransactionOption, instruction: &RetryInstruction) {
        let _ = (option, instruction);
    }

    /// Commit was requested; fires before the commit request is sent.
    fn before_commit(&self, option: &TransactionOption) {
        let _ = option;
    }

    /// Commit completed on the server.
    fn commit(&self, option: &TransactionOption) {
        let _ = option;
    }

    /// Rollback completed on the server.
    fn rollback(&self, option: &TransactionOption) {
        let _ = option;
    }

    /// The `execute` call finished successfully; `committed` is false for an
    /// intentional rollback.
    fn execute_end_success(&self, option: &TransactionOption, committed: bool) {
        let _ = (option, committed);
    }

    /// The `execute` call failed terminally.
    fn execute_end_fail(&self, option: &TransactionOption, error: &ClientError) {
        let _ = (option, error);
    }
}

/// Logs every phase transition through `tracing`.
#[derive(Debug, Default)]
pub struct TracingEventListener;

impl ExecuteEventListener for TracingEventListener {
    fn execute_start(&self) {
        tracing::debug!("execute started");
    }

    fn transaction_before(&self, attempt: u32, option: &TransactionOption) {
        tracing::debug!(
            attempt,
            option = option.type_name(),
            label = option.label(),
            "attempt starting"
        );
    }

    fn transaction_created(&self, attempt: u32, option: &TransactionOption) {
        tracing::debug!(attempt, option = option.type_name(), "transaction begun");
    }

    fn transaction_exception(&self, option: &TransactionOption, error: &ClientError) {
        tracing::debug!(option = option.type_name(), %error, "attempt failed");
    }

    fn transaction_retry(&self, option: &TransactionOption, instruction: &RetryInstruction) {
        tracing::debug!(
            option = option.type_name(),
            reason = instruction.reason(),
            "retrying"
        );
    }

    fn transaction_retry_over(&self, option: &TransactionOption, instruction: &RetryInstruction) {
        tracing::warn!(
            option = option.type_name(),
            reason = instruction.reason(),
            "retries exhausted"
        );
    }

    fn before_commit(&self, option: &TransactionOption) {
        tracing::debug!(option = option.type_name(), "committing");
    }

    fn commit(&self, option: &TransactionOption) {
        tracing::debug!(option = option.type_name(), "committed");
    }

    fn rollback(&self, option: &TransactionOption) {
        tracing::debug!(option = option.type_name(), "rolled back");
    }

    fn execute_end_success(&self, option: &TransactionOption, committed: bool) {
        tracing::debug!(option = option.type_name(), committed, "execute finished");
    }

    fn execute_end_fail(&self, option: &TransactionOption, error: &ClientError) {
        tracing::warn!(option = option.type_name(), %error, "execute failed");
    }
}
