//! Failure classification.
//!
//! The classifier maps a failure to a retry verdict. It is table-driven so
//! new diagnostic codes can be mapped without touching the engine, and it is
//! injected into the engine at construction: retryability of a given code can
//! be application-specific, so callers may supply their own mapping.

use std::collections::HashMap;

use crate::diagnostic::DiagnosticCode;
use crate::error::ClientError;
use crate::option::TransactionOption;
use crate::retry::{RetryCode, RetryInstruction};

/// Maps a failure (and the option in force when it happened) to a verdict.
pub trait RetryClassifier: Send + Sync {
    fn classify(&self, failure: &ClientError, option: &TransactionOption) -> RetryInstruction;
}

/// Table-driven default classification.
///
/// Serialization conflicts retry under the same tier; conflicts that only
/// write-preservation can resolve escalate to LTX — unless the failing
/// attempt already ran as LTX, in which case escalation is meaningless and
/// the conflict is retried in place. Everything else, including local
/// timeouts and arbitrary unit-of-work failures, is not retryable.
#[derive(Debug, Clone)]
pub struct DefaultClassifier {
    table: HashMap<DiagnosticCode, RetryCode>,
}

impl Default for DefaultClassifier {
    fn default() -> Self {
        let mut table = HashMap::new();
        table.insert(DiagnosticCode::SerializationFailure, RetryCode::Retryable);
        table.insert(DiagnosticCode::InactiveTransaction, RetryCode::Retryable);
        table.insert(
            DiagnosticCode::ConflictOnWritePreserve,
            RetryCode::RetryableLtx,
        );
        Self { table }
    }
}

impl DefaultClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override or add the verdict for one diagnostic code.
    #[must_use]
    pub fn with_rule(mut self, code: DiagnosticCode, verdict: RetryCode) -> Self {
        self.table.insert(code, verdict);
        self
    }
}

impl RetryClassifier for DefaultClassifier {
    fn classify(&self, failure: &ClientError, option: &TransactionOption) -> RetryInstruction {
        let Some(code) = failure.diagnostic_code() else {
            return RetryInstruction::not_retryable(format!("non-domain failure: {failure}"));
        };
        match self.table.get(&code) {
            Some(RetryCode::Retryable) => {
                RetryInstruction::retryable(format!("{code:?} is retryable"))
            }
            Some(RetryCode::RetryableLtx) if option.is_ltx() => {
                // Already in the LTX tier; retry in place.
                RetryInstruction::retryable(format!("{code:?} under LTX is retryable"))
            }
            Some(RetryCode::RetryableLtx) => {
                RetryInstruction::retryable_ltx(format!("{code:?} requires write preservation"))
            }
            Some(RetryCode::NotRetryable | RetryCode::RetryOver) | None => {
                RetryInstruction::not_retryable(format!("{code:?} is not retryable"))
            }
        }
    }
}
