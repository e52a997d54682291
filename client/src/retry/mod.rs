//! Retry verdicts, classification, and option strategies.
//!
//! A failed attempt is classified into a [`RetryInstruction`]; the configured
//! [`strategy::OptionStrategy`] consumes the instruction to pick the next
//! transaction option or to stop.

pub mod classifier;
pub mod strategy;

pub use classifier::{DefaultClassifier, RetryClassifier};
pub use strategy::{
    EscalatingStrategy, ExecutionInfo, FixedStrategy, NextOption, OptionStrategy, TieredStrategy,
};

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryCode {
    /// Retry with the same strategy tier.
    Retryable,
    /// Retry, but the strategy must escalate to its LTX tier.
    RetryableLtx,
    /// Abort: the failure cannot be resolved by retrying.
    NotRetryable,
    /// Terminal: the strategy has no attempts left.
    RetryOver,
}

/// The classifier's verdict on one failed attempt.
///
/// Compared by code; the reason is free text for diagnostics only.
#[derive(Debug, Clone)]
pub struct RetryInstruction {
    code: RetryCode,
    reason: String,
}

impl PartialEq for RetryInstruction {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code
    }
}

impl Eq for RetryInstruction {}

impl RetryInstruction {
    pub fn new(code: RetryCode, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    pub fn retryable(reason: impl Into<String>) -> Self {
        Self::new(RetryCode::Retryable, reason)
    }

    pub fn retryable_ltx(reason: impl Into<String>) -> Self {
        Self::new(RetryCode::RetryableLtx, reason)
    }

    pub fn not_retryable(reason: impl Into<String>) -> Self {
        Self::new(RetryCode::NotRetryable, reason)
    }

    pub fn code(&self) -> RetryCode {
        self.code
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.code, RetryCode::Retryable | RetryCode::RetryableLtx)
    }
}
