//! Outcome counters.
//!
//! Monotonic tallies of the engine's phase transitions, updated through the
//! event hooks. [`SimpleCounter`] keeps one running total; [`LabelCounter`]
//! keeps a breakdown keyed by the transaction option's label. Both are safe
//! for concurrent increment from simultaneously running `execute` calls
//! sharing one instance. Snapshots merge field-wise; the merge is
//! associative and commutative.

use std::collections::HashMap;
use std::ops::{Add, AddAssign};
use std::sync::Arc;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ClientError;
use crate::event::ExecuteEventListener;
use crate::option::TransactionOption;
use crate::retry::RetryInstruction;

/// Point-in-time snapshot of one tally set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxCount {
    pub execute_count: u64,
    pub transaction_count: u64,
    pub exception_count: u64,
    pub retry_count: u64,
    pub retry_over_count: u64,
    pub before_commit_count: u64,
    pub commit_count: u64,
    pub rollback_count: u64,
    pub success_commit_count: u64,
    pub success_rollback_count: u64,
    pub fail_count: u64,
}

impl TxCount {
    /// Successful `execute` calls, committed or intentionally rolled back.
    pub fn success_count(&self) -> u64 {
        self.success_commit_count + self.success_rollback_count
    }

    /// Attempts aborted retryably, whether retried or exhausted.
    pub fn retryable_abort_count(&self) -> u64 {
        self.retry_count + self.retry_over_count
    }
}

impl Add for TxCount {
    type Output = TxCount;

    fn add(self, rhs: TxCount) -> TxCount {
        TxCount {
            execute_count: self.execute_count + rhs.execute_count,
            transaction_count: self.transaction_count + rhs.transaction_count,
            exception_count: self.exception_count + rhs.exception_count,
            retry_count: self.retry_count + rhs.retry_count,
            retry_over_count: self.retry_over_count + rhs.retry_over_count,
            before_commit_count: self.before_commit_count + rhs.before_commit_count,
            commit_count: self.commit_count + rhs.commit_count,
            rollback_count: self.rollback_count + rhs.rollback_count,
            success_commit_count: self.success_commit_count + rhs.success_commit_count,
            success_rollback_count: self.success_rollback_count + rhs.success_rollback_count,
            fail_count: self.fail_count + rhs.fail_count,
        }
    }
}

impl AddAssign for TxCount {
    fn add_assign(&mut self, rhs: TxCount) {
        *self = *self + rhs;
    }
}

/// One thread-safe tally set.
#[derive(Debug, Default)]
struct AtomicTxCount {
    execute: AtomicU64,
    transaction: AtomicU64,
    exception: AtomicU64,
    retry: AtomicU64,
    retry_over: AtomicU64,
    before_commit: AtomicU64,
    commit: AtomicU64,
    rollback: AtomicU64,
    success_commit: AtomicU64,
    success_rollback: AtomicU64,
    fail: AtomicU64,
}

impl AtomicTxCount {
    fn snapshot(&self) -> TxCount {
        TxCount {
            execute_count: self.execute.load(Ordering::SeqCst),
            transaction_count: self.transaction.load(Ordering::SeqCst),
            exception_count: self.exception.load(Ordering::SeqCst),
            retry_count: self.retry.load(Ordering::SeqCst),
            retry_over_count: self.retry_over.load(Ordering::SeqCst),
            before_commit_count: self.before_commit.load(Ordering::SeqCst),
            commit_count: self.commit.load(Ordering::SeqCst),
            rollback_count: self.rollback.load(Ordering::SeqCst),
            success_commit_count: self.success_commit.load(Ordering::SeqCst),
            success_rollback_count: self.success_rollback.load(Ordering::SeqCst),
            fail_count: self.fail.load(Ordering::SeqCst),
        }
    }

    fn reset(&self) {
        self.execute.store(0, Ordering::SeqCst);
        self.transaction.store(0, Ordering::SeqCst);
        self.exception.store(0, Ordering::SeqCst);
        self.retry.store(0, Ordering::SeqCst);
        self.retry_over.store(0, Ordering::SeqCst);
        self.before_commit.store(0, Ordering::SeqCst);
        self.commit.store(0, Ordering::SeqCst);
        self.rollback.store(0, Ordering::SeqCst);
        self.success_commit.store(0, Ordering::SeqCst);
        self.success_rollback.store(0, Ordering::SeqCst);
        self.fail.store(0, Ordering::SeqCst);
    }
}

/// A single running total across all labels.
#[derive(Debug, Default)]
pub struct SimpleCounter {
    count: AtomicTxCount,
}

impl SimpleCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> TxCount {
        self.count.snapshot()
    }

    pub fn reset(&self) {
        self.count.reset();
    }
}

impl ExecuteEventListener for SimpleCounter {
    fn execute_start(&self) {
        self.count.execute.fetch_add(1, Ordering::SeqCst);
    }

    fn transaction_before(&self, _attempt: u32, _option: &TransactionOption) {
        self.count.transaction.fetch_add(1, Ordering::SeqCst);
    }

    fn transaction_exception(&self, _option: &TransactionOption, _error: &ClientError) {
        self.count.exception.fetch_add(1, Ordering::SeqCst);
    }

    fn transaction_retry(&self, _option: &TransactionOption, _instruction: &RetryInstruction) {
        self.count.retry.fetch_add(1, Ordering::SeqCst);
    }

    fn transaction_retry_over(
        &self,
        _option: &TransactionOption,
        _instruction: &RetryInstruction,
    ) {
        self.count.retry_over.fetch_add(1, Ordering::SeqCst);
    }

    fn before_commit(&self, _option: &TransactionOption) {
        self.count.before_commit.fetch_add(1, Ordering::SeqCst);
    }

    fn commit(&self, _option: &TransactionOption) {
        self.count.commit.fetch_add(1, Ordering::SeqCst);
    }

    fn rollback(&self, _option: &TransactionOption) {
        self.count.rollback.fetch_add(1, Ordering::SeqCst);
    }

    fn execute_end_success(&self, _option: &TransactionOption, committed: bool) {
        if committed {
            self.count.success_commit.fetch_add(1, Ordering::SeqCst);
        } else {
            self.count.success_rollback.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn execute_end_fail(&self, _option: &TransactionOption, _error: &ClientError) {
        self.count.fail.fetch_add(1, Ordering::SeqCst);
    }
}

/// Per-label breakdown keyed by the option's label.
///
/// Unlabeled options tally under the empty label. The execute tally has no
/// option yet at execute-start, so it is attributed to the first attempt's
/// label when attempt 1 begins.
#[derive(Debug, Default)]
pub struct LabelCounter {
    counts: RwLock<HashMap<String, Arc<AtomicTxCount>>>,
}

impl LabelCounter {
    pub fn new() -> Self {
        Self::default()
    }

    fn tally(&self, option: &TransactionOption, bump: impl FnOnce(&AtomicTxCount)) {
        let label = option.label().unwrap_or("");
        if let Ok(counts) = self.counts.read()
            && let Some(count) = counts.get(label)
        {
            bump(count);
            return;
        }
        if let Ok(mut counts) = self.counts.write() {
            let count = counts
                .entry(label.to_owned())
                .or_insert_with(|| Arc::new(AtomicTxCount::default()))
                .clone();
            bump(&count);
        }
    }

    /// Snapshot for one label, if it has been seen.
    pub fn count(&self, label: &str) -> Option<TxCount> {
        self.counts
            .read()
            .ok()
            .and_then(|counts| counts.get(label).map(|c| c.snapshot()))
    }

    /// All labels seen so far.
    pub fn labels(&self) -> Vec<String> {
        self.counts
            .read()
            .map(|counts| counts.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Field-wise sum over every label.
    pub fn sum(&self) -> TxCount {
        self.sum_by(|_| true)
    }

    /// Field-wise sum over labels starting with `prefix`.
    pub fn sum_by_prefix(&self, prefix: &str) -> TxCount {
        self.sum_by(|label| label.starts_with(prefix))
    }

    fn sum_by(&self, mut include: impl FnMut(&str) -> bool) -> TxCount {
        self.counts
            .read()
            .map(|counts| {
                counts
                    .iter()
                    .filter(|(label, _)| include(label))
                    .map(|(_, count)| count.snapshot())
                    .fold(TxCount::default(), Add::add)
            })
            .unwrap_or_default()
    }

    /// Drop every label and its tallies.
    pub fn clear(&self) {
        if let Ok(mut counts) = self.counts.write() {
            counts.clear();
        }
    }
}

impl ExecuteEventListener for LabelCounter {
    fn transaction_before(&self, attempt: u32, option: &TransactionOption) {
        self.tally(option, |count| {
            if attempt == 1 {
                count.execute.fetch_add(1, Ordering::SeqCst);
            }
            count.transaction.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn transaction_exception(&self, option: &TransactionOption, _error: &ClientError) {
        self.tally(option, |count| {
            count.exception.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn transaction_retry(&self, option: &TransactionOption, _instruction: &RetryInstruction) {
        self.tally(option, |count| {
            count.retry.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn transaction_retry_over(
        &self,
        option: &TransactionOption,
        _instruction: &RetryInstruction,
    ) {
        self.tally(option, |count| {
            count.retry_over.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn before_commit(&self, option: &TransactionOption) {
        self.tally(option, |count| {
            count.before_commit.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn commit(&self, option: &TransactionOption) {
        self.tally(option, |count| {
            count.commit.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn rollback(&self, option: &TransactionOption) {
        self.tally(option, |count| {
            count.rollback.fetch_add(1, Ordering::SeqCst);
        });
    }

    fn execute_end_success(&self, option: &TransactionOption, committed: bool) {
        self.tally(option, |count| {
            if committed {
                count.success_commit.fetch_add(1, Ordering::SeqCst);
            } else {
                count.success_rollback.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    fn execute_end_fail(&self, option: &TransactionOption, error: &ClientError) {
        let _ = error;
        self.tally(option, |count| {
            count.fail.fetch_add(1, Ordering::SeqCst);
        });
    }
}
