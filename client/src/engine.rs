//! Execution engine.
//!
//! Runs a caller-supplied unit of work against server transactions, retrying
//! conflict-aborted attempts under the configured option strategy. Attempts
//! are strictly sequential within one `execute` call: attempt k+1 never
//! begins before attempt k's transaction is closed. The engine imposes no
//! attempt cap of its own; only the strategy decides when to stop.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::error::{ClientError, Result};
use crate::event::ExecuteEventListener;
use crate::option::TransactionOption;
use crate::retry::{NextOption, OptionStrategy, RetryClassifier, classifier::DefaultClassifier};
use crate::timeout::TimeoutConfig;
use crate::transaction::Transaction;
use crate::transport::Transport;

/// What the unit of work decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitVerdict<T> {
    /// Commit and return this value.
    Commit(T),
    /// Roll back intentionally; `execute` returns no value, not an error.
    Rollback,
}

/// Caller-supplied unit of work: runs against a live transaction and decides
/// commit or rollback, or fails.
pub type UnitOfWork<'a, T> = BoxFuture<'a, Result<UnitVerdict<T>>>;

/// The retry orchestration engine.
///
/// Cheap to construct; strategies, classifiers and listeners are shared.
/// Distinct `execute` calls on one executor run concurrently and
/// independently — all per-call progress lives in the `ExecutionInfo` the
/// strategy creates for that call.
pub struct TransactionExecutor {
    transport: Arc<dyn Transport>,
    strategy: Arc<dyn OptionStrategy>,
    classifier: Arc<dyn RetryClassifier>,
    listeners: Vec<Arc<dyn ExecuteEventListener>>,
    timeouts: Arc<TimeoutConfig>,
    cancel: Option<CancellationToken>,
}

impl TransactionExecutor {
    pub fn new(transport: Arc<dyn Transport>, strategy: Arc<dyn OptionStrategy>) -> Self {
        Self {
            transport,
            strategy,
            classifier: Arc::new(DefaultClassifier::new()),
            listeners: Vec::new(),
            timeouts: Arc::new(TimeoutConfig::default()),
            cancel: None,
        }
    }

    /// Replace the failure classifier.
    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: Arc<TimeoutConfig>) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Stop issuing new attempts once `cancel` is cancelled. An attempt
    /// already in flight is not preempted; its own per-operation timeouts
    /// still apply.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn add_listener(mut self, listener: Arc<dyn ExecuteEventListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Run `unit_of_work`, retrying per the configured strategy.
    ///
    /// Returns `Ok(Some(value))` on commit, `Ok(None)` on intentional
    /// rollback, and otherwise the single terminal failure: the first
    /// `NotRetryable` error, or `RetriesExhausted` once the strategy returns
    /// retry-over.
    pub async fn execute<T, F>(&self, mut unit_of_work: F) -> Result<Option<T>>
    where
        T: Send,
        F: for<'a> FnMut(&'a mut Transaction) -> UnitOfWork<'a, T> + Send,
    {
        let mut info = self.strategy.execution_info();
        for listener in &self.listeners {
            listener.execute_start();
        }
        let mut option = self.strategy.first_option(&mut info);
        loop {
            if let Some(cancel) = &self.cancel
                && cancel.is_cancelled()
            {
                let err = ClientError::Cancelled;
                for listener in &self.listeners {
                    listener.execute_end_fail(&option, &err);
                }
                tracing::debug!(
                    attempts = info.attempt(),
                    "execution cancelled before next attempt"
                );
                return Err(err);
            }
            info.record_attempt();
            let attempt = info.attempt();
            for listener in &self.listeners {
                listener.transaction_before(attempt, &option);
            }
            tracing::debug!(
                attempt,
                option = option.type_name(),
                label = option.label(),
                "attempt starting"
            );

            let failure = match self.run_attempt(attempt, &option, &mut unit_of_work).await {
                Ok(AttemptOutcome::Committed(value)) => {
                    for listener in &self.listeners {
                        listener.execute_end_success(&option, true);
                    }
                    tracing::debug!(attempt, "execute finished, committed");
                    return Ok(Some(value));
                }
                Ok(AttemptOutcome::RolledBack) => {
                    for listener in &self.listeners {
                        listener.execute_end_success(&option, false);
                    }
                    tracing::debug!(attempt, "execute finished, intentionally rolled back");
                    return Ok(None);
                }
                Err(failure) => failure,
            };

            for listener in &self.listeners {
                listener.transaction_exception(&option, &failure);
            }
            let instruction = self.classifier.classify(&failure, &option);
            info.record_instruction(instruction.clone());
            if !instruction.is_retryable() {
                for listener in &self.listeners {
                    listener.execute_end_fail(&option, &failure);
                }
                tracing::warn!(attempt, %failure, "execute failed, not retryable");
                return Err(failure);
            }
            match self
                .strategy
                .retry_option(&mut info, attempt, &option, &instruction)
            {
                NextOption::Next(next) => {
                    for listener in &self.listeners {
                        listener.transaction_retry(&option, &instruction);
                    }
                    tracing::debug!(attempt, reason = instruction.reason(), "retrying");
                    option = next;
                }
                NextOption::RetryOver => {
                    for listener in &self.listeners {
                        listener.transaction_retry_over(&option, &instruction);
                    }
                    let err = ClientError::RetriesExhausted {
                        attempts: attempt,
                        last_option_label: option.label().map(str::to_owned),
                        source: Box::new(failure),
                    };
                    for listener in &self.listeners {
                        listener.execute_end_fail(&option, &err);
                    }
                    tracing::warn!(attempts = attempt, "execute failed, retries exhausted");
                    return Err(err);
                }
            }
        }
    }

    /// One begin → work → commit/rollback cycle. Whatever happens, the
    /// attempt's transaction is closed before this returns.
    async fn run_attempt<T, F>(
        &self,
        attempt: u32,
        option: &TransactionOption,
        unit_of_work: &mut F,
    ) -> std::result::Result<AttemptOutcome<T>, ClientError>
    where
        T: Send,
        F: for<'a> FnMut(&'a mut Transaction) -> UnitOfWork<'a, T> + Send,
    {
        let mut tx = Transaction::begin(
            Arc::clone(&self.transport),
            option.clone(),
            attempt,
            self.listeners.clone(),
            &self.timeouts,
        )
        .await?;
        for listener in &self.listeners {
            listener.transaction_created(attempt, option);
        }
        match unit_of_work(&mut tx).await {
            Ok(UnitVerdict::Commit(value)) => match tx.commit().await {
                Ok(()) => Ok(AttemptOutcome::Committed(value)),
                Err(err) => Err(close_attaching(&mut tx, err).await),
            },
            Ok(UnitVerdict::Rollback) => match tx.rollback().await {
                Ok(()) => Ok(AttemptOutcome::RolledBack),
                Err(err) => Err(close_attaching(&mut tx, err).await),
            },
            Err(err) => Err(close_attaching(&mut tx, err).await),
        }
    }
}

enum AttemptOutcome<T> {
    Committed(T),
    RolledBack,
}

/// Best-effort close; a close failure is attached to the primary as a
/// suppressed cause, never replacing it.
async fn close_attaching(tx: &mut Transaction, primary: ClientError) -> ClientError {
    match tx.close().await {
        Ok(()) => primary,
        Err(secondary) => primary.attach(secondary),
    }
}
