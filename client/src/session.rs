//! Session bootstrap.
//!
//! Thin wrapper tying a connected transport to shared configuration.
//! Connection establishment itself happens behind the [`Transport`]
//! implementation; the session only hands out executors and raw
//! transactions.

use std::sync::Arc;

use crate::engine::TransactionExecutor;
use crate::error::Result;
use crate::event::ExecuteEventListener;
use crate::option::TransactionOption;
use crate::retry::{OptionStrategy, RetryClassifier, classifier::DefaultClassifier};
use crate::timeout::TimeoutConfig;
use crate::transaction::Transaction;
use crate::transport::Transport;

pub struct Session {
    transport: Arc<dyn Transport>,
    timeouts: Arc<TimeoutConfig>,
    classifier: Arc<dyn RetryClassifier>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeouts: Arc::new(TimeoutConfig::default()),
            classifier: Arc::new(DefaultClassifier::new()),
        }
    }

    #[must_use]
    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = Arc::new(timeouts);
        self
    }

    #[must_use]
    pub fn with_classifier(mut self, classifier: Arc<dyn RetryClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn timeouts(&self) -> &Arc<TimeoutConfig> {
        &self.timeouts
    }

    /// An executor running under `strategy`, inheriting this session's
    /// timeout configuration and classifier.
    pub fn executor(&self, strategy: Arc<dyn OptionStrategy>) -> TransactionExecutor {
        TransactionExecutor::new(Arc::clone(&self.transport), strategy)
            .with_classifier(Arc::clone(&self.classifier))
            .with_timeouts(Arc::clone(&self.timeouts))
    }

    /// A single raw transaction outside any retry loop.
    pub async fn transaction(
        &self,
        option: TransactionOption,
        listeners: Vec<Arc<dyn ExecuteEventListener>>,
    ) -> Result<Transaction> {
        Transaction::begin(
            Arc::clone(&self.transport),
            option,
            1,
            listeners,
            &self.timeouts,
        )
        .await
    }
}
