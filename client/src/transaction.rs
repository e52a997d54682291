//! Transaction lifecycle.
//!
//! One value per attempt: begun through the timeout gate, driven to exactly
//! one of commit, rollback, or abort-close, then unusable. The engine owns
//! the value for the whole attempt; nothing else ever touches it, so state
//! transitions never race with themselves.

use std::sync::Arc;

use tsubame_gate::{Gated, with_pending};

use crate::error::{ClientError, Result};
use crate::event::ExecuteEventListener;
use crate::option::TransactionOption;
use crate::timeout::{CachedTimeout, TimeoutConfig, TimeoutKey};
use crate::transport::{TransactionHandle, TransactionOutcome, Transport};

/// Lifecycle states.
///
/// `PendingBegin` is resolved inside [`Transaction::begin`]; a constructed
/// value is observed in `Active` or later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    PendingBegin,
    Active,
    Committing,
    RollingBack,
    Closed,
}

/// Call-site timeout handles for every remote transaction operation.
///
/// Each handle caches its resolved value; explicit overrides go through
/// [`CachedTimeout::set`].
#[derive(Debug)]
pub struct TransactionTimeouts {
    pub begin_connect: CachedTimeout,
    pub begin_close: CachedTimeout,
    pub commit_connect: CachedTimeout,
    pub commit_close: CachedTimeout,
    pub rollback_connect: CachedTimeout,
    pub rollback_close: CachedTimeout,
    pub status_connect: CachedTimeout,
    pub status_close: CachedTimeout,
    pub transaction_id_connect: CachedTimeout,
    pub transaction_id_close: CachedTimeout,
    pub dispose_connect: CachedTimeout,
    pub dispose_close: CachedTimeout,
}

impl TransactionTimeouts {
    pub fn new(config: &Arc<TimeoutConfig>) -> Self {
        let handle = |key| CachedTimeout::new(key, Arc::clone(config));
        Self {
            begin_connect: handle(TimeoutKey::BeginConnect),
            begin_close: handle(TimeoutKey::BeginClose),
            commit_connect: handle(TimeoutKey::CommitConnect),
            commit_close: handle(TimeoutKey::CommitClose),
            rollback_connect: handle(TimeoutKey::RollbackConnect),
            rollback_close: handle(TimeoutKey::RollbackClose),
            status_connect: handle(TimeoutKey::StatusConnect),
            status_close: handle(TimeoutKey::StatusClose),
            transaction_id_connect: handle(TimeoutKey::TransactionIdConnect),
            transaction_id_close: handle(TimeoutKey::TransactionIdClose),
            dispose_connect: handle(TimeoutKey::DisposeConnect),
            dispose_close: handle(TimeoutKey::DisposeClose),
        }
    }
}

/// One attempt against the server.
pub struct Transaction {
    transport: Arc<dyn Transport>,
    handle: TransactionHandle,
    option: TransactionOption,
    attempt: u32,
    state: TransactionState,
    disposed: bool,
    server_id: Option<String>,
    listeners: Vec<Arc<dyn ExecuteEventListener>>,
    timeouts: TransactionTimeouts,
}

impl std::fmt::Debug for Transaction {
    // Transport and listeners are trait objects; show the attempt identity.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("handle", &self.handle)
            .field("option", &self.option)
            .field("attempt", &self.attempt)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Transaction {
    /// Begin a transaction under `option`.
    ///
    /// The begin request is gated; on timeout the pending begin is abandoned
    /// within its close budget and no transaction value is produced.
    pub async fn begin(
        transport: Arc<dyn Transport>,
        option: TransactionOption,
        attempt: u32,
        listeners: Vec<Arc<dyn ExecuteEventListener>>,
        config: &Arc<TimeoutConfig>,
    ) -> Result<Self> {
        let timeouts = TransactionTimeouts::new(config);
        let pending = transport.begin(option.wire());
        let handle = Gated::new(pending)
            .wait_for(timeouts.begin_connect.get(), timeouts.begin_close.get())
            .await
            .map_err(|e| {
                ClientError::from_gate(e, TimeoutKey::BeginConnect, TimeoutKey::BeginClose)
            })?;
        tracing::debug!(
            attempt,
            option = option.type_name(),
            handle = handle.0,
            "transaction begun"
        );
        Ok(Self {
            transport,
            handle,
            option,
            attempt,
            state: TransactionState::Active,
            disposed: false,
            server_id: None,
            listeners,
            timeouts,
        })
    }

    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn option(&self) -> &TransactionOption {
        &self.option
    }

    /// 1-based attempt number this transaction belongs to.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn handle(&self) -> TransactionHandle {
        self.handle
    }

    pub fn timeouts_mut(&mut self) -> &mut TransactionTimeouts {
        &mut self.timeouts
    }

    /// The server-assigned transaction id, fetched on first call and cached.
    pub async fn server_id(&mut self) -> Result<String> {
        if self.state == TransactionState::Closed {
            return Err(ClientError::AlreadyClosed);
        }
        if let Some(id) = &self.server_id {
            return Ok(id.clone());
        }
        let pending = self.transport.transaction_id(self.handle);
        let id = Gated::new(pending)
            .wait_for(
                self.timeouts.transaction_id_connect.get(),
                self.timeouts.transaction_id_close.get(),
            )
            .await
            .map_err(|e| {
                ClientError::from_gate(
                    e,
                    TimeoutKey::TransactionIdConnect,
                    TimeoutKey::TransactionIdClose,
                )
            })?;
        self.server_id = Some(id.clone());
        Ok(id)
    }

    /// Point-in-time status; `None` while the outcome is undetermined.
    pub async fn status(&self) -> Result<Option<TransactionOutcome>> {
        if self.state == TransactionState::Closed {
            return Err(ClientError::AlreadyClosed);
        }
        let connect = self.timeouts.status_connect.get();
        let close = self.timeouts.status_close.get();
        let pending = self.transport.status(self.handle);
        with_pending(pending, close, |gated| {
            Box::pin(async move { gated.wait_for(connect, close).await })
        })
        .await
        .map_err(|e| ClientError::from_gate(e, TimeoutKey::StatusConnect, TimeoutKey::StatusClose))
    }

    /// Commit this transaction and close it.
    ///
    /// On failure the handle is still released; the dispose failure, if any,
    /// is attached to the commit failure as a suppressed cause.
    pub async fn commit(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(ClientError::AlreadyClosed);
        }
        for listener in &self.listeners {
            listener.before_commit(&self.option);
        }
        self.state = TransactionState::Committing;
        let pending = self.transport.commit(self.handle);
        let result = Gated::new(pending)
            .wait_for(
                self.timeouts.commit_connect.get(),
                self.timeouts.commit_close.get(),
            )
            .await;
        match result {
            Ok(()) => {
                for listener in &self.listeners {
                    listener.commit(&self.option);
                }
                if let Some(err) = self.dispose_best_effort().await {
                    tracing::warn!(%err, "handle dispose failed after commit");
                }
                self.state = TransactionState::Closed;
                tracing::debug!(attempt = self.attempt, "transaction committed");
                Ok(())
            }
            Err(gate_err) => {
                let primary = ClientError::from_gate(
                    gate_err,
                    TimeoutKey::CommitConnect,
                    TimeoutKey::CommitClose,
                );
                let cleanup = self.dispose_best_effort().await;
                self.state = TransactionState::Closed;
                match cleanup {
                    None => Err(primary),
                    Some(secondary) => Err(primary.attach(secondary)),
                }
            }
        }
    }

    /// Roll back this transaction and close it.
    ///
    /// Once the server has rolled back, the outcome stands: a failure while
    /// releasing the handle afterwards is logged, not surfaced.
    pub async fn rollback(&mut self) -> Result<()> {
        if self.state != TransactionState::Active {
            return Err(ClientError::AlreadyClosed);
        }
        self.state = TransactionState::RollingBack;
        let result = self.rollback_on_server().await;
        self.finish_rollback(result).await
    }

    /// Close this transaction, exactly once, whatever state it is in.
    ///
    /// An `Active` transaction is rolled back first; a transaction that
    /// failed mid-commit or mid-rollback has an unknown server-side outcome
    /// and is only disposed. Calling `close` on a closed transaction is a
    /// no-op.
    pub async fn close(&mut self) -> Result<()> {
        match self.state {
            TransactionState::Closed => Ok(()),
            TransactionState::Active => {
                self.state = TransactionState::RollingBack;
                let rollback = self.rollback_on_server().await;
                self.finish_rollback(rollback).await
            }
            _ => {
                let cleanup = self.dispose_best_effort().await;
                self.state = TransactionState::Closed;
                match cleanup {
                    None => Ok(()),
                    Some(err) => Err(err),
                }
            }
        }
    }

    /// Dispose and close after a rollback request, mirroring the commit
    /// path: a dispose failure after a successful rollback is warn-logged,
    /// while a failed rollback keeps the dispose failure as a suppressed
    /// cause.
    async fn finish_rollback(&mut self, rollback: Result<()>) -> Result<()> {
        let cleanup = self.dispose_best_effort().await;
        self.state = TransactionState::Closed;
        match rollback {
            Ok(()) => {
                if let Some(err) = cleanup {
                    tracing::warn!(%err, "handle dispose failed after rollback");
                }
                Ok(())
            }
            Err(primary) => match cleanup {
                None => Err(primary),
                Some(dispose_err) => Err(primary.attach(dispose_err)),
            },
        }
    }

    async fn rollback_on_server(&mut self) -> Result<()> {
        let pending = self.transport.rollback(self.handle);
        let result = Gated::new(pending)
            .wait_for(
                self.timeouts.rollback_connect.get(),
                self.timeouts.rollback_close.get(),
            )
            .await
            .map_err(|e| {
                ClientError::from_gate(e, TimeoutKey::RollbackConnect, TimeoutKey::RollbackClose)
            });
        if result.is_ok() {
            for listener in &self.listeners {
                listener.rollback(&self.option);
            }
            tracing::debug!(attempt = self.attempt, "transaction rolled back");
        }
        result
    }

    async fn dispose_best_effort(&mut self) -> Option<ClientError> {
        if self.disposed {
            return None;
        }
        self.disposed = true;
        let pending = self.transport.dispose(self.handle);
        Gated::new(pending)
            .wait_for(
                self.timeouts.dispose_connect.get(),
                self.timeouts.dispose_close.get(),
            )
            .await
            .err()
            .map(|e| {
                ClientError::from_gate(e, TimeoutKey::DisposeConnect, TimeoutKey::DisposeClose)
            })
    }
}
