//! Error taxonomy for transaction execution.
//!
//! One explicit sum type instead of an exception hierarchy: every failure a
//! caller can observe is a [`ClientError`] variant with a `kind` readable at
//! the call site. Cleanup failures (rollback-on-error, abandon-on-timeout)
//! never replace the primary failure; they are attached as suppressed causes.

use std::time::Duration;

use thiserror::Error;
use tsubame_gate::GateError;

use crate::diagnostic::{DiagnosticCode, ServerDiagnostic};
use crate::timeout::TimeoutKey;

/// Client result type alias.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Failure taxonomy of the orchestration client.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A local wait exceeded its connect timeout.
    #[error("{key:?} timed out after {timeout:?}")]
    Timeout {
        key: TimeoutKey,
        timeout: Duration,
        suppressed: Option<Box<ClientError>>,
    },

    /// The transport reported a domain-level failure.
    #[error("server reported {source}")]
    Remote {
        source: ServerDiagnostic,
        suppressed: Option<Box<ClientError>>,
    },

    /// An operation was attempted on a transaction past its closed state.
    #[error("transaction already closed")]
    AlreadyClosed,

    /// The option strategy returned retry-over.
    #[error("retries exhausted after {attempts} attempt(s), last option {last_option_label:?}")]
    RetriesExhausted {
        attempts: u32,
        last_option_label: Option<String>,
        source: Box<ClientError>,
    },

    /// Invalid strategy or option configuration, rejected at build time.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The caller cancelled the execution before a new attempt was issued.
    #[error("execution cancelled before a new attempt was issued")]
    Cancelled,

    /// Arbitrary failure raised by caller logic inside the unit of work.
    #[error("unit of work failed: {cause}")]
    User {
        cause: anyhow::Error,
        suppressed: Option<Box<ClientError>>,
    },
}

impl From<anyhow::Error> for ClientError {
    fn from(cause: anyhow::Error) -> Self {
        ClientError::User {
            cause,
            suppressed: None,
        }
    }
}

impl ClientError {
    /// Attach `secondary` as a suppressed cause, keeping `self` primary.
    ///
    /// Variants without a suppressed slot cannot occur as primaries of a
    /// cleanup path; if one does, the secondary is logged rather than lost.
    #[must_use]
    pub fn attach(mut self, secondary: ClientError) -> Self {
        match &mut self {
            ClientError::Timeout { suppressed, .. }
            | ClientError::Remote { suppressed, .. }
            | ClientError::User { suppressed, .. } => match suppressed {
                None => *suppressed = Some(Box::new(secondary)),
                Some(existing) => {
                    let chained =
                        std::mem::replace(existing.as_mut(), ClientError::AlreadyClosed);
                    **existing = chained.attach(secondary);
                }
            },
            _ => {
                tracing::warn!(
                    primary = %self,
                    secondary = %secondary,
                    "cleanup failure recorded alongside a primary without a suppressed slot"
                );
            }
        }
        self
    }

    /// The suppressed secondary cause, if cleanup also failed.
    pub fn suppressed(&self) -> Option<&ClientError> {
        match self {
            ClientError::Timeout { suppressed, .. }
            | ClientError::Remote { suppressed, .. }
            | ClientError::User { suppressed, .. } => suppressed.as_deref(),
            _ => None,
        }
    }

    /// The server diagnostic code behind this failure, if there is one.
    pub fn diagnostic_code(&self) -> Option<DiagnosticCode> {
        match self {
            ClientError::Remote { source, .. } => Some(source.code),
            ClientError::RetriesExhausted { source, .. } => source.diagnostic_code(),
            _ => None,
        }
    }

    pub(crate) fn from_gate(
        err: GateError<ServerDiagnostic>,
        connect_key: TimeoutKey,
        close_key: TimeoutKey,
    ) -> Self {
        match err {
            GateError::Timeout { timeout, suppressed } => ClientError::Timeout {
                key: connect_key,
                timeout,
                suppressed: suppressed
                    .map(|s| Box::new(Self::from_gate(*s, close_key, close_key))),
            },
            GateError::Remote { source, suppressed } => ClientError::Remote {
                source,
                suppressed: suppressed
                    .map(|s| Box::new(Self::from_gate(*s, close_key, close_key))),
            },
            GateError::AlreadyConsumed => ClientError::AlreadyClosed,
        }
    }
}
