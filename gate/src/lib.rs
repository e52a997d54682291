//! Timeout-bounded awaiting of abandonable asynchronous results.
//!
//! Every remote operation in this workspace hands back a [`Pending`] result:
//! something that will eventually resolve to a value or a remote failure, and
//! that holds a server-side resource until it is either consumed or closed.
//! This crate provides the gate every call site goes through:
//!
//! - [`Gated::wait_for`] bounds the wait with a connect timeout, and on a
//!   local timeout abandons the pending result within a separate close
//!   timeout budget.
//! - [`Gated::close`] releases the resource exactly once, no matter how many
//!   times it is called or which exit path reaches it.
//! - [`with_pending`] is the scope combinator that guarantees close-on-exit
//!   for call sites that may bail out before ever awaiting.
//!
//! Cleanup failures never replace the primary failure: they are attached as
//! suppressed causes on the [`GateError`] that triggered the cleanup.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::BoxFuture;
use thiserror::Error;

/// An abandonable asynchronous result.
///
/// `wait` consumes the result (the server-side resource is released along
/// with the response); `close` abandons it without consuming. Implementations
/// live next to the transport; this crate only needs the two operations.
#[async_trait]
pub trait Pending: Send {
    type Output: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    /// Wait for the remote result.
    async fn wait(&mut self) -> Result<Self::Output, Self::Error>;

    /// Abandon the pending result, releasing whatever the server holds for it.
    async fn close(&mut self) -> Result<(), Self::Error>;
}

#[async_trait]
impl<P> Pending for Box<P>
where
    P: Pending + ?Sized,
{
    type Output = P::Output;
    type Error = P::Error;

    async fn wait(&mut self) -> Result<Self::Output, Self::Error> {
        (**self).wait().await
    }

    async fn close(&mut self) -> Result<(), Self::Error> {
        (**self).close().await
    }
}

/// Failure raised by the gate.
///
/// `suppressed` carries a secondary failure from best-effort cleanup. It is
/// attached, never substituted: the variant and payload of the primary
/// failure are exactly what the original operation produced.
#[derive(Debug, Error)]
pub enum GateError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// The local wait exceeded its connect timeout.
    #[error("wait timed out after {timeout:?}")]
    Timeout {
        timeout: Duration,
        suppressed: Option<Box<GateError<E>>>,
    },

    /// The remote side reported a failure.
    #[error("remote failure: {source}")]
    Remote {
        source: E,
        suppressed: Option<Box<GateError<E>>>,
    },

    /// `wait_for` was called after the result was already consumed or closed.
    #[error("pending result already consumed")]
    AlreadyConsumed,
}

impl<E> GateError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Attach `secondary` as a suppressed cause, keeping `self` primary.
    ///
    /// If a suppressed cause is already attached the new one is chained
    /// behind it rather than dropped.
    #[must_use]
    pub fn attach(mut self, secondary: GateError<E>) -> Self {
        match &mut self {
            GateError::Timeout { suppressed, .. } | GateError::Remote { suppressed, .. } => {
                match suppressed {
                    None => *suppressed = Some(Box::new(secondary)),
                    Some(existing) => {
                        let chained = std::mem::replace(
                            existing.as_mut(),
                            GateError::AlreadyConsumed,
                        );
                        **existing = chained.attach(secondary);
                    }
                }
            }
            GateError::AlreadyConsumed => {}
        }
        self
    }

    /// The suppressed secondary cause, if cleanup also failed.
    pub fn suppressed(&self) -> Option<&GateError<E>> {
        match self {
            GateError::Timeout { suppressed, .. } | GateError::Remote { suppressed, .. } => {
                suppressed.as_deref()
            }
            GateError::AlreadyConsumed => None,
        }
    }
}

/// A [`Pending`] result together with its consumed/closed bookkeeping.
///
/// The underlying resource is released exactly once: either by a successful
/// (or remotely failed) `wait_for`, which consumes it, or by the first
/// `close`, which abandons it. Every later `close` is a no-op.
pub struct Gated<P: Pending> {
    pending: P,
    consumed: bool,
    closed: bool,
}

impl<P: Pending> Gated<P> {
    pub fn new(pending: P) -> Self {
        Self {
            pending,
            consumed: false,
            closed: false,
        }
    }

    /// Whether the result was consumed by a completed `wait_for`.
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// Whether the result was abandoned via `close`.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Wait for the result, bounded by `connect`.
    ///
    /// On a local timeout the pending result is abandoned within the `close`
    /// budget before the error is returned; an abandonment failure is
    /// attached to the timeout as a suppressed cause.
    pub async fn wait_for(
        &mut self,
        connect: Duration,
        close: Duration,
    ) -> Result<P::Output, GateError<P::Error>> {
        if self.consumed || self.closed {
            return Err(GateError::AlreadyConsumed);
        }
        match tokio::time::timeout(connect, self.pending.wait()).await {
            Ok(Ok(value)) => {
                self.consumed = true;
                Ok(value)
            }
            Ok(Err(remote)) => {
                self.consumed = true;
                Err(GateError::Remote {
                    source: remote,
                    suppressed: None,
                })
            }
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_ms = connect.as_millis() as u64,
                    "wait timed out, abandoning pending result"
                );
                let primary = GateError::Timeout {
                    timeout: connect,
                    suppressed: None,
                };
                match self.close_within(close).await {
                    Ok(()) => Err(primary),
                    Err(secondary) => Err(primary.attach(secondary)),
                }
            }
        }
    }

    /// Abandon the pending result unless it was already consumed or closed.
    pub async fn close(&mut self, close_timeout: Duration) -> Result<(), GateError<P::Error>> {
        self.close_within(close_timeout).await
    }

    async fn close_within(&mut self, budget: Duration) -> Result<(), GateError<P::Error>> {
        if self.consumed || self.closed {
            return Ok(());
        }
        // Marked before the attempt: a failed close must not be retried,
        // the server-side resource may be in an indeterminate state.
        self.closed = true;
        match tokio::time::timeout(budget, self.pending.close()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(remote)) => Err(GateError::Remote {
                source: remote,
                suppressed: None,
            }),
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_ms = budget.as_millis() as u64,
                    "close of abandoned pending result timed out"
                );
                Err(GateError::Timeout {
                    timeout: budget,
                    suppressed: None,
                })
            }
        }
    }
}

/// Run `f` with gated access to `pending`, closing on every exit path.
///
/// Whatever `f` does — consume the result, return early, or fail — the
/// pending result is released exactly once before this function returns. A
/// close failure on the error path is attached to `f`'s error as a
/// suppressed cause; a close failure on the success path is surfaced as the
/// result, since nothing may be silently discarded.
pub async fn with_pending<P, T, F>(
    pending: P,
    close_timeout: Duration,
    f: F,
) -> Result<T, GateError<P::Error>>
where
    P: Pending,
    F: for<'a> FnOnce(&'a mut Gated<P>) -> BoxFuture<'a, Result<T, GateError<P::Error>>>,
{
    let mut gated = Gated::new(pending);
    let outcome = f(&mut gated).await;
    let cleanup = gated.close_within(close_timeout).await;
    match (outcome, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(close_error)) => Err(close_error),
        (Err(primary), Ok(())) => Err(primary),
        (Err(primary), Err(close_error)) => Err(primary.attach(close_error)),
    }
}
