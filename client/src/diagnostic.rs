//! Server diagnostic codes.
//!
//! Every domain-level failure surfaced by the transport carries a stable
//! diagnostic code plus a free-text message. The client treats the code as an
//! opaque enumerant: it is only ever used as a lookup key by the retry
//! classifier and as a field in structured logs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable diagnostic code reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum DiagnosticCode {
    /// Optimistic validation failed at commit time.
    SerializationFailure,
    /// The write conflicted with a table another transaction write-preserves.
    ConflictOnWritePreserve,
    /// The transaction was aborted server-side before the request ran.
    InactiveTransaction,
    /// The server refused the request for authorization reasons.
    PermissionError,
    /// The request was malformed or violated a server constraint.
    IllegalOperation,
    /// The target resource does not exist.
    NotFound,
    /// The server is temporarily unable to take the request.
    Unavailable,
    /// Transport-level I/O failure reported by the server boundary.
    IoError,
    /// Anything the transport could not map to a known code.
    Unknown,
}

/// A domain-level failure reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{code:?}: {message}")]
pub struct ServerDiagnostic {
    pub code: DiagnosticCode,
    pub message: String,
}

impl ServerDiagnostic {
    pub fn new(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
