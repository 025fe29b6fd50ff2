//! Error types for API client operations.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client and resolution engine.
#[derive(Debug, Error)]
pub enum Error {
  /// An operation was invoked on an endpoint lacking the required capability.
  #[error("\"{operation}\" is only available for {required} endpoints")]
  UnsupportedOperation {
    operation: &'static str,
    required: &'static str,
  },

  /// A caller-supplied parameter was out of contract.
  #[error("{0}")]
  InvalidArgument(String),

  /// The upstream API answered with a non-success status.
  /// The message may be enriched with the body's error text; the status
  /// is always preserved verbatim.
  #[error("upstream request failed with status {status}: {message}")]
  Upstream { status: u16, message: String },

  /// The request never produced an HTTP response.
  #[error("transport error: {0}")]
  Transport(String),

  /// A cache backend failed. Absence of a key is never an error.
  #[error("cache backend error: {0}")]
  Cache(String),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

impl Error {
  /// Status code of an upstream failure, if this is one.
  pub fn status(&self) -> Option<u16> {
    match self {
      Error::Upstream { status, .. } => Some(*status),
      _ => None,
    }
  }
}
