//! Error types for `pulse-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A single incoming event could not be interpreted. Batch ingestion skips
  /// such events instead of failing the batch.
  #[error("malformed event: {0}")]
  MalformedEvent(String),

  /// User-supplied input failed validation. The message is shown to the
  /// caller verbatim.
  #[error("{0}")]
  Validation(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
