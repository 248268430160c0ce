//! Error type for `pulse-store-sqlite`.

use pulse_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A unique index rejected the write.
  #[error("{0}")]
  Conflict(String),
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool { matches!(self, Error::Conflict(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
