//! The `AnalyticsStore` trait and its supporting types.
//!
//! The trait is implemented by storage backends (e.g. `pulse-store-sqlite`).
//! The HTTP layer (`pulse-api`) depends on this abstraction, not on any
//! concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  banner::{Banner, NewBanner},
  dedup::DedupProbe,
  event::{Event, NewEvent},
  registration::{NewRegistration, Registration, RegistrationQuery},
};

/// Error bound for store backends.
///
/// Lets callers tell a uniqueness violation apart from every other failure
/// without knowing the backend's concrete error type.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  fn is_conflict(&self) -> bool;
}

/// What happened to an ingested batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
  /// Events written.
  pub stored:     usize,
  /// Views dropped by the ingestion dedup window.
  pub duplicates: usize,
}

/// Abstraction over a Pulse analytics store backend.
///
/// Events and registrations are append-only. Banners are the only mutable
/// records.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait AnalyticsStore: Send + Sync {
  type Error: StoreError;

  // ── Events ────────────────────────────────────────────────────────────

  /// Persist a batch atomically, dropping views already
  /// [seen recently](Self::seen_recently). Earlier events of the same batch
  /// count as seen for later ones. All events share one `received_at`.
  fn ingest(
    &self,
    events: Vec<NewEvent>,
  ) -> impl Future<Output = Result<IngestOutcome, Self::Error>> + Send + '_;

  /// Whether a stored event matches `probe`'s key within its window.
  ///
  /// [`ingest`](Self::ingest) evaluates the same query inside its own
  /// transaction; this standalone form lets single-event callers skip the
  /// write entirely.
  fn seen_recently<'a>(
    &'a self,
    probe: &'a DedupProbe,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Events whose client timestamp is at or after `since`. Events without a
  /// client timestamp are never returned.
  fn events_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Event>, Self::Error>> + Send + '_;

  /// Distinct non-empty `game_id`s seen in events, sorted.
  fn game_ids(
    &self,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Registrations ─────────────────────────────────────────────────────

  /// Persist a registration; `created_at` is set by the store.
  fn record_registration(
    &self,
    input: NewRegistration,
  ) -> impl Future<Output = Result<Registration, Self::Error>> + Send + '_;

  /// Newest-first registrations matching `query`, at most
  /// [`MAX_LISTED`](crate::registration::MAX_LISTED).
  fn list_registrations<'a>(
    &'a self,
    query: &'a RegistrationQuery,
  ) -> impl Future<Output = Result<Vec<Registration>, Self::Error>> + Send + 'a;

  /// Registrations created at or after `since`.
  fn registrations_since(
    &self,
    since: DateTime<Utc>,
  ) -> impl Future<Output = Result<Vec<Registration>, Self::Error>> + Send + '_;

  // ── Banners ───────────────────────────────────────────────────────────

  /// All banners, newest first.
  fn list_banners(
    &self,
  ) -> impl Future<Output = Result<Vec<Banner>, Self::Error>> + Send + '_;

  /// Insert a banner. A duplicate `banner_id` or `url` fails with an error
  /// for which [`StoreError::is_conflict`] holds.
  fn create_banner(
    &self,
    input: NewBanner,
  ) -> impl Future<Output = Result<Banner, Self::Error>> + Send + '_;

  /// Replace the fields of banner row `id`. `None` if no such row.
  fn update_banner(
    &self,
    id: i64,
    input: NewBanner,
  ) -> impl Future<Output = Result<Option<Banner>, Self::Error>> + Send + '_;

  /// Delete banner row `id`; `false` if no such row.
  fn delete_banner(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
