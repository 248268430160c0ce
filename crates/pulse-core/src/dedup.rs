//! The two independent view de-duplication rules.
//!
//! Some ad and CDN environments fire a view beacon twice for a single
//! impression. Two rules collapse those repeats:
//!
//! - **Ingestion** ([`DedupProbe`]): a view whose `(event_name, session)` or,
//!   failing that, `(event_name, anonymous user)` was already stored within
//!   ±[`INGEST_WINDOW`] of its timestamp is not stored at all. The store
//!   answers the question through
//!   [`AnalyticsStore::seen_recently`](crate::store::AnalyticsStore::seen_recently).
//! - **Aggregation** ([`ViewBuckets`]): when counting, views sharing
//!   `(day, campaign, game, url)` and the same [`AGGREGATE_BUCKET_MS`]-wide
//!   bucket count once.
//!
//! The keys and windows differ and the rules are applied independently.

use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};

use crate::event::{Event, EventKind, NewEvent};

/// Half-width of the ingestion dedup window.
pub const INGEST_WINDOW: TimeDelta = TimeDelta::seconds(30);

/// Width of an aggregation-time view bucket, in milliseconds.
pub const AGGREGATE_BUCKET_MS: i64 = 10_000;

// ─── Ingestion ───────────────────────────────────────────────────────────────

/// Who a view belongs to. A session wins over an anonymous user id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
  Session(String),
  Anonymous(String),
}

/// The question "was an equivalent view stored recently?" for one
/// candidate event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupProbe {
  pub event_name: String,
  pub identity:   Identity,
  /// Reference instant: the client timestamp, else the receive time.
  pub at:         DateTime<Utc>,
}

impl DedupProbe {
  /// Build the probe for `event`, or `None` when the event is exempt
  /// (not a view, or carries neither session nor anonymous id).
  pub fn for_event(event: &NewEvent, received_at: DateTime<Utc>) -> Option<Self> {
    if event.kind() != Some(EventKind::View) {
      return None;
    }

    let identity = match (&event.session_id, &event.anonymous_user_id) {
      (Some(sid), _) => Identity::Session(sid.clone()),
      (None, Some(anon)) => Identity::Anonymous(anon.clone()),
      (None, None) => return None,
    };

    Some(Self {
      event_name: event.event_name.clone(),
      identity,
      at: event.client_ts.unwrap_or(received_at),
    })
  }

  /// Inclusive `[since, until]` range of stored client timestamps that
  /// count as a match.
  pub fn window(&self) -> (DateTime<Utc>, DateTime<Utc>) {
    // Symmetric: beacons can arrive out of order, so a later-stamped view
    // already stored also suppresses an earlier one.
    (self.at - INGEST_WINDOW, self.at + INGEST_WINDOW)
  }

  /// Whether a stored event with `ts` for the same key falls in the window.
  pub fn covers(&self, ts: DateTime<Utc>) -> bool {
    let (since, until) = self.window();
    since <= ts && ts <= until
  }
}

// ─── Aggregation ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
  day:         NaiveDate,
  campaign_id: String,
  game_id:     String,
  url:         String,
  bucket:      i64,
}

/// Per-query memory of which view buckets have already been counted.
#[derive(Debug, Default)]
pub struct ViewBuckets {
  seen: HashSet<BucketKey>,
}

impl ViewBuckets {
  pub fn new() -> Self { Self::default() }

  /// Record a view at `ts` on `day`; `true` the first time its bucket is
  /// seen, `false` for every repeat.
  pub fn first_in_bucket(
    &mut self,
    day: NaiveDate,
    event: &Event,
    ts: DateTime<Utc>,
  ) -> bool {
    self.seen.insert(BucketKey {
      day,
      campaign_id: event.campaign_id.clone().unwrap_or_default(),
      game_id: event.game_id.clone().unwrap_or_default(),
      url: event.prop_str("url").unwrap_or_default().to_owned(),
      bucket: ts.timestamp_millis().div_euclid(AGGREGATE_BUCKET_MS),
    })
  }
}
