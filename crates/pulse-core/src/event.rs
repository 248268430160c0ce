//! Client-side events, the append-only stream the collector ingests.
//!
//! Events arrive as loosely-typed JSON (batch endpoint) or query parameters
//! (pixel endpoint). Both paths normalise into a [`NewEvent`] before anything
//! touches the store.

use chrono::{DateTime, TimeZone as _, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
  Error, Result,
  sanitize::{clip, scalar_string},
};

/// Upper bound on `event_name`, in characters.
pub const MAX_EVENT_NAME_LEN: usize = 80;

/// Upper bound on campaign, game, session and anonymous-user identifiers.
pub const MAX_ID_LEN: usize = 120;

/// Most events accepted in one ingestion batch.
pub const MAX_BATCH_LEN: usize = 500;

// ─── Classification ──────────────────────────────────────────────────────────

/// The funnel stage an event contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
  Start,
  Win,
  Click,
  View,
}

impl EventKind {
  /// Map an `event_name` onto its funnel stage. Unknown names are not
  /// counted anywhere.
  pub fn classify(event_name: &str) -> Option<Self> {
    match event_name {
      "game_start" | "card_draw" => Some(Self::Start),
      "win" | "popout_click" => Some(Self::Win),
      "banner_click" => Some(Self::Click),
      "banner_view" | "page_view" => Some(Self::View),
      _ => None,
    }
  }
}

// ─── Stored event ────────────────────────────────────────────────────────────

/// An event as persisted. Never updated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
  pub id:                i64,
  /// Server-assigned; shared by every event of one batch.
  pub received_at:       DateTime<Utc>,
  pub client_ts:         Option<DateTime<Utc>>,
  pub campaign_id:       Option<String>,
  pub game_id:           Option<String>,
  pub session_id:        Option<String>,
  pub anonymous_user_id: Option<String>,
  pub event_name:        String,
  pub props:             Value,
}

impl Event {
  pub fn kind(&self) -> Option<EventKind> { EventKind::classify(&self.event_name) }

  /// A string-valued top-level property, e.g. `url` or `referrer`.
  pub fn prop_str(&self, key: &str) -> Option<&str> {
    self.props.get(key).and_then(Value::as_str)
  }
}

// ─── NewEvent ────────────────────────────────────────────────────────────────

/// Input to [`crate::store::AnalyticsStore::ingest`].
/// `received_at` is always set by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
  pub client_ts:         Option<DateTime<Utc>>,
  pub campaign_id:       Option<String>,
  pub game_id:           Option<String>,
  pub session_id:        Option<String>,
  pub anonymous_user_id: Option<String>,
  pub event_name:        String,
  pub props:             Value,
}

impl NewEvent {
  /// An event with only a name; every other field empty and `props = {}`.
  pub fn new(event_name: &str) -> Self {
    Self {
      client_ts:         None,
      campaign_id:       None,
      game_id:           None,
      session_id:        None,
      anonymous_user_id: None,
      event_name:        clip(event_name, MAX_EVENT_NAME_LEN),
      props:             Value::Object(Map::new()),
    }
  }

  /// Interpret one element of a batch.
  ///
  /// Fails when the element is not an object, has no usable `event_name`,
  /// or carries a `client_ts` that is neither RFC 3339 nor epoch
  /// milliseconds.
  pub fn from_json(value: &Value) -> Result<Self> {
    let obj = value
      .as_object()
      .ok_or_else(|| Error::MalformedEvent("event is not an object".into()))?;

    let event_name = scalar_string(obj.get("event_name"), MAX_EVENT_NAME_LEN)
      .ok_or_else(|| Error::MalformedEvent("missing event_name".into()))?;

    let client_ts = match obj.get("client_ts") {
      Some(v) => parse_client_ts(v)?,
      None => None,
    };

    let props = match obj.get("props") {
      None | Some(Value::Null) | Some(Value::Bool(false)) => {
        Value::Object(Map::new())
      }
      Some(Value::String(s)) if s.is_empty() => Value::Object(Map::new()),
      Some(other) => other.clone(),
    };

    Ok(Self {
      client_ts,
      campaign_id: scalar_string(obj.get("campaign_id"), MAX_ID_LEN),
      game_id: scalar_string(obj.get("game_id"), MAX_ID_LEN),
      session_id: scalar_string(obj.get("session_id"), MAX_ID_LEN),
      anonymous_user_id: scalar_string(obj.get("anonymous_user_id"), MAX_ID_LEN),
      event_name,
      props,
    })
  }

  pub fn kind(&self) -> Option<EventKind> { EventKind::classify(&self.event_name) }
}

// ─── Timestamps ──────────────────────────────────────────────────────────────

/// Parse a client timestamp given as RFC 3339 text or epoch milliseconds.
///
/// `null` and `""` mean "not supplied".
pub fn parse_client_ts(value: &Value) -> Result<Option<DateTime<Utc>>> {
  match value {
    Value::Null => Ok(None),
    Value::String(s) if s.trim().is_empty() => Ok(None),
    Value::String(s) => parse_client_ts_str(s)
      .map(Some)
      .ok_or_else(|| Error::MalformedEvent(format!("bad client_ts: {s:?}"))),
    Value::Number(n) => n
      .as_i64()
      .or_else(|| n.as_f64().map(|f| f as i64))
      .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
      .map(Some)
      .ok_or_else(|| Error::MalformedEvent(format!("bad client_ts: {n}"))),
    other => Err(Error::MalformedEvent(format!("bad client_ts: {other}"))),
  }
}

/// Parse an RFC 3339 timestamp (any offset) into UTC.
pub fn parse_client_ts_str(s: &str) -> Option<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s.trim())
    .ok()
    .map(|dt| dt.with_timezone(&Utc))
}
